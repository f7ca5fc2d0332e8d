//! Linear-problem assembly for remedial-action optimization.
//!
//! This crate turns a remedial-action optimization perimeter (flow
//! constraints, range actions, sensitivity coefficients) into a linear or
//! mixed-integer program and keeps that program in sync across the
//! iterative refinement loop. The program is never rebuilt: fillers create
//! variables and constraints once, then patch coefficients and bounds as
//! new sensitivity values arrive or as range actions get activated.
//!
//! The main pieces:
//!
//! - [`problem`]: the solver-agnostic model. Variables and constraints are
//!   registered under semantic keys ([`problem::VariableId`],
//!   [`problem::ConstraintId`]) and lowered to a `good_lp` backend at solve
//!   time.
//! - [`filler`]: the [`filler::ProblemFiller`] trait and the
//!   [`filler::LinearProblemBuilder`] that runs fillers in registration
//!   order.
//! - [`fillers`]: one filler per concern, from the core flow/setpoint
//!   skeleton to margin objectives, soft monitored-element bounds,
//!   loop-flow corridors, usage limits, discrete taps, inter-period
//!   linkage and generator commitment.
//! - [`inputs`] and [`parameters`]: the per-perimeter data fillers read
//!   and the tuning knobs they honor.

pub mod filler;
pub mod fillers;
pub mod inputs;
pub mod parameters;
pub mod problem;

#[cfg(test)]
mod testutil;

pub use filler::{AssembledProblem, FillerInputs, LinearProblemBuilder, ProblemFiller};
pub use inputs::OptimizationContext;
pub use parameters::{
    LoopFlowParameters, MnecParameters, RangeActionParameters, RelativeMarginParameters,
    UnoptimizedCnecParameters, UsageLimits,
};
pub use problem::{ConstraintId, LinearProblem, ProblemSolution, VariableId};
