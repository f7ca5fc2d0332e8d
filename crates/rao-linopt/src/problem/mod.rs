//! The shared optimization model: semantic keys, registry, solver lowering.

pub mod keys;
pub mod model;
pub mod solve;

pub use keys::{
    BoundDirection, CommitmentState, ConstraintId, MarginBound, OnMode, Sign, VariableId,
    VariationDirection,
};
pub use model::{ConsRef, LinearProblem, VarClass, VarRef};
pub use solve::ProblemSolution;
