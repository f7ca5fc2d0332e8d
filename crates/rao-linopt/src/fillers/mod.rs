//! Problem fillers, each owning one concern of the assembled problem.
//!
//! Fillers run in registration order; the core filler of each study period
//! must come first since every other filler attaches to the flow and
//! setpoint variables it creates.

pub mod core;
pub mod discrete_pst;
pub mod generator;
pub mod group;
pub mod loop_flow;
pub mod max_min_margin;
pub mod mnec;
pub mod multi_timestep;
pub mod relative_margin;
pub mod unoptimized;
pub mod usage_limits;

pub use core::CoreProblemFiller;
pub use discrete_pst::DiscretePstFiller;
pub use generator::GeneratorFiller;
pub use group::{ContinuousGroupFiller, DiscreteGroupFiller};
pub use loop_flow::LoopFlowFiller;
pub use max_min_margin::MaxMinMarginFiller;
pub use mnec::MnecFiller;
pub use multi_timestep::MultiTimestepFiller;
pub use relative_margin::MaxMinRelativeMarginFiller;
pub use unoptimized::UnoptimizedCnecFiller;
pub use usage_limits::UsageLimitsFiller;
