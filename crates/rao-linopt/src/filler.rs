//! The filler contract and the assembly sequence.
//!
//! A filler is the polymorphic unit of contribution to the shared model.
//! The orchestrator invokes the three operations in a fixed sequence:
//! `fill` once, then per sensitivity iteration
//! `update_between_sensi_iteration` (with the 0-based iteration index passed
//! explicitly, so fillers stay stateless), and per solver sub-iteration
//! `update_between_mip_iteration`.
//!
//! Fillers run in insertion order; a filler referencing another filler's
//! variables must be inserted after it. That ordering invariant is what
//! makes the single-writer mutation of the registry safe without locking.

use crate::problem::LinearProblem;
use rao_core::{ActivationSnapshot, RaoResult, SensitivitySnapshot};

/// Read-only snapshots handed to the fillers on every call.
#[derive(Clone, Copy)]
pub struct FillerInputs<'a> {
    /// Flows, sensitivities and PTDF data of the current iteration.
    pub sensitivities: &'a SensitivitySnapshot,
    /// Setpoints/taps of the latest solve (pre-perimeter before the first).
    pub activations: &'a ActivationSnapshot,
}

/// A contributor of variables, constraints and objective terms.
pub trait ProblemFiller: Send {
    /// Initial build of this filler's share of the model.
    fn fill(&self, problem: &mut LinearProblem, inputs: &FillerInputs<'_>) -> RaoResult<()>;

    /// Refresh after a new sensitivity computation. `iteration` is 0 for
    /// the first fill-and-solve round and grows by one per outer loop.
    fn update_between_sensi_iteration(
        &self,
        problem: &mut LinearProblem,
        inputs: &FillerInputs<'_>,
        iteration: usize,
    ) -> RaoResult<()>;

    /// Refresh between two solver runs sharing the same sensitivities.
    fn update_between_mip_iteration(
        &self,
        problem: &mut LinearProblem,
        activations: &ActivationSnapshot,
    ) -> RaoResult<()>;
}

/// The registry together with its ordered filler sequence.
pub struct AssembledProblem {
    /// The shared model.
    pub model: LinearProblem,
    fillers: Vec<Box<dyn ProblemFiller>>,
}

impl AssembledProblem {
    /// Run the initial build of every filler, in order.
    pub fn fill(&mut self, inputs: &FillerInputs<'_>) -> RaoResult<()> {
        for filler in &self.fillers {
            filler.fill(&mut self.model, inputs)?;
        }
        Ok(())
    }

    /// Propagate a new sensitivity snapshot to every filler, in order.
    pub fn update_between_sensi_iteration(
        &mut self,
        inputs: &FillerInputs<'_>,
        iteration: usize,
    ) -> RaoResult<()> {
        for filler in &self.fillers {
            filler.update_between_sensi_iteration(&mut self.model, inputs, iteration)?;
        }
        Ok(())
    }

    /// Propagate the latest solve's activations to every filler, in order.
    pub fn update_between_mip_iteration(
        &mut self,
        activations: &ActivationSnapshot,
    ) -> RaoResult<()> {
        for filler in &self.fillers {
            filler.update_between_mip_iteration(&mut self.model, activations)?;
        }
        Ok(())
    }
}

/// Builder assembling the filler sequence around a fresh registry.
#[derive(Default)]
pub struct LinearProblemBuilder {
    fillers: Vec<Box<dyn ProblemFiller>>,
}

impl LinearProblemBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a filler; it will run after every filler added before it.
    pub fn with_filler(mut self, filler: Box<dyn ProblemFiller>) -> Self {
        self.fillers.push(filler);
        self
    }

    pub fn build(self) -> AssembledProblem {
        AssembledProblem { model: LinearProblem::new(), fillers: self.fillers }
    }
}
