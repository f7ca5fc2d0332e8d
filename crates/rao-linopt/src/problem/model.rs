//! The model registry: a typed, solver-agnostic store of variables,
//! constraints and the shared objective.
//!
//! Variables and constraints live in arenas and are addressed by [`VarRef`] /
//! [`ConsRef`] handles; semantic keys ([`VariableId`], [`ConstraintId`]) map
//! to handles through an index. A key can be registered only once per model
//! instance. Lookups come in two flavors: `find_*` returns `Option` (absence
//! is expected and handled by the caller, typically "create on first use"),
//! `get_*` returns a typed not-found error (absence is a sequencing bug).
//!
//! Bounds and coefficients are mutable in place; variables and constraints
//! are never removed. The registry is lowered to a solver model per solve
//! (see [`super::solve`]).

use super::keys::{ConstraintId, VariableId};
use hashbrown::HashMap;
use rao_core::{RaoError, RaoResult};
use std::collections::BTreeMap;

/// Handle of a registered variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarRef(pub(crate) usize);

/// Handle of a registered constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsRef(pub(crate) usize);

/// Integrality class of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarClass {
    Continuous,
    Integer,
    Binary,
}

#[derive(Debug, Clone)]
pub(crate) struct VariableData {
    pub(crate) id: VariableId,
    pub(crate) lb: f64,
    pub(crate) ub: f64,
    pub(crate) class: VarClass,
}

#[derive(Debug, Clone)]
pub(crate) struct ConstraintData {
    pub(crate) id: ConstraintId,
    pub(crate) lb: f64,
    pub(crate) ub: f64,
    /// Sparse coefficient map; BTreeMap for deterministic lowering order.
    pub(crate) coefficients: BTreeMap<VarRef, f64>,
}

/// The shared linear/mixed-integer model populated by the fillers.
#[derive(Debug, Default)]
pub struct LinearProblem {
    pub(crate) variables: Vec<VariableData>,
    pub(crate) constraints: Vec<ConstraintData>,
    var_index: HashMap<VariableId, VarRef>,
    cons_index: HashMap<ConstraintId, ConsRef>,
    pub(crate) objective: BTreeMap<VarRef, f64>,
}

impl LinearProblem {
    pub fn new() -> Self {
        Self::default()
    }

    /// The solver convention for "unbounded". Finite sentinel; the lowering
    /// treats bounds beyond half of it as absent.
    pub const fn infinity() -> f64 {
        1e12
    }

    fn register_variable(
        &mut self,
        id: VariableId,
        lb: f64,
        ub: f64,
        class: VarClass,
    ) -> RaoResult<VarRef> {
        if self.var_index.contains_key(&id) {
            return Err(RaoError::DuplicateKey(id.to_string()));
        }
        let var = VarRef(self.variables.len());
        self.variables.push(VariableData { id: id.clone(), lb, ub, class });
        self.var_index.insert(id, var);
        Ok(var)
    }

    /// Register a continuous variable with the given bounds.
    pub fn add_variable(&mut self, id: VariableId, lb: f64, ub: f64) -> RaoResult<VarRef> {
        self.register_variable(id, lb, ub, VarClass::Continuous)
    }

    /// Register an integer variable with the given bounds.
    pub fn add_integer_variable(&mut self, id: VariableId, lb: f64, ub: f64) -> RaoResult<VarRef> {
        self.register_variable(id, lb, ub, VarClass::Integer)
    }

    /// Register a binary variable.
    pub fn add_binary_variable(&mut self, id: VariableId) -> RaoResult<VarRef> {
        self.register_variable(id, 0.0, 1.0, VarClass::Binary)
    }

    /// Look a variable up; `None` means "not created yet".
    pub fn find_variable(&self, id: &VariableId) -> Option<VarRef> {
        self.var_index.get(id).copied()
    }

    /// Look a variable up that must exist.
    pub fn get_variable(&self, id: &VariableId) -> RaoResult<VarRef> {
        self.find_variable(id)
            .ok_or_else(|| RaoError::VariableNotFound(id.to_string()))
    }

    /// Register a constraint with the given bounds and no coefficients.
    pub fn add_constraint(&mut self, id: ConstraintId, lb: f64, ub: f64) -> RaoResult<ConsRef> {
        if self.cons_index.contains_key(&id) {
            return Err(RaoError::DuplicateKey(id.to_string()));
        }
        let cons = ConsRef(self.constraints.len());
        self.constraints.push(ConstraintData {
            id: id.clone(),
            lb,
            ub,
            coefficients: BTreeMap::new(),
        });
        self.cons_index.insert(id, cons);
        Ok(cons)
    }

    /// Look a constraint up; `None` means "not created yet".
    pub fn find_constraint(&self, id: &ConstraintId) -> Option<ConsRef> {
        self.cons_index.get(id).copied()
    }

    /// Look a constraint up that must exist.
    pub fn get_constraint(&self, id: &ConstraintId) -> RaoResult<ConsRef> {
        self.find_constraint(id)
            .ok_or_else(|| RaoError::ConstraintNotFound(id.to_string()))
    }

    /// Set a constraint coefficient (overwrites any previous value).
    pub fn set_coefficient(&mut self, cons: ConsRef, var: VarRef, value: f64) {
        self.constraints[cons.0].coefficients.insert(var, value);
    }

    /// Current coefficient of a variable in a constraint (0 when absent).
    pub fn coefficient(&self, cons: ConsRef, var: VarRef) -> f64 {
        self.constraints[cons.0].coefficients.get(&var).copied().unwrap_or(0.0)
    }

    pub fn set_constraint_bounds(&mut self, cons: ConsRef, lb: f64, ub: f64) {
        let data = &mut self.constraints[cons.0];
        data.lb = lb;
        data.ub = ub;
    }

    pub fn constraint_lb(&self, cons: ConsRef) -> f64 {
        self.constraints[cons.0].lb
    }

    pub fn constraint_ub(&self, cons: ConsRef) -> f64 {
        self.constraints[cons.0].ub
    }

    pub fn set_variable_bounds(&mut self, var: VarRef, lb: f64, ub: f64) {
        let data = &mut self.variables[var.0];
        data.lb = lb;
        data.ub = ub;
    }

    pub fn variable_lb(&self, var: VarRef) -> f64 {
        self.variables[var.0].lb
    }

    pub fn variable_ub(&self, var: VarRef) -> f64 {
        self.variables[var.0].ub
    }

    /// Integrality class of a variable.
    pub fn variable_class(&self, var: VarRef) -> VarClass {
        self.variables[var.0].class
    }

    /// Set the objective weight of a variable (overwrites; the objective is
    /// shared between fillers, so each filler only touches its own terms).
    pub fn set_objective_coefficient(&mut self, var: VarRef, weight: f64) {
        self.objective.insert(var, weight);
    }

    /// Current objective weight of a variable (0 when absent).
    pub fn objective_coefficient(&self, var: VarRef) -> f64 {
        self.objective.get(&var).copied().unwrap_or(0.0)
    }

    /// The objective is always a minimization.
    pub fn minimization(&self) -> bool {
        true
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Whether any registered variable is integer or binary.
    pub fn has_integer_variables(&self) -> bool {
        self.variables
            .iter()
            .any(|v| !matches!(v.class, VarClass::Continuous))
    }

    /// Semantic key of a variable handle (for diagnostics).
    pub fn variable_id(&self, var: VarRef) -> &VariableId {
        &self.variables[var.0].id
    }

    /// Semantic key of a constraint handle (for diagnostics).
    pub fn constraint_id(&self, cons: ConsRef) -> &ConstraintId {
        &self.constraints[cons.0].id
    }
}
