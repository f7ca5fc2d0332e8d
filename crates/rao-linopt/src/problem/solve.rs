//! Lowering of the registry to a `good_lp` solver model.
//!
//! The registry is plain data; every solve rebuilds the backend model from
//! the current bounds and coefficients. Clarabel handles pure LPs; HiGHS is
//! needed for the mixed-integer models (tap variations, usage binaries,
//! commitment states). When only Clarabel is compiled in, integrality is
//! relaxed with a warning so that a degraded-but-solvable model is still
//! produced.

use super::model::{LinearProblem, VarRef};
use rao_core::RaoResult;

#[cfg(any(feature = "solver-clarabel", feature = "solver-highs"))]
use super::model::VarClass;
#[cfg(any(feature = "solver-clarabel", feature = "solver-highs"))]
use good_lp::{
    constraint, variable, variables, Expression, ProblemVariables, Solution, SolverModel, Variable,
};
#[cfg(not(any(feature = "solver-clarabel", feature = "solver-highs")))]
use rao_core::RaoError;

/// Per-variable values and objective of one solve.
#[derive(Debug, Clone)]
pub struct ProblemSolution {
    values: Vec<f64>,
    objective_value: f64,
}

impl ProblemSolution {
    /// Optimized value of a variable.
    pub fn value(&self, var: VarRef) -> f64 {
        self.values[var.0]
    }

    /// Optimized objective value.
    pub fn objective_value(&self) -> f64 {
        self.objective_value
    }
}

fn is_lower_bounded(lb: f64) -> bool {
    lb > -LinearProblem::infinity() / 2.0
}

fn is_upper_bounded(ub: f64) -> bool {
    ub < LinearProblem::infinity() / 2.0
}

impl LinearProblem {
    /// Solve the model with the best compiled backend.
    pub fn solve(&self) -> RaoResult<ProblemSolution> {
        #[cfg(feature = "solver-highs")]
        if self.has_integer_variables() {
            return self.solve_highs();
        }
        #[cfg(feature = "solver-clarabel")]
        return self.solve_clarabel();
        #[cfg(all(feature = "solver-highs", not(feature = "solver-clarabel")))]
        return self.solve_highs();
        #[cfg(not(any(feature = "solver-clarabel", feature = "solver-highs")))]
        Err(RaoError::Solver(
            "no solver backend enabled; enable solver-clarabel or solver-highs".to_string(),
        ))
    }

    #[cfg(feature = "solver-clarabel")]
    fn solve_clarabel(&self) -> RaoResult<ProblemSolution> {
        use good_lp::solvers::clarabel::clarabel;

        if self.has_integer_variables() {
            tracing::warn!(
                "clarabel backend: relaxing integrality of the model, \
                 enable solver-highs to honor integer variables"
            );
        }
        let (vars, gvars) = self.lowered_variables(true);
        let objective = self.objective_expression(&gvars);
        let mut model = vars.minimise(objective).using(clarabel);
        for cons in self.lowered_constraints(&gvars) {
            model = model.with(cons);
        }
        let solution = model
            .solve()
            .map_err(|e| rao_core::RaoError::Solver(format!("clarabel: {e:?}")))?;
        Ok(self.extract(&gvars, |v| solution.value(v)))
    }

    #[cfg(feature = "solver-highs")]
    fn solve_highs(&self) -> RaoResult<ProblemSolution> {
        use good_lp::solvers::highs::highs;

        let (vars, gvars) = self.lowered_variables(false);
        let objective = self.objective_expression(&gvars);
        let mut model = vars.minimise(objective).using(highs);
        for cons in self.lowered_constraints(&gvars) {
            model = model.with(cons);
        }
        let solution = model
            .solve()
            .map_err(|e| rao_core::RaoError::Solver(format!("highs: {e:?}")))?;
        Ok(self.extract(&gvars, |v| solution.value(v)))
    }

    #[cfg(any(feature = "solver-clarabel", feature = "solver-highs"))]
    fn lowered_variables(&self, relax_integrality: bool) -> (ProblemVariables, Vec<Variable>) {
        let mut vars = variables!();
        let mut gvars = Vec::with_capacity(self.variables.len());
        for data in &self.variables {
            let mut def = variable();
            if !relax_integrality {
                match data.class {
                    VarClass::Continuous => {}
                    VarClass::Integer => def = def.integer(),
                    VarClass::Binary => def = def.binary(),
                }
            }
            if is_lower_bounded(data.lb) {
                def = def.min(data.lb);
            }
            if is_upper_bounded(data.ub) {
                def = def.max(data.ub);
            }
            gvars.push(vars.add(def));
        }
        (vars, gvars)
    }

    #[cfg(any(feature = "solver-clarabel", feature = "solver-highs"))]
    fn objective_expression(&self, gvars: &[Variable]) -> Expression {
        let mut expr = Expression::from(0.0);
        for (var, weight) in &self.objective {
            expr += *weight * gvars[var.0];
        }
        expr
    }

    #[cfg(any(feature = "solver-clarabel", feature = "solver-highs"))]
    fn lowered_constraints(&self, gvars: &[Variable]) -> Vec<good_lp::Constraint> {
        let mut out = Vec::new();
        for data in &self.constraints {
            let mut expr = Expression::from(0.0);
            for (var, coeff) in &data.coefficients {
                expr += *coeff * gvars[var.0];
            }
            if data.lb == data.ub && is_lower_bounded(data.lb) {
                out.push(constraint!(expr == data.lb));
                continue;
            }
            if is_upper_bounded(data.ub) {
                out.push(constraint!(expr.clone() <= data.ub));
            }
            if is_lower_bounded(data.lb) {
                out.push(constraint!(expr >= data.lb));
            }
        }
        out
    }

    #[cfg(any(feature = "solver-clarabel", feature = "solver-highs"))]
    fn extract(&self, gvars: &[Variable], value: impl Fn(Variable) -> f64) -> ProblemSolution {
        let values: Vec<f64> = gvars.iter().map(|v| value(*v)).collect();
        let objective_value = self
            .objective
            .iter()
            .map(|(var, weight)| weight * values[var.0])
            .sum();
        ProblemSolution { values, objective_value }
    }
}
