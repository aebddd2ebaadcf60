//! Branch-and-bound objective.

use crate::error::{Contradiction, Propagation};
use crate::model::Model;
use crate::variables::{Cause, IntVar};

/// Optimization direction over an integer variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Objective {
    Minimize(IntVar),
    Maximize(IntVar),
}

impl Objective {
    pub fn var(self) -> IntVar {
        match self {
            Objective::Minimize(v) | Objective::Maximize(v) => v,
        }
    }
}

/// Keeps the best bound found so far and cuts every node against it.
///
/// The bound lives outside the environment: backtracking never loosens it.
#[derive(Debug, Clone, Default)]
pub(crate) struct ObjectiveManager {
    objective: Option<Objective>,
    best: Option<i64>,
}

impl ObjectiveManager {
    pub(crate) fn new(objective: Option<Objective>) -> Self {
        Self {
            objective,
            best: None,
        }
    }

    pub(crate) fn is_optimizing(&self) -> bool {
        self.objective.is_some()
    }

    pub(crate) fn best(&self) -> Option<i64> {
        self.best
    }

    /// Current value of the objective variable, if instantiated.
    pub(crate) fn value(&self, model: &Model) -> Option<i64> {
        self.objective.and_then(|o| model.value(o.var()))
    }

    /// Records the objective value of the current solution.
    pub(crate) fn record(&mut self, model: &Model) {
        if let Some(value) = self.value(model) {
            self.best = Some(value);
        }
    }

    /// Requires strict improvement over the best bound.
    pub(crate) fn apply_cut(&self, model: &mut Model, cause: Cause) -> Propagation {
        match (self.objective, self.best) {
            (Some(Objective::Minimize(v)), Some(best)) => {
                let bound = best
                    .checked_sub(1)
                    .ok_or_else(|| Contradiction::fail(cause, "objective at its lowest value"))?;
                model.update_upper_bound(v, bound, cause)?;
            }
            (Some(Objective::Maximize(v)), Some(best)) => {
                let bound = best
                    .checked_add(1)
                    .ok_or_else(|| Contradiction::fail(cause, "objective at its highest value"))?;
                model.update_lower_bound(v, bound, cause)?;
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cut_tightens_bound() {
        let mut model = Model::new("objective");
        let x = model.new_int_var("x", 0, 10).unwrap();
        let mut manager = ObjectiveManager::new(Some(Objective::Minimize(x)));
        manager.apply_cut(&mut model, Cause::Objective).unwrap();
        assert_eq!(model.ub(x), 10);

        model.env_mut().world_push();
        model.instantiate_to(x, 6, Cause::Decision).unwrap();
        manager.record(&model);
        model.env_mut().world_pop();

        manager.apply_cut(&mut model, Cause::Objective).unwrap();
        assert_eq!(model.ub(x), 5);
        assert_eq!(manager.best(), Some(6));
    }

    #[test]
    fn test_maximize_cut_fails_at_bound() {
        let mut model = Model::new("objective");
        let x = model.new_int_var("x", 0, 10).unwrap();
        let mut manager = ObjectiveManager::new(Some(Objective::Maximize(x)));
        model.env_mut().world_push();
        model.instantiate_to(x, 10, Cause::Decision).unwrap();
        manager.record(&model);
        model.env_mut().world_pop();

        let err = manager.apply_cut(&mut model, Cause::Objective).unwrap_err();
        assert_eq!(err.cause, Cause::Objective);
    }

    #[test]
    fn test_cut_at_extreme_value_fails() {
        let mut model = Model::new("objective");
        let x = model.new_bounded_var("x", i64::MIN, 0).unwrap();
        let mut manager = ObjectiveManager::new(Some(Objective::Minimize(x)));
        model.env_mut().world_push();
        model.instantiate_to(x, i64::MIN, Cause::Decision).unwrap();
        manager.record(&model);
        model.env_mut().world_pop();

        let err = manager.apply_cut(&mut model, Cause::Objective).unwrap_err();
        assert_eq!(err.cause, Cause::Objective);
        assert_eq!(model.lb(x), i64::MIN);
    }
}
