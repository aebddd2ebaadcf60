//! Decision sources.

use super::decision::{Decision, DecisionOperator};
use crate::model::Model;
use crate::variables::IntVar;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cmp::Reverse;

/// Picks the next decision of the search.
pub trait SearchStrategy {
    /// The next decision, or `None` once every variable it handles is
    /// instantiated.
    fn get_decision(&mut self, model: &Model) -> Option<Decision>;

    /// Called after the `restarts`-th restart.
    fn on_restart(&mut self, _restarts: u64) {}
}

/// Which uninstantiated variable to branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VarSelector {
    /// First in the strategy's order.
    #[default]
    InputOrder,
    /// Smallest domain.
    FirstFail,
    /// Largest domain.
    AntiFirstFail,
    /// Smallest lower bound.
    Smallest,
    /// Largest upper bound.
    Largest,
    Random,
}

/// Which value, and which operator, to branch with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ValSelector {
    /// `x = lb`.
    #[default]
    Min,
    /// `x = ub`.
    Max,
    /// `x = v`, `v` the value closest to the middle of the bounds.
    /// Bounded domains split instead: `x <= mid`.
    Middle,
    /// `x = v`, `v` drawn uniformly from the domain. Bounded domains draw
    /// one of their two bounds.
    Random,
    /// `x <= mid`.
    SplitMiddle,
    /// `x > mid`.
    ReverseSplitMiddle,
}

/// Variable/value heuristic over a fixed list of integer variables.
///
/// # Examples
///
/// ```
/// use u_cpsolve::model::Model;
/// use u_cpsolve::search::{IntStrategy, SearchStrategy, ValSelector, VarSelector};
///
/// let mut model = Model::new("example");
/// let x = model.new_int_var("x", 0, 9).unwrap();
/// let y = model.new_int_var("y", 0, 2).unwrap();
///
/// let mut strategy = IntStrategy::new(vec![x, y], VarSelector::FirstFail, ValSelector::Max);
/// let decision = strategy.get_decision(&model).unwrap();
/// assert_eq!((decision.var, decision.value), (y, 2));
/// ```
#[derive(Debug, Clone)]
pub struct IntStrategy {
    vars: Vec<IntVar>,
    var_selector: VarSelector,
    val_selector: ValSelector,
    seed: u64,
    rng: StdRng,
}

impl IntStrategy {
    pub fn new(vars: Vec<IntVar>, var_selector: VarSelector, val_selector: ValSelector) -> Self {
        Self::with_seed(vars, var_selector, val_selector, rand::random())
    }

    pub fn with_seed(
        vars: Vec<IntVar>,
        var_selector: VarSelector,
        val_selector: ValSelector,
        seed: u64,
    ) -> Self {
        Self {
            vars,
            var_selector,
            val_selector,
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Input order, smallest value first.
    pub fn input_order_min(vars: Vec<IntVar>) -> Self {
        Self::with_seed(vars, VarSelector::InputOrder, ValSelector::Min, 0)
    }

    pub fn vars(&self) -> &[IntVar] {
        &self.vars
    }

    fn select_var(&mut self, model: &Model) -> Option<IntVar> {
        let mut free = self.vars.iter().copied().filter(|&v| !model.is_instantiated(v));
        match self.var_selector {
            VarSelector::InputOrder => free.next(),
            // `min_by_key` keeps the first of equal keys.
            VarSelector::FirstFail => free.min_by_key(|&v| model.size(v)),
            VarSelector::AntiFirstFail => free.min_by_key(|&v| Reverse(model.size(v))),
            VarSelector::Smallest => free.min_by_key(|&v| model.lb(v)),
            VarSelector::Largest => free.min_by_key(|&v| Reverse(model.ub(v))),
            VarSelector::Random => {
                let free: Vec<IntVar> = free.collect();
                if free.is_empty() {
                    None
                } else {
                    Some(free[self.rng.random_range(0..free.len())])
                }
            }
        }
    }

    /// Bounded domains only get decisions whose refutation moves a bound:
    /// removing an interior value from them is a no-op.
    fn select_value(&mut self, model: &Model, var: IntVar) -> Decision {
        let (lb, ub) = (model.lb(var), model.ub(var));
        let mid = lb + ((ub as i128 - lb as i128) / 2) as i64;
        let bounded = !model.domain(var).is_enumerated();
        match self.val_selector {
            ValSelector::Min => Decision::assign(var, lb),
            ValSelector::Max => Decision::assign(var, ub),
            ValSelector::Middle if bounded => Decision::new(var, mid, DecisionOperator::SplitLower),
            ValSelector::Middle => {
                let value = if model.contains(var, mid) {
                    mid
                } else {
                    let below = model.previous_value(var, mid);
                    let above = model.next_value(var, mid);
                    match (below, above) {
                        (Some(b), Some(a)) if mid.abs_diff(b) <= a.abs_diff(mid) => b,
                        (_, Some(a)) => a,
                        (Some(b), None) => b,
                        (None, None) => lb,
                    }
                };
                Decision::assign(var, value)
            }
            ValSelector::Random => {
                let value = if bounded {
                    if self.rng.random_bool(0.5) {
                        lb
                    } else {
                        ub
                    }
                } else {
                    let values = model.values(var);
                    values[self.rng.random_range(0..values.len())]
                };
                Decision::assign(var, value)
            }
            ValSelector::SplitMiddle => Decision::new(var, mid, DecisionOperator::SplitLower),
            ValSelector::ReverseSplitMiddle => {
                Decision::new(var, mid + 1, DecisionOperator::SplitUpper)
            }
        }
    }
}

impl SearchStrategy for IntStrategy {
    fn get_decision(&mut self, model: &Model) -> Option<Decision> {
        let var = self.select_var(model)?;
        Some(self.select_value(model, var))
    }

    fn on_restart(&mut self, restarts: u64) {
        self.rng = StdRng::seed_from_u64(self.seed.wrapping_add(restarts));
    }
}
