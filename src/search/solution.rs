//! Solutions and search outcomes.

use super::measures::Measures;
use crate::model::Model;
use crate::variables::IntVar;

/// Outcome of a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SolverStatus {
    /// Proven optimal solution found.
    Optimal,
    /// At least one solution found.
    Feasible,
    /// The search space was exhausted without a solution.
    Infeasible,
    /// A limit stopped the search before any solution.
    Unknown,
}

/// Why a search stopped before exhausting its tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StopReason {
    NodeLimit,
    FailLimit,
    SolutionLimit,
    TimeLimit,
    Cancelled,
}

/// Values of every variable at a solution node.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Solution {
    values: Vec<i64>,
    /// Objective value, when optimizing.
    pub objective: Option<i64>,
}

impl Solution {
    /// Captures the current values of a fully instantiated model.
    ///
    /// # Panics
    ///
    /// Panics if a variable is not instantiated.
    pub(crate) fn capture(model: &Model, objective: Option<i64>) -> Self {
        let values = model
            .vars()
            .map(|v| {
                model
                    .value(v)
                    .unwrap_or_else(|| panic!("solution with {} uninstantiated", model.var_name(v)))
            })
            .collect();
        Self { values, objective }
    }

    /// Value of `var`.
    ///
    /// # Panics
    ///
    /// Panics if `var` did not exist when the solution was recorded.
    pub fn value(&self, var: IntVar) -> i64 {
        self.values[var.index()]
    }

    pub fn get(&self, var: IntVar) -> Option<i64> {
        self.values.get(var.index()).copied()
    }

    pub fn values(&self) -> &[i64] {
        &self.values
    }
}

/// Result of a search run.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub status: SolverStatus,

    /// Last solution found; the best one when optimizing.
    pub solution: Option<Solution>,

    pub measures: Measures,

    /// Set when a limit or a cancellation ended the run.
    pub stopped: Option<StopReason>,
}

impl SearchResult {
    /// Whether a solution was found.
    pub fn is_solution_found(&self) -> bool {
        matches!(self.status, SolverStatus::Optimal | SolverStatus::Feasible)
    }
}
