//! Search observers.

use super::decision::Decision;
use super::measures::Measures;
use super::solution::{Solution, SolverStatus};
use crate::error::Contradiction;
use crate::model::Model;
use tracing::debug;

/// Read-only callbacks fired by the search loop.
///
/// Every method has an empty default, so an implementation only overrides
/// the events it cares about.
pub trait SearchMonitor {
    /// After the initial propagation succeeded.
    fn on_initialize(&mut self, _model: &Model) {}

    fn on_open_node(&mut self, _model: &Model, _depth: usize) {}

    /// Before the first alternative of `decision` is applied.
    fn on_down_branch(&mut self, _model: &Model, _decision: &Decision) {}

    /// Before the refutation of `decision` is applied.
    fn on_up_branch(&mut self, _model: &Model, _decision: &Decision) {}

    fn on_solution(&mut self, _model: &Model, _solution: &Solution) {}

    fn on_contradiction(&mut self, _contradiction: &Contradiction) {}

    /// After the search went back to the root.
    fn on_restart(&mut self, _model: &Model, _restarts: u64) {}

    fn on_close(&mut self, _measures: &Measures, _status: SolverStatus) {}
}

/// Reports search events as `tracing` debug events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMonitor {
    solutions: u64,
}

impl TracingMonitor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SearchMonitor for TracingMonitor {
    fn on_initialize(&mut self, model: &Model) {
        debug!(event = "root_propagated", model = model.name(), vars = model.var_count());
    }

    fn on_down_branch(&mut self, _model: &Model, decision: &Decision) {
        debug!(event = "down", decision = %decision);
    }

    fn on_up_branch(&mut self, _model: &Model, decision: &Decision) {
        debug!(event = "up", decision = %decision);
    }

    fn on_solution(&mut self, _model: &Model, solution: &Solution) {
        self.solutions += 1;
        debug!(event = "solution", index = self.solutions, objective = ?solution.objective);
    }

    fn on_contradiction(&mut self, contradiction: &Contradiction) {
        debug!(event = "contradiction", reason = %contradiction);
    }

    fn on_restart(&mut self, _model: &Model, restarts: u64) {
        debug!(event = "restart", restarts);
    }

    fn on_close(&mut self, measures: &Measures, status: SolverStatus) {
        debug!(event = "close", status = ?status, measures = %measures);
    }
}
