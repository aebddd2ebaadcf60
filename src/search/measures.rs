//! Search statistics.

use std::fmt;
use std::time::Duration;

/// Counters collected during one search run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Measures {
    /// Opened nodes, the root included.
    pub node_count: u64,
    /// Decisions applied on the way down.
    pub decision_count: u64,
    pub fail_count: u64,
    /// Worlds popped while going up.
    pub backtrack_count: u64,
    pub solution_count: u64,
    pub restart_count: u64,
    pub max_depth: usize,
    /// Propagator executions during this run.
    pub propagation_count: u64,
    /// Best objective value, when optimizing.
    pub best_objective: Option<i64>,
    pub elapsed: Duration,
}

impl fmt::Display for Measures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} solutions, {} nodes, {} fails, {} backtracks, {} restarts, depth {}, {} propagations, {:.3}s",
            self.solution_count,
            self.node_count,
            self.fail_count,
            self.backtrack_count,
            self.restart_count,
            self.max_depth,
            self.propagation_count,
            self.elapsed.as_secs_f64()
        )?;
        if let Some(best) = self.best_objective {
            write!(f, ", best {best}")?;
        }
        Ok(())
    }
}
