//! Search configuration, limits and restart policies.

use crate::error::{Result, SolverError};

/// When the search unwinds to the root and starts over.
///
/// Restart thresholds count nodes opened since the previous restart.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RestartPolicy {
    #[default]
    Never,
    /// After every solution. Mostly useful with an objective.
    OnSolution,
    /// `scale * luby(i)` nodes before the `i`-th restart.
    ///
    /// Reference: Luby, Sinclair & Zuckerman (1993)
    Luby {
        scale: u64,
    },
    /// `scale * factor^i` nodes before the `i`-th restart.
    Geometric {
        scale: u64,
        /// Growth factor, at least 1.
        factor: f64,
    },
}

/// Configuration of a search run.
///
/// Every limit is optional; an unset limit never stops the search.
///
/// # Examples
///
/// ```
/// use u_cpsolve::search::{RestartPolicy, SearchConfig};
///
/// let config = SearchConfig::default()
///     .with_node_limit(10_000)
///     .with_time_limit_ms(500)
///     .with_restart(RestartPolicy::Luby { scale: 32 })
///     .with_nogoods_on_restart(true)
///     .with_seed(42);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SearchConfig {
    /// Maximum number of opened nodes.
    pub node_limit: Option<u64>,

    /// Maximum number of failures.
    pub fail_limit: Option<u64>,

    /// Stop after this many solutions.
    pub solution_limit: Option<u64>,

    /// Wall-clock budget in milliseconds.
    pub time_limit_ms: Option<u64>,

    pub restart: RestartPolicy,

    /// Record the nogoods of the current path before each restart.
    pub nogoods_on_restart: bool,

    /// Random seed for randomized heuristics.
    pub seed: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            node_limit: None,
            fail_limit: None,
            solution_limit: None,
            time_limit_ms: None,
            restart: RestartPolicy::Never,
            nogoods_on_restart: false,
            seed: None,
        }
    }
}

impl SearchConfig {
    pub fn with_node_limit(mut self, n: u64) -> Self {
        self.node_limit = Some(n);
        self
    }

    pub fn with_fail_limit(mut self, n: u64) -> Self {
        self.fail_limit = Some(n);
        self
    }

    pub fn with_solution_limit(mut self, n: u64) -> Self {
        self.solution_limit = Some(n);
        self
    }

    pub fn with_time_limit_ms(mut self, ms: u64) -> Self {
        self.time_limit_ms = Some(ms);
        self
    }

    pub fn with_restart(mut self, restart: RestartPolicy) -> Self {
        self.restart = restart;
        self
    }

    pub fn with_nogoods_on_restart(mut self, enabled: bool) -> Self {
        self.nogoods_on_restart = enabled;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.solution_limit == Some(0) {
            return Err(SolverError::Config("solution_limit must be positive".into()));
        }
        match self.restart {
            RestartPolicy::Luby { scale } if scale == 0 => {
                Err(SolverError::Config("luby scale must be positive".into()))
            }
            RestartPolicy::Geometric { scale, .. } if scale == 0 => {
                Err(SolverError::Config("geometric scale must be positive".into()))
            }
            RestartPolicy::Geometric { factor, .. } if !factor.is_finite() || factor < 1.0 => {
                Err(SolverError::Config(format!(
                    "geometric factor must be a finite value >= 1, got {factor}"
                )))
            }
            _ => Ok(()),
        }
    }
}
