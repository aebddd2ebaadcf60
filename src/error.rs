//! Error types.
//!
//! Two very different kinds of failure exist in a constraint solver:
//!
//! - [`Contradiction`]: a domain would become empty or a propagator detects
//!   an inconsistency. This is normal control flow, always recovered from by
//!   backtracking, and never reaches the caller of `solve`.
//! - [`SolverError`]: the caller asked for something invalid (bad
//!   configuration, malformed model).
//!
//! Invariant violations (world underflow, corrupted trail, propagator scope
//! mismatch) are neither: they panic.

use crate::variables::{Cause, IntVar};
use std::fmt;
use thiserror::Error;

/// Signal that the current search node is infeasible.
///
/// Returned through `Result` by every domain mutator and propagator, and
/// propagated with `?` up to the search loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contradiction {
    /// What triggered the failure.
    pub cause: Cause,
    /// The variable whose domain became empty, if any.
    pub variable: Option<IntVar>,
    /// Short description.
    pub message: &'static str,
}

impl Contradiction {
    /// A domain wipe-out on `variable`.
    pub fn wipe_out(variable: IntVar, cause: Cause) -> Self {
        Self {
            cause,
            variable: Some(variable),
            message: "empty domain",
        }
    }

    /// A failure detected by a propagator without emptying a domain.
    pub fn fail(cause: Cause, message: &'static str) -> Self {
        Self {
            cause,
            variable: None,
            message,
        }
    }
}

impl fmt::Display for Contradiction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.variable {
            Some(var) => write!(f, "{} on {var} ({:?})", self.message, self.cause),
            None => write!(f, "{} ({:?})", self.message, self.cause),
        }
    }
}

/// Result of an operation that may hit a [`Contradiction`].
pub type Propagation<T = ()> = std::result::Result<T, Contradiction>;

/// Errors reported to the caller.
#[derive(Debug, Error)]
pub enum SolverError {
    /// Invalid search configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed model (empty initial domain, foreign variable, ...).
    #[error("model error: {0}")]
    Model(String),
}

/// Result type alias for caller-facing operations.
pub type Result<T> = std::result::Result<T, SolverError>;
