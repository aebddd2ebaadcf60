//! Depth-first tree search over a propagated model.
//!
//! The search alternates decisions and propagation. A decision is pushed
//! in a fresh world; on contradiction the search pops back and applies the
//! refutation. Branch-and-bound keeps the best objective value outside the
//! environment so that backtracking never loosens it, and restarts unwind
//! to the root, optionally recording what was explored as nogoods.
//!
//! # Key Types
//!
//! - [`Decision`], [`DecisionOperator`], [`DecisionPath`]: binary branching
//!   and the stack of open decisions
//! - [`SearchStrategy`], [`IntStrategy`]: decision heuristics over integer
//!   variables ([`VarSelector`], [`ValSelector`])
//! - [`SearchConfig`], [`RestartPolicy`]: limits and restarts
//! - [`SearchMonitor`], [`TracingMonitor`]: read-only observers
//! - [`SearchResult`], [`SolverStatus`], [`Solution`], [`Measures`]
//!
//! # References
//!
//! - Luby, Sinclair & Zuckerman (1993), "Optimal Speedup of Las Vegas
//!   Algorithms"
//! - Lecoutre et al. (2007), "Recording and Minimizing Nogoods from Restarts"

mod config;
mod decision;
mod measures;
mod monitors;
mod objective;
mod restart;
mod runner;
mod solution;
mod strategy;

pub use config::{RestartPolicy, SearchConfig};
pub use decision::{Decision, DecisionOperator, DecisionPath};
pub use measures::Measures;
pub use monitors::{SearchMonitor, TracingMonitor};
pub use objective::Objective;
pub use solution::{SearchResult, Solution, SolverStatus, StopReason};
pub use strategy::{IntStrategy, SearchStrategy, ValSelector, VarSelector};

pub(crate) use runner::SearchLoop;
