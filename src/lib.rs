//! Constraint propagation solving engine.
//!
//! Provides the core of a constraint programming solver over finite integer
//! domains:
//!
//! - **Memory**: a backtrackable environment. Stored cells record their
//!   previous value on a trail the first time they change in a world, and
//!   a world can be popped (undo) or committed (merged into its parent).
//! - **Variables**: integer variables with bounded or enumerated domains,
//!   emitting typed modification events on every change.
//! - **Propagation**: an event-driven engine running propagators by
//!   priority to a fixpoint, with contradiction abort, flush, and dynamic
//!   addition and removal of propagators.
//! - **Constraints**: elementary arithmetic propagators and nogoods.
//! - **Search**: depth-first search with binary decisions, enumeration,
//!   branch-and-bound, restarts with nogood recording, and resource limits.
//!
//! # Architecture
//!
//! A [`Model`](model::Model) owns the variables and the
//! [`Environment`](memory::Environment) holding their domains. The
//! [`PropagationEngine`](propagation::PropagationEngine) owns the
//! propagators and reads the model's event buffer after each execution.
//! [`Solver`] ties both to a search configuration.
//!
//! Contradictions are plain values returned through
//! [`Propagation`](error::Propagation); they never escape a search.

pub mod constraints;
pub mod error;
pub mod memory;
pub mod model;
pub mod propagation;
pub mod search;
pub mod solver;
pub mod variables;

pub use error::{Contradiction, Result, SolverError};
pub use model::Model;
pub use solver::Solver;
