//! Propagators and the engine that runs them to a fixpoint.
//!
//! # Key Components
//!
//! - **Trait**: [`Propagator`]: scope, priority, wake-up conditions and
//!   filtering
//! - **Context**: [`PropagationContext`]: the model as seen by a running
//!   propagator; modifications carry its [`Cause`](crate::variables::Cause)
//! - **Engine**: [`PropagationEngine`]: event-driven scheduling by
//!   [`PropagatorPriority`], contradiction abort, flush, dynamic
//!   addition and removal
//!
//! # References
//!
//! - Schulte & Stuckey (2008), "Efficient Constraint Propagation Engines"
//! - Lagerkvist & Schulte (2009), "Propagator Groups"

mod context;
mod engine;
mod propagator;

pub use context::PropagationContext;
pub use engine::{PropagationEngine, PropagatorState};
pub use propagator::{Entailment, Propagator, PropagatorId, PropagatorPriority};
