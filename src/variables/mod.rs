//! Integer variables, their domains and modification events.
//!
//! # Key Components
//!
//! - **Handle**: [`IntVar`]: index of a variable in its model
//! - **Domain**: [`IntDomain`]: bounded interval or enumerated bitset, both
//!   stored in backtrackable cells
//! - **Events**: [`EventKind`], [`EventMask`], [`Cause`]: modifications, the
//!   conditions that wake propagators on them, and their origin
//!
//! Domains are read and written through [`Model`](crate::model::Model),
//! which attaches the cause and forwards each event to the propagation
//! engine.

mod domain;
mod events;
mod int_var;

pub use domain::{DomainUpdate, EmptyDomain, IntDomain, Universe};
pub use events::{Cause, EventKind, EventMask, VarEvent};
pub use int_var::IntVar;

pub(crate) use int_var::IntVarData;
