//! Backtrackable memory.
//!
//! Every piece of solver state that must be undone on backtrack lives in a
//! stored cell owned by an [`Environment`]. Cells are referenced by small
//! copyable handles ([`Stored`], [`StoredVector`]) and the environment is the
//! only writer, so there is no aliasing between propagators and search.
//!
//! # Key Components
//!
//! - **Environment**: [`Environment`]: world stack (`world_push`,
//!   `world_pop`, `world_commit`) and cell arenas
//! - **Cells**: [`StoredInt`], [`StoredBool`], [`StoredDouble`],
//!   [`StoredVector`]
//!
//! # References
//!
//! Schulte (1999), "Comparing Trailing and Copying for Constraint
//! Programming"

mod environment;
mod trail;

pub use environment::{
    Environment, Stored, StoredBool, StoredDouble, StoredInt, StoredVector, Trailable,
};
