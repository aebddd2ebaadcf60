//! Propagator trait and its descriptors.

use super::PropagationContext;
use crate::error::Propagation;
use crate::model::Model;
use crate::variables::{EventMask, IntVar};
use std::fmt;

/// Identifier handed out by the engine when a propagator is posted.
///
/// Ids are never reused, even after removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropagatorId(pub(crate) usize);

impl PropagatorId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for PropagatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// Scheduling class of a propagator. Cheaper classes run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PropagatorPriority {
    Unary,
    Binary,
    Ternary,
    Linear,
    Quadratic,
    Global,
}

impl PropagatorPriority {
    pub const COUNT: usize = 6;

    /// Queue index, 0 being drained first.
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Truth value of a constraint over the current domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Entailment {
    /// Satisfied by every remaining assignment.
    True,
    /// Violated by every remaining assignment.
    False,
    /// Not decided yet.
    Undefined,
}

/// A filtering algorithm over a fixed list of variables.
///
/// Implementations hold no mutable state of their own: anything that must
/// survive between calls lives in cells of the model's environment, so that
/// it is rolled back with the domains.
///
/// The engine calls [`propagate`](Propagator::propagate) for the initial
/// pass and after dynamic addition. Later wake-ups go through
/// [`propagate_on`](Propagator::propagate_on), once per variable that fired,
/// when [`reacts_on_events`](Propagator::reacts_on_events) is set; otherwise
/// they also use `propagate`.
pub trait Propagator: fmt::Debug {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Scope of the propagator. Must not change after posting.
    fn variables(&self) -> &[IntVar];

    fn priority(&self) -> PropagatorPriority;

    /// Events on `variables()[index]` that wake this propagator.
    fn propagation_conditions(&self, _index: usize) -> EventMask {
        EventMask::all()
    }

    /// Full filtering.
    fn propagate(&self, ctx: &mut PropagationContext<'_>) -> Propagation;

    /// Incremental filtering after `mask` fired on `variables()[index]`.
    fn propagate_on(
        &self,
        ctx: &mut PropagationContext<'_>,
        _index: usize,
        _mask: EventMask,
    ) -> Propagation {
        self.propagate(ctx)
    }

    /// Whether wake-ups should be delivered per variable.
    fn reacts_on_events(&self) -> bool {
        false
    }

    fn is_entailed(&self, model: &Model) -> Entailment;
}
