//! Domain events, propagation conditions and causes.

use super::IntVar;
use crate::propagation::PropagatorId;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Kind of a domain modification.
///
/// Ordered from coarsest to finest: an instantiation is also a bound change,
/// and a bound change is also a value removal. [`EventKind::mask`] encodes
/// this, so a propagator listening to removals is woken by every event while
/// one listening to instantiations only is woken the least.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EventKind {
    /// The domain became a singleton.
    Instantiate,
    /// The lower bound increased.
    IncLow,
    /// The upper bound decreased.
    DecUpp,
    /// Both bounds moved.
    Bounds,
    /// An interior value was removed.
    Remove,
}

impl EventKind {
    /// Bits of every condition this event satisfies.
    pub fn mask(self) -> EventMask {
        match self {
            EventKind::Instantiate => EventMask::ALL,
            EventKind::IncLow => EventMask::INCLOW | EventMask::REMOVE,
            EventKind::DecUpp => EventMask::DECUPP | EventMask::REMOVE,
            EventKind::Bounds => EventMask::INCLOW | EventMask::DECUPP | EventMask::REMOVE,
            EventKind::Remove => EventMask::REMOVE,
        }
    }

    /// Combines two events fired on the same variable by one mutation.
    pub(crate) fn merge(self, other: EventKind) -> EventKind {
        use EventKind::*;
        match (self, other) {
            (Instantiate, _) | (_, Instantiate) => Instantiate,
            (IncLow, IncLow) => IncLow,
            (DecUpp, DecUpp) => DecUpp,
            (Remove, e) | (e, Remove) => e,
            _ => Bounds,
        }
    }
}

/// Set of event bits; used both for fired events and for the conditions a
/// propagator declares per variable.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EventMask(u8);

impl EventMask {
    pub const VOID: EventMask = EventMask(0);
    pub const INSTANTIATE: EventMask = EventMask(1);
    pub const INCLOW: EventMask = EventMask(2);
    pub const DECUPP: EventMask = EventMask(4);
    pub const REMOVE: EventMask = EventMask(8);
    pub const ALL: EventMask = EventMask(15);

    /// Wake on instantiation only.
    pub const fn instantiation() -> Self {
        Self::INSTANTIATE
    }

    /// Wake on any bound change, instantiation included.
    pub const fn bound_and_inst() -> Self {
        EventMask(Self::INSTANTIATE.0 | Self::INCLOW.0 | Self::DECUPP.0)
    }

    /// Wake on every modification.
    pub const fn all() -> Self {
        Self::ALL
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether the two masks share a bit.
    pub fn intersects(self, other: EventMask) -> bool {
        self.0 & other.0 != 0
    }

    /// Whether every bit of `other` is set in `self`.
    pub fn contains(self, other: EventMask) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for EventMask {
    type Output = EventMask;

    fn bitor(self, rhs: EventMask) -> EventMask {
        EventMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for EventMask {
    fn bitor_assign(&mut self, rhs: EventMask) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for EventMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (EventMask::INSTANTIATE, "INST"),
            (EventMask::INCLOW, "INCLOW"),
            (EventMask::DECUPP, "DECUPP"),
            (EventMask::REMOVE, "REMOVE"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(bit, _)| self.contains(*bit))
            .map(|(_, name)| *name)
            .collect();
        if set.is_empty() {
            write!(f, "VOID")
        } else {
            write!(f, "{}", set.join("|"))
        }
    }
}

/// Origin of a domain modification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cause {
    /// Model construction, outside of any propagation.
    Null,
    /// A search decision (or its refutation).
    Decision,
    /// A propagator; its own events do not wake it again.
    Propagator(PropagatorId),
    /// The branch-and-bound objective cut.
    Objective,
    /// Root-level work after a restart.
    Restart,
}

/// A modification notified to the propagation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarEvent {
    pub var: IntVar,
    pub kind: EventKind,
    pub cause: Cause,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coarse_to_fine() {
        let inst = EventMask::instantiation();
        let bounds = EventMask::bound_and_inst();
        let all = EventMask::all();

        assert!(EventKind::Instantiate.mask().intersects(inst));
        assert!(!EventKind::IncLow.mask().intersects(inst));
        assert!(EventKind::IncLow.mask().intersects(bounds));
        assert!(!EventKind::Remove.mask().intersects(bounds));
        assert!(EventKind::Remove.mask().intersects(all));
        assert!(EventKind::Instantiate.mask().intersects(EventMask::REMOVE));
    }

    #[test]
    fn test_merge() {
        assert_eq!(EventKind::IncLow.merge(EventKind::DecUpp), EventKind::Bounds);
        assert_eq!(EventKind::Remove.merge(EventKind::IncLow), EventKind::IncLow);
        assert_eq!(
            EventKind::Bounds.merge(EventKind::Instantiate),
            EventKind::Instantiate
        );
    }

    #[test]
    fn test_mask_debug() {
        assert_eq!(format!("{:?}", EventMask::bound_and_inst()), "INST|INCLOW|DECUPP");
        assert_eq!(format!("{:?}", EventMask::VOID), "VOID");
    }
}
