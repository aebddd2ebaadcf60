//! Integer variable handles.

use super::domain::IntDomain;
use std::fmt;

/// Handle to an integer variable of a [`Model`](crate::model::Model).
///
/// A handle is a plain index: cheap to copy, hash and store in propagators.
/// It is only meaningful for the model that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IntVar(pub(crate) usize);

impl IntVar {
    /// Position of the variable in its model.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for IntVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Storage behind an [`IntVar`].
#[derive(Debug, Clone)]
pub(crate) struct IntVarData {
    pub(crate) name: String,
    pub(crate) domain: IntDomain,
}
