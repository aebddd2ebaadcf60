//! Elementary propagators.
//!
//! A small set of arithmetic filtering algorithms, plus the [`Nogood`]
//! propagator used to record explored subtrees across restarts.
//!
//! | propagator | relation |
//! |---|---|
//! | [`NotEqualConst`] | `x != c` |
//! | [`NotEqualXYC`] | `x + y != c` |
//! | [`DistanceXYC`] | `abs(x - y) op c` |
//! | [`LinearSum`] | `sum(a_i * x_i) op c` |
//! | [`Nogood`] | `not(l_1 and ... and l_k)` |

mod distance;
mod linear;
mod nogood;
mod not_equal;

pub use distance::DistanceXYC;
pub use linear::LinearSum;
pub use nogood::{Literal, Nogood};
pub use not_equal::{NotEqualConst, NotEqualXYC};

use std::fmt;

/// Comparison operator of an arithmetic relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
        };
        f.write_str(s)
    }
}
