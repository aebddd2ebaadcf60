//! Branching decisions and the path from the root.

use crate::constraints::{Literal, Nogood};
use crate::error::Propagation;
use crate::model::Model;
use crate::variables::{Cause, IntVar};
use std::fmt;

/// How a decision splits the domain of its variable.
///
/// Every operator is binary: the first alternative is applied on the way
/// down, its negation on refutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DecisionOperator {
    /// `x = v`, then `x != v`. The refutation only prunes a bounded
    /// domain when `v` is one of its bounds.
    Assign,
    /// `x != v`, then `x = v`.
    Remove,
    /// `x <= v`, then `x >= v + 1`.
    SplitLower,
    /// `x >= v`, then `x <= v - 1`.
    SplitUpper,
}

impl DecisionOperator {
    fn apply(self, model: &mut Model, var: IntVar, value: i64) -> Propagation {
        let cause = Cause::Decision;
        match self {
            DecisionOperator::Assign => model.instantiate_to(var, value, cause),
            DecisionOperator::Remove => model.remove_value(var, value, cause),
            DecisionOperator::SplitLower => model.update_upper_bound(var, value, cause),
            DecisionOperator::SplitUpper => model.update_lower_bound(var, value, cause),
        }
        .map(|_| ())
    }

    fn refute(self, model: &mut Model, var: IntVar, value: i64) -> Propagation {
        let cause = Cause::Decision;
        match self {
            DecisionOperator::Assign => model.remove_value(var, value, cause),
            DecisionOperator::Remove => model.instantiate_to(var, value, cause),
            DecisionOperator::SplitLower => model.update_lower_bound(var, value + 1, cause),
            DecisionOperator::SplitUpper => model.update_upper_bound(var, value - 1, cause),
        }
        .map(|_| ())
    }

    fn symbols(self) -> (&'static str, &'static str) {
        match self {
            DecisionOperator::Assign => ("=", "!="),
            DecisionOperator::Remove => ("!=", "="),
            DecisionOperator::SplitLower => ("<=", ">"),
            DecisionOperator::SplitUpper => (">=", "<"),
        }
    }
}

/// One branching point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Decision {
    pub var: IntVar,
    pub value: i64,
    pub operator: DecisionOperator,
    /// Alternatives applied so far.
    branch: u8,
}

impl Decision {
    pub const ARITY: u8 = 2;

    pub fn new(var: IntVar, value: i64, operator: DecisionOperator) -> Self {
        Self {
            var,
            value,
            operator,
            branch: 0,
        }
    }

    pub fn assign(var: IntVar, value: i64) -> Self {
        Self::new(var, value, DecisionOperator::Assign)
    }

    /// Whether an alternative remains to be applied.
    pub fn has_next(&self) -> bool {
        self.branch < Self::ARITY
    }

    /// Alternatives not tried yet.
    pub fn tries_left(&self) -> u8 {
        Self::ARITY - self.branch
    }

    /// Whether the first alternative is the one currently applied.
    pub fn is_first_branch(&self) -> bool {
        self.branch == 1
    }

    /// Applies the next alternative.
    ///
    /// # Panics
    ///
    /// Panics if every alternative was already applied.
    pub fn apply_next(&mut self, model: &mut Model) -> Propagation {
        assert!(self.has_next(), "decision {self} has no alternative left");
        self.branch += 1;
        if self.branch == 1 {
            self.operator.apply(model, self.var, self.value)
        } else {
            self.operator.refute(model, self.var, self.value)
        }
    }

    /// The first alternative as a literal, for value-based operators.
    fn first_literal(&self) -> Option<Literal> {
        match self.operator {
            DecisionOperator::Assign => Some(Literal::eq(self.var, self.value)),
            DecisionOperator::Remove => Some(Literal::ne(self.var, self.value)),
            DecisionOperator::SplitLower | DecisionOperator::SplitUpper => None,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (first, second) = self.operator.symbols();
        let op = if self.branch <= 1 { first } else { second };
        write!(f, "{} {op} {}", self.var, self.value)
    }
}

/// Decisions from the root to the current node.
///
/// The parent of entry `i` is entry `i - 1`; the root is the empty path.
/// Entry `i` has its current alternative applied in the `i + 1`-th world
/// above the search root.
#[derive(Debug, Clone, Default)]
pub struct DecisionPath {
    decisions: Vec<Decision>,
}

impl DecisionPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    pub fn push(&mut self, decision: Decision) {
        self.decisions.push(decision);
    }

    pub fn pop(&mut self) -> Option<Decision> {
        self.decisions.pop()
    }

    pub fn last(&self) -> Option<&Decision> {
        self.decisions.last()
    }

    pub fn last_mut(&mut self) -> Option<&mut Decision> {
        self.decisions.last_mut()
    }

    pub fn clear(&mut self) {
        self.decisions.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Decision> + '_ {
        self.decisions.iter()
    }

    /// Nogoods proven by the path: one per refuted decision, forbidding its
    /// first alternative under the first alternatives of its ancestors.
    ///
    /// Extraction stops at the first bound-splitting decision.
    pub fn nogoods(&self) -> Vec<Nogood> {
        let mut prefix = Vec::new();
        let mut nogoods = Vec::new();
        for decision in &self.decisions {
            let Some(literal) = decision.first_literal() else {
                break;
            };
            if decision.is_first_branch() {
                prefix.push(literal);
            } else {
                let mut literals = prefix.clone();
                literals.push(literal);
                nogoods.push(Nogood::new(literals));
            }
        }
        nogoods
    }
}
