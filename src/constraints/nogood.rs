//! Forbidden partial assignments.

use crate::error::Propagation;
use crate::model::Model;
use crate::propagation::{Entailment, PropagationContext, Propagator, PropagatorPriority};
use crate::variables::{EventMask, IntVar};
use std::fmt;

/// `x = v` or `x != v`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Literal {
    pub var: IntVar,
    pub value: i64,
    pub equal: bool,
}

impl Literal {
    pub fn eq(var: IntVar, value: i64) -> Self {
        Self {
            var,
            value,
            equal: true,
        }
    }

    pub fn ne(var: IntVar, value: i64) -> Self {
        Self {
            var,
            value,
            equal: false,
        }
    }

    /// `Some(truth)` once the domain of the variable decides the literal.
    pub fn truth(&self, model: &Model) -> Option<bool> {
        let fixed = model.value(self.var) == Some(self.value);
        if fixed {
            Some(self.equal)
        } else if !model.contains(self.var, self.value) {
            Some(!self.equal)
        } else {
            None
        }
    }

    /// Makes the literal false.
    fn falsify(&self, ctx: &mut PropagationContext<'_>) -> Propagation<bool> {
        if self.equal {
            ctx.remove_value(self.var, self.value)
        } else {
            ctx.instantiate_to(self.var, self.value)
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = if self.equal { "=" } else { "!=" };
        write!(f, "{} {op} {}", self.var, self.value)
    }
}

/// `not(l_1 and ... and l_k)`: at least one literal must be false.
///
/// Once every literal but one is true, the last one is falsified. A nogood
/// with a false literal is entailed and goes passive. An `x = v` literal on
/// a bounded variable with `v` strictly inside its bounds stays open until
/// the value reaches a bound or the variable is instantiated.
#[derive(Debug, Clone)]
pub struct Nogood {
    literals: Vec<Literal>,
    vars: Vec<IntVar>,
}

impl Nogood {
    pub fn new(literals: Vec<Literal>) -> Self {
        let vars = literals.iter().map(|l| l.var).collect();
        Self { literals, vars }
    }

    pub fn literals(&self) -> &[Literal] {
        &self.literals
    }
}

impl Propagator for Nogood {
    fn name(&self) -> &str {
        "Nogood"
    }

    fn variables(&self) -> &[IntVar] {
        &self.vars
    }

    fn priority(&self) -> PropagatorPriority {
        PropagatorPriority::Linear
    }

    fn propagation_conditions(&self, index: usize) -> EventMask {
        // `x = v` turns true only on instantiation; a bound reaching `v`
        // lets a bounded domain falsify it.
        if self.literals[index].equal {
            EventMask::bound_and_inst()
        } else {
            EventMask::all()
        }
    }

    fn propagate(&self, ctx: &mut PropagationContext<'_>) -> Propagation {
        let mut open = None;
        let mut open_count = 0;
        for literal in &self.literals {
            match literal.truth(ctx.model()) {
                Some(false) => {
                    ctx.set_passive();
                    return Ok(());
                }
                Some(true) => {}
                None => {
                    open = Some(*literal);
                    open_count += 1;
                }
            }
        }
        match (open, open_count) {
            (None, _) => Err(ctx.fail("nogood violated")),
            (Some(literal), 1) => {
                literal.falsify(ctx)?;
                // A bounded domain cannot drop an interior value.
                if literal.truth(ctx.model()) == Some(false) {
                    ctx.set_passive();
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn is_entailed(&self, model: &Model) -> Entailment {
        let mut all_true = true;
        for literal in &self.literals {
            match literal.truth(model) {
                Some(false) => return Entailment::True,
                Some(true) => {}
                None => all_true = false,
            }
        }
        if all_true {
            Entailment::False
        } else {
            Entailment::Undefined
        }
    }
}
