//! Disequalities.

use crate::error::Propagation;
use crate::model::Model;
use crate::propagation::{Entailment, PropagationContext, Propagator, PropagatorPriority};
use crate::variables::{EventMask, IntVar};

/// `x != c`.
#[derive(Debug, Clone)]
pub struct NotEqualConst {
    vars: [IntVar; 1],
    constant: i64,
}

impl NotEqualConst {
    pub fn new(x: IntVar, constant: i64) -> Self {
        Self {
            vars: [x],
            constant,
        }
    }
}

impl Propagator for NotEqualConst {
    fn name(&self) -> &str {
        "NotEqualConst"
    }

    fn variables(&self) -> &[IntVar] {
        &self.vars
    }

    fn priority(&self) -> PropagatorPriority {
        PropagatorPriority::Unary
    }

    fn propagation_conditions(&self, _index: usize) -> EventMask {
        EventMask::instantiation()
    }

    fn propagate(&self, ctx: &mut PropagationContext<'_>) -> Propagation {
        let x = self.vars[0];
        // Bounded domains keep interior values; stay active until it is gone.
        if ctx.remove_value(x, self.constant)? || !ctx.contains(x, self.constant) {
            ctx.set_passive();
        }
        Ok(())
    }

    fn is_entailed(&self, model: &Model) -> Entailment {
        let x = self.vars[0];
        if !model.contains(x, self.constant) {
            Entailment::True
        } else if model.is_instantiated(x) {
            Entailment::False
        } else {
            Entailment::Undefined
        }
    }
}

/// `x + y != c`.
///
/// Wakes on instantiation for enumerated variables and on any bound change
/// for bounded ones, whose interior values cannot be removed.
#[derive(Debug, Clone)]
pub struct NotEqualXYC {
    vars: [IntVar; 2],
    enumerated: [bool; 2],
    constant: i64,
}

impl NotEqualXYC {
    pub fn new(model: &Model, x: IntVar, y: IntVar, constant: i64) -> Self {
        Self {
            vars: [x, y],
            enumerated: [
                model.domain(x).is_enumerated(),
                model.domain(y).is_enumerated(),
            ],
            constant,
        }
    }

    /// Whether the bounds of `x + y` already miss the constant.
    fn sum_excludes_constant(&self, model: &Model) -> bool {
        let [x, y] = self.vars;
        let c = self.constant as i128;
        model.lb(x) as i128 + model.lb(y) as i128 > c || model.ub(x) as i128 + (model.ub(y) as i128) < c
    }

    /// Removes `c - value(from)` from `to`, passivating once it is gone.
    fn remove_support(
        &self,
        ctx: &mut PropagationContext<'_>,
        from: IntVar,
        to: IntVar,
    ) -> Propagation {
        if let Some(value) = ctx.value(from) {
            // Out of range: no value of `to` completes the sum.
            let Some(forbidden) = self.constant.checked_sub(value) else {
                ctx.set_passive();
                return Ok(());
            };
            if ctx.remove_value(to, forbidden)? || !ctx.contains(to, forbidden) {
                ctx.set_passive();
            }
        }
        Ok(())
    }
}

impl Propagator for NotEqualXYC {
    fn name(&self) -> &str {
        "NotEqualXYC"
    }

    fn variables(&self) -> &[IntVar] {
        &self.vars
    }

    fn priority(&self) -> PropagatorPriority {
        PropagatorPriority::Binary
    }

    fn propagation_conditions(&self, index: usize) -> EventMask {
        if self.enumerated[index] {
            EventMask::instantiation()
        } else {
            EventMask::bound_and_inst()
        }
    }

    fn propagate(&self, ctx: &mut PropagationContext<'_>) -> Propagation {
        let [x, y] = self.vars;
        if ctx.is_instantiated(x) {
            self.remove_support(ctx, x, y)
        } else if ctx.is_instantiated(y) {
            self.remove_support(ctx, y, x)
        } else {
            if self.sum_excludes_constant(ctx.model()) {
                ctx.set_passive();
            }
            Ok(())
        }
    }

    fn is_entailed(&self, model: &Model) -> Entailment {
        let [x, y] = self.vars;
        if self.sum_excludes_constant(model) {
            return Entailment::True;
        }
        match (model.value(x), model.value(y)) {
            (Some(a), Some(b)) if a as i128 + b as i128 == self.constant as i128 => {
                Entailment::False
            }
            (Some(_), Some(_)) => Entailment::True,
            _ => Entailment::Undefined,
        }
    }
}
