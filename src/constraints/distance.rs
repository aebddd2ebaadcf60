//! `abs(x - y) op c`.

use super::Operator;
use crate::error::{Propagation, Result, SolverError};
use crate::model::Model;
use crate::propagation::{Entailment, PropagationContext, Propagator, PropagatorPriority};
use crate::variables::{EventMask, IntVar};

/// Distance between two variables compared to a constant.
///
/// Supported operators are `=`, `!=`, `<` and `>`. With `=`, holes are
/// filtered on enumerated domains; the other operators reason on bounds
/// (`>` removes the forbidden window, which punches holes in enumerated
/// domains).
#[derive(Debug, Clone)]
pub struct DistanceXYC {
    vars: [IntVar; 2],
    enumerated: [bool; 2],
    op: Operator,
    constant: i64,
}

impl DistanceXYC {
    /// # Errors
    ///
    /// Returns [`SolverError::Model`] for `<=` and `>=`.
    pub fn new(model: &Model, x: IntVar, y: IntVar, op: Operator, constant: i64) -> Result<Self> {
        if !matches!(op, Operator::Eq | Operator::Ne | Operator::Lt | Operator::Gt) {
            return Err(SolverError::Model(format!(
                "unexpected operator for distance: {op}"
            )));
        }
        Ok(Self {
            vars: [x, y],
            enumerated: [
                model.domain(x).is_enumerated(),
                model.domain(y).is_enumerated(),
            ],
            op,
            constant,
        })
    }

    /// `|a - b| = c` filtering of `a` against `b`. Returns whether `a` changed.
    fn filter_eq(&self, ctx: &mut PropagationContext<'_>, a: IntVar, b: IntVar) -> Propagation<bool> {
        let c = self.constant;
        let mut changed =
            ctx.update_bounds(a, ctx.lb(b).saturating_sub(c), ctx.ub(b).saturating_add(c))?;

        let model = ctx.model();
        // Smallest value of `a` at or above its lower bound with a support in `b`.
        let from = ctx.lb(a);
        let lo = [
            next_at_or_after(model, b, from.saturating_sub(c)).map(|w| w.saturating_add(c)),
            next_at_or_after(model, b, from.saturating_add(c)).map(|w| w.saturating_sub(c)),
        ]
        .into_iter()
        .flatten()
        .min();
        let to = ctx.ub(a);
        let hi = [
            prev_at_or_before(model, b, to.saturating_sub(c)).map(|w| w.saturating_add(c)),
            prev_at_or_before(model, b, to.saturating_add(c)).map(|w| w.saturating_sub(c)),
        ]
        .into_iter()
        .flatten()
        .max();
        match (lo, hi) {
            (Some(lo), Some(hi)) => changed |= ctx.update_bounds(a, lo, hi)?,
            _ => return Err(ctx.fail("no support for distance")),
        }

        if self.enumerated[self.index_of(a)] {
            let model = ctx.model();
            let unsupported: Vec<i64> = model
                .values(a)
                .into_iter()
                .filter(|&v| !holds(model, b, v.checked_sub(c)) && !holds(model, b, v.checked_add(c)))
                .collect();
            for v in unsupported {
                changed |= ctx.remove_value(a, v)?;
            }
        }
        Ok(changed)
    }

    fn index_of(&self, var: IntVar) -> usize {
        usize::from(var != self.vars[0])
    }

    fn propagate_eq(&self, ctx: &mut PropagationContext<'_>) -> Propagation {
        if self.constant < 0 {
            return Err(ctx.fail("negative distance"));
        }
        let [x, y] = self.vars;
        loop {
            let changed_x = self.filter_eq(ctx, x, y)?;
            let changed_y = self.filter_eq(ctx, y, x)?;
            if !changed_x && !changed_y {
                break;
            }
        }
        if ctx.is_instantiated(x) && ctx.is_instantiated(y) {
            ctx.set_passive();
        }
        Ok(())
    }

    fn propagate_ne(&self, ctx: &mut PropagationContext<'_>) -> Propagation {
        if self.constant < 0 {
            ctx.set_passive();
            return Ok(());
        }
        let [x, y] = self.vars;
        let c = self.constant;
        for (a, b) in [(x, y), (y, x)] {
            if let Some(v) = ctx.value(a) {
                let (below, above) = (v.checked_sub(c), v.checked_add(c));
                for w in [below, above].into_iter().flatten() {
                    ctx.remove_value(b, w)?;
                }
                if !holds(ctx.model(), b, below) && !holds(ctx.model(), b, above) {
                    ctx.set_passive();
                }
                return Ok(());
            }
        }
        Ok(())
    }

    fn propagate_lt(&self, ctx: &mut PropagationContext<'_>) -> Propagation {
        if self.constant <= 0 {
            return Err(ctx.fail("distance below a non-positive constant"));
        }
        let [x, y] = self.vars;
        let c = self.constant;
        loop {
            let changed_x =
                ctx.update_bounds(x, ctx.lb(y).saturating_sub(c - 1), ctx.ub(y).saturating_add(c - 1))?;
            let changed_y =
                ctx.update_bounds(y, ctx.lb(x).saturating_sub(c - 1), ctx.ub(x).saturating_add(c - 1))?;
            if !changed_x && !changed_y {
                break;
            }
        }
        if self.is_entailed(ctx.model()) == Entailment::True {
            ctx.set_passive();
        }
        Ok(())
    }

    fn propagate_gt(&self, ctx: &mut PropagationContext<'_>) -> Propagation {
        if self.constant < 0 {
            ctx.set_passive();
            return Ok(());
        }
        let [x, y] = self.vars;
        let c = self.constant;
        loop {
            // Values of `a` within `c` of every value of `b` have no support.
            let changed_x =
                ctx.remove_interval(x, ctx.ub(y).saturating_sub(c), ctx.lb(y).saturating_add(c))?;
            let changed_y =
                ctx.remove_interval(y, ctx.ub(x).saturating_sub(c), ctx.lb(x).saturating_add(c))?;
            if !changed_x && !changed_y {
                break;
            }
        }
        if self.is_entailed(ctx.model()) == Entailment::True {
            ctx.set_passive();
        }
        Ok(())
    }
}

/// Whether `var` can take `value`; out-of-range values never fit.
fn holds(model: &Model, var: IntVar, value: Option<i64>) -> bool {
    value.is_some_and(|v| model.contains(var, v))
}

fn next_at_or_after(model: &Model, var: IntVar, value: i64) -> Option<i64> {
    if model.contains(var, value) {
        Some(value)
    } else {
        model.next_value(var, value)
    }
}

fn prev_at_or_before(model: &Model, var: IntVar, value: i64) -> Option<i64> {
    if model.contains(var, value) {
        Some(value)
    } else {
        model.previous_value(var, value)
    }
}

impl Propagator for DistanceXYC {
    fn name(&self) -> &str {
        "DistanceXYC"
    }

    fn variables(&self) -> &[IntVar] {
        &self.vars
    }

    fn priority(&self) -> PropagatorPriority {
        PropagatorPriority::Binary
    }

    fn propagation_conditions(&self, index: usize) -> EventMask {
        match self.op {
            Operator::Ne => EventMask::instantiation(),
            Operator::Eq if self.enumerated[index] => EventMask::all(),
            _ => EventMask::bound_and_inst(),
        }
    }

    fn propagate(&self, ctx: &mut PropagationContext<'_>) -> Propagation {
        match self.op {
            Operator::Eq => self.propagate_eq(ctx),
            Operator::Ne => self.propagate_ne(ctx),
            Operator::Lt => self.propagate_lt(ctx),
            Operator::Gt => self.propagate_gt(ctx),
            Operator::Le | Operator::Ge => unreachable!("rejected at construction"),
        }
    }

    fn is_entailed(&self, model: &Model) -> Entailment {
        let [x, y] = self.vars;
        let (lx, ux) = (model.lb(x) as i128, model.ub(x) as i128);
        let (ly, uy) = (model.lb(y) as i128, model.ub(y) as i128);
        // Range of |x - y| over the current bounds.
        let max = (ux - ly).max(uy - lx);
        let min = if ux < ly {
            ly - ux
        } else if uy < lx {
            lx - uy
        } else {
            0
        };
        let c = self.constant as i128;
        let fixed = model
            .value(x)
            .zip(model.value(y))
            .map(|(a, b)| (a as i128 - b as i128).abs());

        match self.op {
            Operator::Eq => match fixed {
                Some(d) if d == c => Entailment::True,
                _ if c < min || c > max => Entailment::False,
                Some(_) => Entailment::False,
                None => Entailment::Undefined,
            },
            Operator::Ne => match fixed {
                Some(d) if d == c => Entailment::False,
                Some(_) => Entailment::True,
                None if c < min || c > max => Entailment::True,
                None => Entailment::Undefined,
            },
            Operator::Lt if max < c => Entailment::True,
            Operator::Lt if min >= c => Entailment::False,
            Operator::Gt if min > c => Entailment::True,
            Operator::Gt if max <= c => Entailment::False,
            _ => Entailment::Undefined,
        }
    }
}
