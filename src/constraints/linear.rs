//! Bound-consistent weighted sums.

use super::Operator;
use crate::error::{Propagation, Result, SolverError};
use crate::model::Model;
use crate::propagation::{Entailment, PropagationContext, Propagator, PropagatorPriority};
use crate::variables::{EventMask, IntVar};

/// `sum(a_i * x_i) op c` with `op` one of `=`, `<=`, `>=`.
///
/// # Examples
///
/// ```
/// use u_cpsolve::constraints::{LinearSum, Operator};
/// use u_cpsolve::model::Model;
/// use u_cpsolve::propagation::PropagationEngine;
///
/// let mut model = Model::new("example");
/// let x = model.new_int_var("x", 0, 10).unwrap();
/// let y = model.new_int_var("y", 0, 10).unwrap();
///
/// let mut engine = PropagationEngine::new();
/// let sum = LinearSum::new(&[1, 2], &[x, y], Operator::Le, 6).unwrap();
/// engine.add_propagator(&mut model, Box::new(sum));
/// engine.propagate(&mut model).unwrap();
///
/// assert_eq!(model.ub(x), 6);
/// assert_eq!(model.ub(y), 3);
/// ```
#[derive(Debug, Clone)]
pub struct LinearSum {
    vars: Vec<IntVar>,
    coefs: Vec<i64>,
    op: Operator,
    constant: i64,
}

impl LinearSum {
    /// Terms with a zero coefficient are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::Model`] if the slices differ in length or the
    /// operator is not `=`, `<=` or `>=`.
    pub fn new(coefs: &[i64], vars: &[IntVar], op: Operator, constant: i64) -> Result<Self> {
        if coefs.len() != vars.len() {
            return Err(SolverError::Model(format!(
                "{} coefficients for {} variables",
                coefs.len(),
                vars.len()
            )));
        }
        if !matches!(op, Operator::Eq | Operator::Le | Operator::Ge) {
            return Err(SolverError::Model(format!(
                "unexpected operator for linear sum: {op}"
            )));
        }
        let (coefs, vars) = coefs
            .iter()
            .zip(vars)
            .filter(|(&a, _)| a != 0)
            .map(|(&a, &x)| (a, x))
            .unzip();
        Ok(Self {
            vars,
            coefs,
            op,
            constant,
        })
    }

    /// `sum(x_i) op c`.
    pub fn sum(vars: &[IntVar], op: Operator, constant: i64) -> Result<Self> {
        Self::new(&vec![1; vars.len()], vars, op, constant)
    }

    /// Smallest and largest value of the weighted sum, `sign` flipping every
    /// coefficient. `None` once a sum leaves the `i128` range.
    fn bounds(&self, model: &Model, sign: i128) -> Option<(i128, i128)> {
        self.coefs
            .iter()
            .zip(&self.vars)
            .try_fold((0_i128, 0_i128), |(lo, hi), (&a, &x)| {
                let (t_lo, t_hi) = term_range(sign * a as i128, model.lb(x), model.ub(x));
                Some((lo.checked_add(t_lo)?, hi.checked_add(t_hi)?))
            })
    }

    /// Enforces `sign * sum(a_i * x_i) <= sign * c`. Returns whether a bound
    /// moved.
    ///
    /// Sums are taken in `i128`; a sum too large even for that prunes
    /// nothing.
    fn filter_le(&self, ctx: &mut PropagationContext<'_>, sign: i128) -> Propagation<bool> {
        let c = sign * self.constant as i128;
        let Some((min, _)) = self.bounds(ctx.model(), sign) else {
            return Ok(false);
        };
        if min > c {
            return Err(ctx.fail("linear sum exceeds its bound"));
        }
        let mut changed = false;
        for (&coef, &x) in self.coefs.iter().zip(&self.vars) {
            let a = sign * coef as i128;
            let (t_min, _) = term_range(a, ctx.lb(x), ctx.ub(x));
            // a * x <= slack
            let Some(slack) = (c - min).checked_add(t_min) else {
                continue;
            };
            if a > 0 {
                // the bound is at least lb(x), so it only saturates upwards
                let bound = i64::try_from(slack.div_euclid(a)).unwrap_or(i64::MAX);
                changed |= ctx.update_upper_bound(x, bound)?;
            } else {
                let bound = i64::try_from(-slack.div_euclid(-a)).unwrap_or(i64::MIN);
                changed |= ctx.update_lower_bound(x, bound)?;
            }
        }
        Ok(changed)
    }
}

fn term_range(a: i128, lb: i64, ub: i64) -> (i128, i128) {
    let (lo, hi) = (a * lb as i128, a * ub as i128);
    if a >= 0 {
        (lo, hi)
    } else {
        (hi, lo)
    }
}

impl Propagator for LinearSum {
    fn name(&self) -> &str {
        "LinearSum"
    }

    fn variables(&self) -> &[IntVar] {
        &self.vars
    }

    fn priority(&self) -> PropagatorPriority {
        PropagatorPriority::Linear
    }

    fn propagation_conditions(&self, _index: usize) -> EventMask {
        EventMask::bound_and_inst()
    }

    fn propagate(&self, ctx: &mut PropagationContext<'_>) -> Propagation {
        loop {
            let changed = match self.op {
                Operator::Le => self.filter_le(ctx, 1)?,
                Operator::Ge => self.filter_le(ctx, -1)?,
                _ => self.filter_le(ctx, 1)? | self.filter_le(ctx, -1)?,
            };
            if !changed {
                break;
            }
        }
        if self.is_entailed(ctx.model()) == Entailment::True {
            ctx.set_passive();
        }
        Ok(())
    }

    fn is_entailed(&self, model: &Model) -> Entailment {
        let Some((min, max)) = self.bounds(model, 1) else {
            return Entailment::Undefined;
        };
        let c = self.constant as i128;
        match self.op {
            Operator::Le if max <= c => Entailment::True,
            Operator::Le if min > c => Entailment::False,
            Operator::Ge if min >= c => Entailment::True,
            Operator::Ge if max < c => Entailment::False,
            Operator::Eq if min == c && max == c => Entailment::True,
            Operator::Eq if c < min || c > max => Entailment::False,
            _ => Entailment::Undefined,
        }
    }
}
