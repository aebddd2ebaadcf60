//! Variable store.

use crate::error::{Contradiction, Propagation, Result, SolverError};
use crate::memory::Environment;
use crate::variables::{Cause, DomainUpdate, EmptyDomain, IntDomain, IntVar, IntVarData, VarEvent};
use tracing::trace;

/// Domains above this size are created bounded by [`Model::new_int_var`].
pub const MAX_ENUMERATED_SIZE: i64 = 1 << 16;

/// The variables of a problem and the environment their domains live in.
///
/// Every domain read goes through the model, and every domain write is
/// trailed in the model's [`Environment`] and recorded as a [`VarEvent`] for
/// the propagation engine to pick up.
///
/// # Examples
///
/// ```
/// use u_cpsolve::model::Model;
/// use u_cpsolve::variables::Cause;
///
/// let mut model = Model::new("example");
/// let x = model.new_int_var("x", 0, 5).unwrap();
///
/// model.env_mut().world_push();
/// assert!(model.remove_value(x, 0, Cause::Decision).unwrap());
/// assert_eq!(model.lb(x), 1);
///
/// model.env_mut().world_pop();
/// assert_eq!(model.lb(x), 0);
/// ```
#[derive(Debug)]
pub struct Model {
    name: String,
    env: Environment,
    vars: Vec<IntVarData>,
    events: Vec<VarEvent>,
    anonymous: usize,
}

impl Model {
    /// Creates an empty model with a fresh environment.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_environment(name, Environment::new())
    }

    /// Creates an empty model over an existing environment.
    pub fn with_environment(name: impl Into<String>, env: Environment) -> Self {
        Self {
            name: name.into(),
            env,
            vars: Vec::new(),
            events: Vec::new(),
            anonymous: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    // ---- construction ----

    /// Creates a variable over `[lb, ub]`, enumerated when the range is small
    /// enough, bounded otherwise.
    pub fn new_int_var(&mut self, name: impl Into<String>, lb: i64, ub: i64) -> Result<IntVar> {
        if ub.saturating_sub(lb) < MAX_ENUMERATED_SIZE {
            self.new_enumerated_var(name, lb, ub)
        } else {
            self.new_bounded_var(name, lb, ub)
        }
    }

    /// Creates an interval variable: only its bounds are tracked.
    pub fn new_bounded_var(&mut self, name: impl Into<String>, lb: i64, ub: i64) -> Result<IntVar> {
        let name = name.into();
        if lb > ub {
            return Err(SolverError::Model(format!("empty domain [{lb}, {ub}] for {name}")));
        }
        let domain = IntDomain::bounded(&mut self.env, lb, ub);
        Ok(self.push(name, domain))
    }

    /// Creates a variable over `[lb, ub]` that supports holes.
    pub fn new_enumerated_var(
        &mut self,
        name: impl Into<String>,
        lb: i64,
        ub: i64,
    ) -> Result<IntVar> {
        let name = name.into();
        if lb > ub {
            return Err(SolverError::Model(format!("empty domain [{lb}, {ub}] for {name}")));
        }
        let values: Vec<i64> = (lb..=ub).collect();
        let domain = IntDomain::enumerated(&mut self.env, &values);
        Ok(self.push(name, domain))
    }

    /// Creates a variable whose domain is exactly `values`.
    pub fn new_var_from_values(&mut self, name: impl Into<String>, values: &[i64]) -> Result<IntVar> {
        let name = name.into();
        let mut sorted = values.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        if sorted.is_empty() {
            return Err(SolverError::Model(format!("empty value list for {name}")));
        }
        let domain = IntDomain::enumerated(&mut self.env, &sorted);
        Ok(self.push(name, domain))
    }

    /// Creates a fixed variable.
    pub fn new_constant(&mut self, value: i64) -> IntVar {
        let name = format!("cste_{value}");
        let domain = IntDomain::bounded(&mut self.env, value, value);
        self.push(name, domain)
    }

    /// Creates an auxiliary variable with a generated name.
    pub fn new_anonymous_var(&mut self, lb: i64, ub: i64) -> Result<IntVar> {
        self.anonymous += 1;
        let name = format!("tmp_{}", self.anonymous);
        self.new_int_var(name, lb, ub)
    }

    fn push(&mut self, name: String, domain: IntDomain) -> IntVar {
        self.vars.push(IntVarData { name, domain });
        IntVar(self.vars.len() - 1)
    }

    // ---- queries ----

    pub fn var_count(&self) -> usize {
        self.vars.len()
    }

    /// All variables in creation order.
    pub fn vars(&self) -> impl Iterator<Item = IntVar> + '_ {
        (0..self.vars.len()).map(IntVar)
    }

    /// Whether `var` was created by this model.
    pub fn owns(&self, var: IntVar) -> bool {
        var.0 < self.vars.len()
    }

    pub fn var_name(&self, var: IntVar) -> &str {
        &self.vars[var.0].name
    }

    pub fn domain(&self, var: IntVar) -> &IntDomain {
        &self.vars[var.0].domain
    }

    #[inline]
    pub fn lb(&self, var: IntVar) -> i64 {
        self.vars[var.0].domain.lb(&self.env)
    }

    #[inline]
    pub fn ub(&self, var: IntVar) -> i64 {
        self.vars[var.0].domain.ub(&self.env)
    }

    pub fn size(&self, var: IntVar) -> i64 {
        self.vars[var.0].domain.size(&self.env)
    }

    pub fn contains(&self, var: IntVar, value: i64) -> bool {
        self.vars[var.0].domain.contains(&self.env, value)
    }

    pub fn is_instantiated(&self, var: IntVar) -> bool {
        self.vars[var.0].domain.is_instantiated(&self.env)
    }

    /// The value of an instantiated variable.
    pub fn value(&self, var: IntVar) -> Option<i64> {
        let d = &self.vars[var.0].domain;
        d.is_instantiated(&self.env).then(|| d.lb(&self.env))
    }

    pub fn next_value(&self, var: IntVar, value: i64) -> Option<i64> {
        self.vars[var.0].domain.next_value(&self.env, value)
    }

    pub fn previous_value(&self, var: IntVar, value: i64) -> Option<i64> {
        self.vars[var.0].domain.previous_value(&self.env, value)
    }

    pub fn values(&self, var: IntVar) -> Vec<i64> {
        self.vars[var.0].domain.values(&self.env)
    }

    /// Whether every variable of the model is instantiated.
    pub fn all_instantiated(&self) -> bool {
        self.vars.iter().all(|v| v.domain.is_instantiated(&self.env))
    }

    // ---- mutators ----

    /// Raises the lower bound of `var` to `value`.
    ///
    /// Returns whether the domain changed, or a [`Contradiction`] (with the
    /// domain untouched) if no value would remain.
    pub fn update_lower_bound(&mut self, var: IntVar, value: i64, cause: Cause) -> Propagation<bool> {
        let update = self.vars[var.0].domain.update_lower_bound(&mut self.env, value);
        self.notify(var, update, cause)
    }

    /// Lowers the upper bound of `var` to `value`.
    pub fn update_upper_bound(&mut self, var: IntVar, value: i64, cause: Cause) -> Propagation<bool> {
        let update = self.vars[var.0].domain.update_upper_bound(&mut self.env, value);
        self.notify(var, update, cause)
    }

    /// Restricts `var` to `[lo, hi]`.
    pub fn update_bounds(&mut self, var: IntVar, lo: i64, hi: i64, cause: Cause) -> Propagation<bool> {
        let update = self.vars[var.0].domain.update_bounds(&mut self.env, lo, hi);
        self.notify(var, update, cause)
    }

    /// Removes `value` from `var`. Bounded domains only honour removals at
    /// their bounds.
    pub fn remove_value(&mut self, var: IntVar, value: i64, cause: Cause) -> Propagation<bool> {
        let update = self.vars[var.0].domain.remove_value(&mut self.env, value);
        self.notify(var, update, cause)
    }

    /// Removes every value of `[from, to]` from `var`.
    pub fn remove_interval(
        &mut self,
        var: IntVar,
        from: i64,
        to: i64,
        cause: Cause,
    ) -> Propagation<bool> {
        let update = self.vars[var.0].domain.remove_interval(&mut self.env, from, to);
        self.notify(var, update, cause)
    }

    /// Fixes `var` to `value`.
    pub fn instantiate_to(&mut self, var: IntVar, value: i64, cause: Cause) -> Propagation<bool> {
        let update = self.vars[var.0].domain.instantiate_to(&mut self.env, value);
        self.notify(var, update, cause)
    }

    fn notify(&mut self, var: IntVar, update: DomainUpdate, cause: Cause) -> Propagation<bool> {
        match update {
            Ok(Some(kind)) => {
                trace!(var = %self.vars[var.0].name, event = ?kind, cause = ?cause, "modification");
                self.events.push(VarEvent { var, kind, cause });
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(EmptyDomain) => {
                trace!(var = %self.vars[var.0].name, cause = ?cause, "wipe-out");
                Err(Contradiction::wipe_out(var, cause))
            }
        }
    }

    // ---- event buffer ----

    /// Moves the pending events into `buffer` (which must be empty).
    pub(crate) fn swap_events(&mut self, buffer: &mut Vec<VarEvent>) {
        debug_assert!(buffer.is_empty());
        std::mem::swap(&mut self.events, buffer);
    }

    pub(crate) fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Drops pending events.
    pub(crate) fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Values of every variable, `None` for uninstantiated ones.
    pub fn snapshot(&self) -> Vec<Option<i64>> {
        self.vars().map(|v| self.value(v)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::EventKind;

    #[test]
    fn test_model_creation() {
        let mut model = Model::new("test");
        let x = model.new_int_var("x", 0, 3).unwrap();
        let y = model.new_bounded_var("y", -5, 5).unwrap();
        let c = model.new_constant(7);
        let t = model.new_anonymous_var(0, 1).unwrap();

        assert_eq!(model.var_count(), 4);
        assert!(model.domain(x).is_enumerated());
        assert!(!model.domain(y).is_enumerated());
        assert_eq!(model.value(c), Some(7));
        assert_eq!(model.var_name(t), "tmp_1");
        assert!(model.owns(t));
    }

    #[test]
    fn test_empty_domain_is_a_model_error() {
        let mut model = Model::new("test");
        assert!(matches!(
            model.new_int_var("x", 3, 2),
            Err(SolverError::Model(_))
        ));
        assert!(model.new_var_from_values("y", &[]).is_err());
    }

    #[test]
    fn test_values_are_sorted_and_deduplicated() {
        let mut model = Model::new("test");
        let x = model.new_var_from_values("x", &[9, 1, 5, 1]).unwrap();
        assert_eq!(model.values(x), vec![1, 5, 9]);
        assert_eq!(model.size(x), 3);
    }

    #[test]
    fn test_mutation_records_events() {
        let mut model = Model::new("test");
        let x = model.new_int_var("x", 0, 5).unwrap();

        assert_eq!(model.update_lower_bound(x, 2, Cause::Decision), Ok(true));
        assert_eq!(model.update_lower_bound(x, 1, Cause::Decision), Ok(false));
        assert_eq!(model.remove_value(x, 4, Cause::Null), Ok(true));

        let mut events = Vec::new();
        model.swap_events(&mut events);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, EventKind::IncLow);
        assert_eq!(events[1].kind, EventKind::Remove);
        assert_eq!(events[1].cause, Cause::Null);
        assert!(!model.has_events());
    }

    #[test]
    fn test_wipe_out_is_a_contradiction() {
        let mut model = Model::new("test");
        let x = model.new_int_var("x", 0, 5).unwrap();
        let err = model.update_upper_bound(x, -1, Cause::Decision).unwrap_err();
        assert_eq!(err.variable, Some(x));
        assert_eq!(err.cause, Cause::Decision);
        assert_eq!(model.ub(x), 5);
        assert!(!model.has_events());
    }

    #[test]
    fn test_snapshot() {
        let mut model = Model::new("test");
        let x = model.new_int_var("x", 0, 5).unwrap();
        let _y = model.new_int_var("y", 0, 5).unwrap();
        model.instantiate_to(x, 3, Cause::Decision).unwrap();
        assert_eq!(model.snapshot(), vec![Some(3), None]);
        assert!(!model.all_instantiated());
    }
}
