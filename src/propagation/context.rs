//! The view a propagator gets of the model while it runs.

use super::PropagatorId;
use crate::error::{Contradiction, Propagation};
use crate::model::Model;
use crate::variables::{Cause, IntVar};

/// Read/write access to the model on behalf of one propagator.
///
/// Every modification is tagged with the propagator's cause, so it does not
/// wake the propagator that made it.
pub struct PropagationContext<'a> {
    model: &'a mut Model,
    id: PropagatorId,
    passive: bool,
}

impl<'a> PropagationContext<'a> {
    pub(crate) fn new(model: &'a mut Model, id: PropagatorId) -> Self {
        Self {
            model,
            id,
            passive: false,
        }
    }

    pub fn model(&self) -> &Model {
        self.model
    }

    pub fn id(&self) -> PropagatorId {
        self.id
    }

    pub fn cause(&self) -> Cause {
        Cause::Propagator(self.id)
    }

    /// Marks the propagator as entailed until the current world is popped.
    pub fn set_passive(&mut self) {
        self.passive = true;
    }

    pub(crate) fn is_passive(&self) -> bool {
        self.passive
    }

    /// A contradiction not tied to a single variable.
    pub fn fail(&self, message: &'static str) -> Contradiction {
        Contradiction::fail(self.cause(), message)
    }

    pub fn lb(&self, var: IntVar) -> i64 {
        self.model.lb(var)
    }

    pub fn ub(&self, var: IntVar) -> i64 {
        self.model.ub(var)
    }

    pub fn size(&self, var: IntVar) -> i64 {
        self.model.size(var)
    }

    pub fn contains(&self, var: IntVar, value: i64) -> bool {
        self.model.contains(var, value)
    }

    pub fn is_instantiated(&self, var: IntVar) -> bool {
        self.model.is_instantiated(var)
    }

    pub fn value(&self, var: IntVar) -> Option<i64> {
        self.model.value(var)
    }

    pub fn update_lower_bound(&mut self, var: IntVar, value: i64) -> Propagation<bool> {
        let cause = self.cause();
        self.model.update_lower_bound(var, value, cause)
    }

    pub fn update_upper_bound(&mut self, var: IntVar, value: i64) -> Propagation<bool> {
        let cause = self.cause();
        self.model.update_upper_bound(var, value, cause)
    }

    pub fn update_bounds(&mut self, var: IntVar, lo: i64, hi: i64) -> Propagation<bool> {
        let cause = self.cause();
        self.model.update_bounds(var, lo, hi, cause)
    }

    pub fn remove_value(&mut self, var: IntVar, value: i64) -> Propagation<bool> {
        let cause = self.cause();
        self.model.remove_value(var, value, cause)
    }

    pub fn remove_interval(&mut self, var: IntVar, from: i64, to: i64) -> Propagation<bool> {
        let cause = self.cause();
        self.model.remove_interval(var, from, to, cause)
    }

    pub fn instantiate_to(&mut self, var: IntVar, value: i64) -> Propagation<bool> {
        let cause = self.cause();
        self.model.instantiate_to(var, value, cause)
    }
}
