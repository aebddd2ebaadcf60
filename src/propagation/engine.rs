//! Priority-queue fixpoint engine.

use super::{Entailment, PropagationContext, Propagator, PropagatorId, PropagatorPriority};
use crate::error::{Contradiction, Propagation};
use crate::memory::StoredBool;
use crate::model::Model;
use crate::variables::{Cause, EventMask, VarEvent};
use std::collections::VecDeque;
use tracing::trace;

/// Scheduling state of one propagator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropagatorState {
    Idle,
    Scheduled,
    Executing,
    /// Raised the last contradiction; cleared by [`PropagationEngine::flush`].
    Failed,
    Removed,
}

#[derive(Debug)]
struct Slot {
    priority: PropagatorPriority,
    state: PropagatorState,
    active: StoredBool,
    /// A full pass is owed (initial propagation or dynamic addition).
    full: bool,
    pending: Vec<EventMask>,
    executions: u64,
}

#[derive(Debug, Clone, Copy)]
struct Watcher {
    propagator: PropagatorId,
    index: usize,
    condition: EventMask,
}

/// Runs propagators to a fixpoint.
///
/// Events recorded by the [`Model`] are matched against the conditions each
/// propagator declared for its variables; a match schedules the propagator
/// once (masks accumulate while it waits). Queues are drained from
/// [`PropagatorPriority::Unary`] up, first in first out within a priority.
///
/// # Examples
///
/// ```
/// use u_cpsolve::constraints::NotEqualConst;
/// use u_cpsolve::model::Model;
/// use u_cpsolve::propagation::PropagationEngine;
///
/// let mut model = Model::new("example");
/// let x = model.new_int_var("x", 0, 5).unwrap();
///
/// let mut engine = PropagationEngine::new();
/// engine.add_propagator(&mut model, Box::new(NotEqualConst::new(x, 0)));
/// engine.propagate(&mut model).unwrap();
///
/// assert_eq!(model.lb(x), 1);
/// ```
#[derive(Debug, Default)]
pub struct PropagationEngine {
    propagators: Vec<Option<Box<dyn Propagator>>>,
    slots: Vec<Slot>,
    watchers: Vec<Vec<Watcher>>,
    queues: [VecDeque<PropagatorId>; PropagatorPriority::COUNT],
    events: Vec<VarEvent>,
    scratch: Vec<(usize, EventMask)>,
    initialized: bool,
    failed: bool,
    last_contradiction: Option<Contradiction>,
    executions: u64,
}

impl PropagationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Posts a propagator.
    ///
    /// Once the engine is initialized, the propagator is scheduled for a
    /// full pass that runs on the next [`propagate`](Self::propagate).
    ///
    /// # Panics
    ///
    /// Panics if the propagator refers to a variable the model does not own.
    pub fn add_propagator(
        &mut self,
        model: &mut Model,
        propagator: Box<dyn Propagator>,
    ) -> PropagatorId {
        let id = PropagatorId(self.propagators.len());
        let arity = propagator.variables().len();

        for (index, &var) in propagator.variables().iter().enumerate() {
            assert!(
                model.owns(var),
                "propagator {} refers to {var}, unknown to model {}",
                propagator.name(),
                model.name()
            );
            if self.watchers.len() <= var.index() {
                self.watchers.resize_with(model.var_count(), Vec::new);
            }
            self.watchers[var.index()].push(Watcher {
                propagator: id,
                index,
                condition: propagator.propagation_conditions(index),
            });
        }

        trace!(propagator = propagator.name(), id = %id, arity, "post");

        self.slots.push(Slot {
            priority: propagator.priority(),
            state: PropagatorState::Idle,
            active: model.env_mut().make_bool(true),
            full: false,
            pending: vec![EventMask::VOID; arity],
            executions: 0,
        });
        self.propagators.push(Some(propagator));

        if self.initialized {
            self.schedule_full(id);
        }
        id
    }

    /// Removes a propagator and everything pending for it.
    ///
    /// # Panics
    ///
    /// Panics if `id` is unknown or was already removed.
    pub fn remove_propagator(&mut self, id: PropagatorId) {
        let propagator = match self.propagators.get_mut(id.0).and_then(Option::take) {
            Some(p) => p,
            None => panic!("propagator {id} is unknown or already removed"),
        };
        for var in propagator.variables() {
            if let Some(list) = self.watchers.get_mut(var.index()) {
                list.retain(|w| w.propagator != id);
            }
        }

        let slot = &mut self.slots[id.0];
        if slot.state == PropagatorState::Scheduled {
            self.queues[slot.priority.index()].retain(|&p| p != id);
        }
        slot.state = PropagatorState::Removed;
        slot.full = false;
        slot.pending.fill(EventMask::VOID);
        trace!(propagator = propagator.name(), id = %id, "unpost");
    }

    /// Schedules every posted propagator for a full pass. Idempotent.
    pub fn initialize(&mut self) {
        if self.initialized {
            return;
        }
        self.initialized = true;
        self.schedule_all();
    }

    /// Schedules a full pass of every posted propagator.
    pub fn schedule_all(&mut self) {
        for i in 0..self.propagators.len() {
            if self.propagators[i].is_some() {
                self.schedule_full(PropagatorId(i));
            }
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Runs scheduled propagators until no event is left.
    ///
    /// Initializes the engine on first use. On contradiction the remaining
    /// queue is left untouched; the caller backtracks and calls
    /// [`flush`](Self::flush) before propagating again.
    pub fn propagate(&mut self, model: &mut Model) -> Propagation {
        assert!(!self.failed, "propagate on a failed engine without flush");
        self.initialize();
        self.absorb(model);

        while let Some(id) = self.next_scheduled() {
            if let Err(contradiction) = self.execute(model, id) {
                self.failed = true;
                self.last_contradiction = Some(contradiction);
                return Err(contradiction);
            }
            self.absorb(model);
        }
        Ok(())
    }

    /// Discards every pending event and scheduled execution.
    ///
    /// Owed full passes survive: they do not depend on the abandoned branch.
    pub fn flush(&mut self, model: &mut Model) {
        for queue in &mut self.queues {
            queue.clear();
        }
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.state == PropagatorState::Removed {
                continue;
            }
            slot.pending.fill(EventMask::VOID);
            if slot.full {
                slot.state = PropagatorState::Scheduled;
                self.queues[slot.priority.index()].push_back(PropagatorId(i));
            } else {
                slot.state = PropagatorState::Idle;
            }
        }
        model.clear_events();
        self.failed = false;
    }

    /// Whether the last fixpoint ended in a contradiction not yet flushed.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn last_contradiction(&self) -> Option<&Contradiction> {
        self.last_contradiction.as_ref()
    }

    /// Hands the last contradiction over to the caller.
    pub fn take_contradiction(&mut self) -> Option<Contradiction> {
        self.last_contradiction.take()
    }

    // ---- introspection ----

    pub fn propagator(&self, id: PropagatorId) -> Option<&dyn Propagator> {
        self.propagators.get(id.0).and_then(|p| p.as_deref())
    }

    /// Posted propagators, removed ones excluded.
    pub fn propagators(&self) -> impl Iterator<Item = (PropagatorId, &dyn Propagator)> + '_ {
        self.propagators
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.as_deref().map(|p| (PropagatorId(i), p)))
    }

    pub fn propagator_count(&self) -> usize {
        self.propagators.iter().filter(|p| p.is_some()).count()
    }

    pub fn state(&self, id: PropagatorId) -> PropagatorState {
        self.slots[id.0].state
    }

    /// Whether the propagator is active (not passivated) in the current world.
    pub fn is_active(&self, model: &Model, id: PropagatorId) -> bool {
        let slot = &self.slots[id.0];
        slot.state != PropagatorState::Removed && model.env().get(slot.active)
    }

    /// Total number of propagator executions.
    pub fn executions(&self) -> u64 {
        self.executions
    }

    pub fn executions_of(&self, id: PropagatorId) -> u64 {
        self.slots[id.0].executions
    }

    /// First active propagator reporting [`Entailment::False`], if any.
    pub fn find_violated(&self, model: &Model) -> Option<PropagatorId> {
        self.propagators().map(|(id, _)| id).find(|&id| {
            self.is_active(model, id)
                && self.propagators[id.0]
                    .as_deref()
                    .is_some_and(|p| p.is_entailed(model) == Entailment::False)
        })
    }

    // ---- internals ----

    fn schedule_full(&mut self, id: PropagatorId) {
        let slot = &mut self.slots[id.0];
        slot.full = true;
        if slot.state == PropagatorState::Idle {
            slot.state = PropagatorState::Scheduled;
            self.queues[slot.priority.index()].push_back(id);
        }
    }

    fn next_scheduled(&mut self) -> Option<PropagatorId> {
        self.queues.iter_mut().find_map(|q| q.pop_front())
    }

    /// Moves the model's events into the queues.
    fn absorb(&mut self, model: &mut Model) {
        if !model.has_events() {
            return;
        }
        let mut events = std::mem::take(&mut self.events);
        model.swap_events(&mut events);
        for event in events.drain(..) {
            self.schedule(model, event);
        }
        self.events = events;
    }

    fn schedule(&mut self, model: &Model, event: VarEvent) {
        let Some(watchers) = self.watchers.get(event.var.index()) else {
            return;
        };
        let mask = event.kind.mask();
        for w in watchers {
            if event.cause == Cause::Propagator(w.propagator) || !mask.intersects(w.condition) {
                continue;
            }
            let slot = &mut self.slots[w.propagator.0];
            if !model.env().get(slot.active) {
                continue;
            }
            slot.pending[w.index] |= mask;
            if slot.state == PropagatorState::Idle {
                slot.state = PropagatorState::Scheduled;
                self.queues[slot.priority.index()].push_back(w.propagator);
            }
        }
    }

    fn execute(&mut self, model: &mut Model, id: PropagatorId) -> Propagation {
        let slot = &mut self.slots[id.0];
        slot.state = PropagatorState::Executing;
        slot.executions += 1;
        self.executions += 1;

        let full = std::mem::replace(&mut slot.full, false);
        self.scratch.clear();
        for (index, mask) in slot.pending.iter_mut().enumerate() {
            if !mask.is_empty() {
                self.scratch.push((index, *mask));
                *mask = EventMask::VOID;
            }
        }

        let propagator = self.propagators[id.0]
            .as_deref()
            .expect("scheduled propagator was removed");
        trace!(propagator = propagator.name(), id = %id, full, "propagate");

        let mut ctx = PropagationContext::new(model, id);
        let result = if full || !propagator.reacts_on_events() {
            propagator.propagate(&mut ctx)
        } else {
            self.scratch
                .iter()
                .try_for_each(|&(index, mask)| propagator.propagate_on(&mut ctx, index, mask))
        };
        let passive = ctx.is_passive();

        match result {
            Ok(()) => {
                slot.state = PropagatorState::Idle;
                if passive {
                    trace!(propagator = propagator.name(), id = %id, "passivate");
                    model.env_mut().set(slot.active, false);
                }
                Ok(())
            }
            Err(contradiction) => {
                slot.state = PropagatorState::Failed;
                trace!(propagator = propagator.name(), id = %id, %contradiction, "fail");
                Err(contradiction)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::{Cause, IntVar};
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<&'static str>>>;

    /// Records each execution; optionally passivates itself.
    #[derive(Debug)]
    struct Tracker {
        name: &'static str,
        vars: Vec<IntVar>,
        priority: PropagatorPriority,
        condition: EventMask,
        passivate: bool,
        log: Log,
    }

    impl Tracker {
        fn new(name: &'static str, vars: Vec<IntVar>, log: &Log) -> Self {
            Self {
                name,
                vars,
                priority: PropagatorPriority::Binary,
                condition: EventMask::all(),
                passivate: false,
                log: Rc::clone(log),
            }
        }
    }

    impl Propagator for Tracker {
        fn name(&self) -> &str {
            self.name
        }

        fn variables(&self) -> &[IntVar] {
            &self.vars
        }

        fn priority(&self) -> PropagatorPriority {
            self.priority
        }

        fn propagation_conditions(&self, _index: usize) -> EventMask {
            self.condition
        }

        fn propagate(&self, ctx: &mut PropagationContext<'_>) -> Propagation {
            self.log.borrow_mut().push(self.name);
            if self.passivate {
                ctx.set_passive();
            }
            Ok(())
        }

        fn is_entailed(&self, _model: &Model) -> Entailment {
            Entailment::Undefined
        }
    }

    fn setup() -> (Model, IntVar, IntVar, Log) {
        let mut model = Model::new("engine");
        let x = model.new_int_var("x", 0, 5).unwrap();
        let y = model.new_int_var("y", 0, 5).unwrap();
        (model, x, y, Rc::new(RefCell::new(Vec::new())))
    }

    #[test]
    fn test_irrelevant_events_never_schedule() {
        let (mut model, x, y, log) = setup();
        let mut engine = PropagationEngine::new();
        let mut tracker = Tracker::new("inst", vec![x], &log);
        tracker.condition = EventMask::instantiation();
        let id = engine.add_propagator(&mut model, Box::new(tracker));

        engine.propagate(&mut model).unwrap();
        assert_eq!(engine.executions_of(id), 1);

        // Another variable, then a bound change on x: neither is relevant.
        model.instantiate_to(y, 2, Cause::Decision).unwrap();
        model.update_lower_bound(x, 1, Cause::Decision).unwrap();
        engine.propagate(&mut model).unwrap();
        assert_eq!(engine.executions_of(id), 1);
        assert_eq!(engine.state(id), PropagatorState::Idle);

        model.instantiate_to(x, 4, Cause::Decision).unwrap();
        engine.propagate(&mut model).unwrap();
        assert_eq!(engine.executions_of(id), 2);
    }

    #[test]
    fn test_second_fixpoint_is_a_no_op() {
        let (mut model, x, y, log) = setup();
        let mut engine = PropagationEngine::new();
        engine.add_propagator(&mut model, Box::new(Tracker::new("p", vec![x, y], &log)));

        engine.propagate(&mut model).unwrap();
        let lbs = (model.lb(x), model.lb(y));
        let executions = engine.executions();

        engine.propagate(&mut model).unwrap();
        assert_eq!(engine.executions(), executions);
        assert_eq!((model.lb(x), model.lb(y)), lbs);
    }

    #[test]
    fn test_priority_then_fifo() {
        let (mut model, x, _, log) = setup();
        let mut engine = PropagationEngine::new();

        let mut global = Tracker::new("global", vec![x], &log);
        global.priority = PropagatorPriority::Global;
        engine.add_propagator(&mut model, Box::new(global));

        let mut first = Tracker::new("unary-1", vec![x], &log);
        first.priority = PropagatorPriority::Unary;
        engine.add_propagator(&mut model, Box::new(first));

        let mut second = Tracker::new("unary-2", vec![x], &log);
        second.priority = PropagatorPriority::Unary;
        engine.add_propagator(&mut model, Box::new(second));

        engine.propagate(&mut model).unwrap();
        assert_eq!(*log.borrow(), vec!["unary-1", "unary-2", "global"]);
    }

    #[test]
    fn test_dynamic_addition_runs_full_pass() {
        let (mut model, x, _, log) = setup();
        let mut engine = PropagationEngine::new();
        engine.propagate(&mut model).unwrap();
        assert!(engine.is_initialized());

        let id = engine.add_propagator(&mut model, Box::new(Tracker::new("late", vec![x], &log)));
        assert_eq!(engine.state(id), PropagatorState::Scheduled);
        engine.propagate(&mut model).unwrap();
        assert_eq!(*log.borrow(), vec!["late"]);
    }

    #[test]
    fn test_removal_discards_pending() {
        let (mut model, x, _, log) = setup();
        let mut engine = PropagationEngine::new();
        let id = engine.add_propagator(&mut model, Box::new(Tracker::new("p", vec![x], &log)));
        engine.propagate(&mut model).unwrap();

        model.update_lower_bound(x, 1, Cause::Decision).unwrap();
        engine.propagate(&mut model).unwrap();
        assert_eq!(engine.executions_of(id), 2);

        model.update_lower_bound(x, 2, Cause::Decision).unwrap();
        engine.remove_propagator(id);
        engine.propagate(&mut model).unwrap();
        assert_eq!(engine.executions_of(id), 2);
        assert_eq!(engine.propagator_count(), 0);
    }

    #[test]
    #[should_panic(expected = "already removed")]
    fn test_double_removal_panics() {
        let (mut model, x, _, log) = setup();
        let mut engine = PropagationEngine::new();
        let id = engine.add_propagator(&mut model, Box::new(Tracker::new("p", vec![x], &log)));
        engine.remove_propagator(id);
        engine.remove_propagator(id);
    }

    #[test]
    fn test_flush_drops_stale_events() {
        let (mut model, x, _, log) = setup();
        let mut engine = PropagationEngine::new();
        let id = engine.add_propagator(&mut model, Box::new(Tracker::new("p", vec![x], &log)));
        engine.propagate(&mut model).unwrap();

        model.update_lower_bound(x, 1, Cause::Decision).unwrap();
        engine.flush(&mut model);
        engine.propagate(&mut model).unwrap();
        assert_eq!(engine.executions_of(id), 1);
    }

    #[test]
    fn test_passivation_is_backtracked() {
        let (mut model, x, _, log) = setup();
        let mut engine = PropagationEngine::new();
        let mut tracker = Tracker::new("p", vec![x], &log);
        tracker.passivate = true;
        let id = engine.add_propagator(&mut model, Box::new(tracker));

        model.env_mut().world_push();
        engine.propagate(&mut model).unwrap();
        assert!(!engine.is_active(&model, id));

        model.update_lower_bound(x, 1, Cause::Decision).unwrap();
        engine.propagate(&mut model).unwrap();
        assert_eq!(engine.executions_of(id), 1);

        model.env_mut().world_pop();
        assert!(engine.is_active(&model, id));
        model.update_lower_bound(x, 1, Cause::Decision).unwrap();
        engine.propagate(&mut model).unwrap();
        assert_eq!(engine.executions_of(id), 2);
    }

    #[test]
    #[should_panic(expected = "unknown to model")]
    fn test_foreign_variable_panics() {
        let (mut model, _, _, log) = setup();
        let mut engine = PropagationEngine::new();
        engine.add_propagator(&mut model, Box::new(Tracker::new("p", vec![IntVar(42)], &log)));
    }
}
