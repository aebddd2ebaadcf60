//! Depth-first search loop.

use super::config::SearchConfig;
use super::decision::DecisionPath;
use super::measures::Measures;
use super::monitors::SearchMonitor;
use super::objective::{Objective, ObjectiveManager};
use super::restart::RestartSchedule;
use super::solution::{SearchResult, Solution, SolverStatus, StopReason};
use super::strategy::{IntStrategy, SearchStrategy};
use crate::constraints::{Literal, Nogood};
use crate::error::{Contradiction, Propagation};
use crate::model::Model;
use crate::propagation::{PropagationEngine, PropagatorId};
use crate::variables::Cause;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// Next step of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    InitialPropagation,
    OpenNode,
    Down,
    Up,
    Restart,
    Stop,
}

/// Drives decisions, propagation and backtracking over one model.
///
/// The search runs above the world that is current when [`run`](Self::run)
/// starts: the root fixpoint lives in a pushed world, and every decision
/// pushes one more. The model is back in its starting world when the run
/// returns, whatever ended it.
pub(crate) struct SearchLoop<'a> {
    model: &'a mut Model,
    engine: &'a mut PropagationEngine,
    strategy: &'a mut dyn SearchStrategy,
    /// Completes the strategy on variables it does not cover.
    fallback: IntStrategy,
    monitors: &'a mut [Box<dyn SearchMonitor>],
    on_solution: Option<&'a mut dyn FnMut(&Solution)>,
    config: &'a SearchConfig,
    cancel: Option<&'a AtomicBool>,
    objective: ObjectiveManager,
    restart: RestartSchedule,
    path: DecisionPath,
    measures: Measures,
    last_solution: Option<Solution>,
    nodes_since_restart: u64,
    search_root: usize,
    /// Nogoods this run posted; removed before it returns.
    recorded: Vec<PropagatorId>,
    stopped: Option<StopReason>,
    started: Instant,
}

impl<'a> SearchLoop<'a> {
    pub(crate) fn new(
        model: &'a mut Model,
        engine: &'a mut PropagationEngine,
        strategy: &'a mut dyn SearchStrategy,
        monitors: &'a mut [Box<dyn SearchMonitor>],
        config: &'a SearchConfig,
    ) -> Self {
        let fallback = IntStrategy::input_order_min(model.vars().collect());
        Self {
            model,
            engine,
            strategy,
            fallback,
            monitors,
            on_solution: None,
            config,
            cancel: None,
            objective: ObjectiveManager::new(None),
            restart: RestartSchedule::new(config.restart),
            path: DecisionPath::new(),
            measures: Measures::default(),
            last_solution: None,
            nodes_since_restart: 0,
            search_root: 0,
            recorded: Vec::new(),
            stopped: None,
            started: Instant::now(),
        }
    }

    pub(crate) fn with_objective(mut self, objective: Option<Objective>) -> Self {
        self.objective = ObjectiveManager::new(objective);
        self
    }

    pub(crate) fn with_cancel(mut self, cancel: Option<&'a AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub(crate) fn with_solution_callback(mut self, callback: &'a mut dyn FnMut(&Solution)) -> Self {
        self.on_solution = Some(callback);
        self
    }

    /// Runs the search until the tree is exhausted or a limit is hit.
    pub(crate) fn run(mut self) -> SearchResult {
        self.started = Instant::now();
        let base_world = self.model.env().world_index();
        let base_executions = self.engine.executions();

        info!(
            event = "solve_start",
            model = self.model.name(),
            vars = self.model.var_count(),
            propagators = self.engine.propagator_count(),
            optimizing = self.objective.is_optimizing(),
        );

        let mut action = Action::InitialPropagation;
        loop {
            action = match action {
                Action::InitialPropagation => self.initial_propagation(),
                Action::OpenNode => self.open_node(),
                Action::Down => self.down(),
                Action::Up => self.up(),
                Action::Restart => self.restart(),
                Action::Stop => break,
            };
        }

        self.engine.flush(self.model);
        self.model.env_mut().world_pop_until(base_world);
        for id in self.recorded.drain(..) {
            self.engine.remove_propagator(id);
        }

        self.measures.propagation_count = self.engine.executions() - base_executions;
        self.measures.best_objective = self.objective.best();
        self.measures.elapsed = self.started.elapsed();

        let found = self.measures.solution_count > 0;
        let status = match self.stopped {
            Some(_) if found => SolverStatus::Feasible,
            Some(_) => SolverStatus::Unknown,
            None if !found => SolverStatus::Infeasible,
            None if self.objective.is_optimizing() => SolverStatus::Optimal,
            None => SolverStatus::Feasible,
        };

        let measures = self.measures;
        for monitor in self.monitors.iter_mut() {
            monitor.on_close(&measures, status);
        }
        info!(
            event = "solve_end",
            status = ?status,
            stopped = ?self.stopped,
            solutions = measures.solution_count,
            nodes = measures.node_count,
            fails = measures.fail_count,
            restarts = measures.restart_count,
            duration_ms = measures.elapsed.as_millis() as u64,
        );

        SearchResult {
            status,
            solution: self.last_solution.take(),
            measures,
            stopped: self.stopped,
        }
    }

    // ---- states ----

    fn initial_propagation(&mut self) -> Action {
        self.model.env_mut().world_push();
        self.search_root = self.model.env().world_index();
        self.engine.initialize();
        self.engine.schedule_all();

        match self.propagate() {
            Ok(()) => {
                self.notify(|m, model| m.on_initialize(model));
                Action::OpenNode
            }
            Err(contradiction) => {
                self.on_failure(contradiction);
                Action::Stop
            }
        }
    }

    fn open_node(&mut self) -> Action {
        if let Some(reason) = self.check_limits() {
            debug!(event = "limit", reason = ?reason, nodes = self.measures.node_count);
            self.stopped = Some(reason);
            return Action::Stop;
        }
        self.measures.node_count += 1;
        self.nodes_since_restart += 1;
        let depth = self.path.depth();
        self.notify(|m, model| m.on_open_node(model, depth));

        if self.restart.is_due(self.nodes_since_restart) {
            return Action::Restart;
        }

        let decision = self
            .strategy
            .get_decision(self.model)
            .or_else(|| self.fallback.get_decision(self.model));
        match decision {
            Some(decision) => {
                self.path.push(decision);
                Action::Down
            }
            None => self.record_solution(),
        }
    }

    fn down(&mut self) -> Action {
        let decision = *self.path.last().expect("down without a decision");
        self.notify(|m, model| m.on_down_branch(model, &decision));
        self.measures.decision_count += 1;
        self.model.env_mut().world_push();
        self.measures.max_depth = self.measures.max_depth.max(self.path.depth());

        match self.apply_and_propagate() {
            Ok(()) => Action::OpenNode,
            Err(contradiction) => {
                self.on_failure(contradiction);
                Action::Up
            }
        }
    }

    fn up(&mut self) -> Action {
        loop {
            let Some(decision) = self.path.last().copied() else {
                return Action::Stop;
            };
            self.model.env_mut().world_pop();
            self.measures.backtrack_count += 1;

            if !decision.has_next() {
                self.path.pop();
                continue;
            }
            self.notify(|m, model| m.on_up_branch(model, &decision));
            self.model.env_mut().world_push();
            match self.apply_and_propagate() {
                Ok(()) => return Action::OpenNode,
                Err(contradiction) => self.on_failure(contradiction),
            }
        }
    }

    fn restart(&mut self) -> Action {
        let nogoods = if self.config.nogoods_on_restart {
            self.path.nogoods()
        } else {
            Vec::new()
        };

        self.model.env_mut().world_pop_until(self.search_root);
        self.engine.flush(self.model);
        self.path.clear();
        self.nodes_since_restart = 0;

        let restarts = self.restart.advance();
        self.measures.restart_count = restarts;
        self.strategy.on_restart(restarts);
        self.fallback.on_restart(restarts);
        info!(
            event = "restart",
            restarts,
            nogoods = nogoods.len(),
            nodes = self.measures.node_count,
            best = ?self.objective.best(),
        );
        self.notify(|m, model| m.on_restart(model, restarts));

        // Root work is done one world up, then merged into the search root.
        self.model.env_mut().world_push();
        for nogood in nogoods {
            let id = self.engine.add_propagator(self.model, Box::new(nogood));
            self.recorded.push(id);
        }
        let result = self
            .objective
            .apply_cut(self.model, Cause::Restart)
            .and_then(|()| self.engine.propagate(self.model));
        match result {
            Ok(()) => {
                self.model.env_mut().world_commit();
                Action::OpenNode
            }
            Err(contradiction) => {
                self.on_failure(contradiction);
                self.model.env_mut().world_pop();
                Action::Stop
            }
        }
    }

    // ---- helpers ----

    fn record_solution(&mut self) -> Action {
        debug_assert!(self.model.all_instantiated());
        if cfg!(debug_assertions) {
            if let Some(id) = self.engine.find_violated(self.model) {
                let name = self.engine.propagator(id).map_or("?", |p| p.name());
                panic!("solution violates propagator {name} ({id})");
            }
        }

        self.objective.record(self.model);
        let solution = Solution::capture(self.model, self.objective.value(self.model));
        self.measures.solution_count += 1;
        self.measures.best_objective = self.objective.best();
        debug!(
            event = "solution",
            index = self.measures.solution_count,
            objective = ?solution.objective,
            depth = self.path.depth(),
        );

        self.notify(|m, model| m.on_solution(model, &solution));
        if let Some(callback) = self.on_solution.as_mut() {
            callback(&solution);
        }

        // Restarts would find it again.
        if self.restart.is_enabled() && !self.objective.is_optimizing() {
            let literals = self
                .model
                .vars()
                .zip(solution.values())
                .map(|(var, &value)| Literal::eq(var, value))
                .collect();
            let id = self.engine.add_propagator(self.model, Box::new(Nogood::new(literals)));
            self.recorded.push(id);
        }
        self.last_solution = Some(solution);

        if self
            .config
            .solution_limit
            .is_some_and(|limit| self.measures.solution_count >= limit)
        {
            self.stopped = Some(StopReason::SolutionLimit);
            return Action::Stop;
        }
        if self.restart.on_solution() {
            Action::Restart
        } else {
            Action::Up
        }
    }

    /// Applies the next alternative of the deepest decision, then propagates.
    fn apply_and_propagate(&mut self) -> Propagation {
        let decision = self.path.last_mut().expect("no decision to apply");
        decision.apply_next(self.model)?;
        self.propagate()
    }

    fn propagate(&mut self) -> Propagation {
        self.objective.apply_cut(self.model, Cause::Objective)?;
        self.engine.propagate(self.model)
    }

    fn on_failure(&mut self, contradiction: Contradiction) {
        self.measures.fail_count += 1;
        self.engine.flush(self.model);
        self.engine.take_contradiction();
        trace!(event = "fail", reason = %contradiction, depth = self.path.depth());
        for monitor in self.monitors.iter_mut() {
            monitor.on_contradiction(&contradiction);
        }
    }

    fn check_limits(&self) -> Option<StopReason> {
        let reached = |limit: Option<u64>, count: u64| limit.is_some_and(|l| count >= l);

        if self.cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            Some(StopReason::Cancelled)
        } else if reached(self.config.node_limit, self.measures.node_count) {
            Some(StopReason::NodeLimit)
        } else if reached(self.config.fail_limit, self.measures.fail_count) {
            Some(StopReason::FailLimit)
        } else if self
            .config
            .time_limit_ms
            .is_some_and(|ms| self.started.elapsed() >= Duration::from_millis(ms))
        {
            Some(StopReason::TimeLimit)
        } else {
            None
        }
    }

    fn notify(&mut self, mut f: impl FnMut(&mut dyn SearchMonitor, &Model)) {
        for monitor in self.monitors.iter_mut() {
            f(monitor.as_mut(), self.model);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::{LinearSum, NotEqualConst, Operator};
    use crate::search::config::RestartPolicy;
    use crate::search::strategy::{ValSelector, VarSelector};

    fn sum_model() -> (Model, PropagationEngine, Vec<crate::variables::IntVar>) {
        let mut model = Model::new("sum");
        let x = model.new_int_var("x", 0, 3).unwrap();
        let y = model.new_int_var("y", 0, 3).unwrap();
        let mut engine = PropagationEngine::new();
        let sum = LinearSum::sum(&[x, y], Operator::Eq, 3).unwrap();
        engine.add_propagator(&mut model, Box::new(sum));
        (model, engine, vec![x, y])
    }

    fn solve(
        model: &mut Model,
        engine: &mut PropagationEngine,
        vars: &[crate::variables::IntVar],
        config: &SearchConfig,
        objective: Option<Objective>,
    ) -> (SearchResult, Vec<Solution>) {
        let mut strategy = IntStrategy::input_order_min(vars.to_vec());
        let mut monitors: Vec<Box<dyn SearchMonitor>> = Vec::new();
        let mut solutions = Vec::new();
        let mut collect = |s: &Solution| solutions.push(s.clone());
        let result = SearchLoop::new(model, engine, &mut strategy, &mut monitors, config)
            .with_objective(objective)
            .with_solution_callback(&mut collect)
            .run();
        (result, solutions)
    }

    #[test]
    fn test_enumerates_all_solutions() {
        let (mut model, mut engine, vars) = sum_model();
        let (result, solutions) = solve(&mut model, &mut engine, &vars, &SearchConfig::default(), None);

        assert_eq!(result.status, SolverStatus::Feasible);
        assert!(result.stopped.is_none());
        let pairs: Vec<(i64, i64)> = solutions
            .iter()
            .map(|s| (s.value(vars[0]), s.value(vars[1])))
            .collect();
        assert_eq!(pairs, vec![(0, 3), (1, 2), (2, 1), (3, 0)]);
        assert_eq!(model.env().world_index(), 0);
        assert_eq!(model.size(vars[0]), 4);
    }

    #[test]
    fn test_first_solution_only() {
        let (mut model, mut engine, vars) = sum_model();
        let config = SearchConfig::default().with_solution_limit(1);
        let (result, solutions) = solve(&mut model, &mut engine, &vars, &config, None);

        assert_eq!(result.status, SolverStatus::Feasible);
        assert_eq!(result.stopped, Some(StopReason::SolutionLimit));
        assert_eq!(solutions.len(), 1);
        assert_eq!(solutions[0].values(), &[0, 3]);
    }

    #[test]
    fn test_node_limit_zero_is_unknown() {
        let (mut model, mut engine, vars) = sum_model();
        let config = SearchConfig::default().with_node_limit(0);
        let (result, solutions) = solve(&mut model, &mut engine, &vars, &config, None);

        assert_eq!(result.status, SolverStatus::Unknown);
        assert_eq!(result.stopped, Some(StopReason::NodeLimit));
        assert!(solutions.is_empty());
        assert_eq!(model.env().world_index(), 0);
    }

    #[test]
    fn test_root_failure_is_infeasible() {
        let mut model = Model::new("infeasible");
        let x = model.new_int_var("x", 0, 1).unwrap();
        let mut engine = PropagationEngine::new();
        engine.add_propagator(&mut model, Box::new(NotEqualConst::new(x, 0)));
        engine.add_propagator(&mut model, Box::new(NotEqualConst::new(x, 1)));

        let (result, _) = solve(&mut model, &mut engine, &[x], &SearchConfig::default(), None);
        assert_eq!(result.status, SolverStatus::Infeasible);
        assert_eq!(result.measures.node_count, 0);
        assert_eq!(result.measures.fail_count, 1);
    }

    #[test]
    fn test_branch_and_bound_strictly_improves() {
        // minimize z = 2x - y with x + y = 3
        let (mut model, mut engine, vars) = sum_model();
        let z = model.new_int_var("z", -10, 10).unwrap();
        let link = LinearSum::new(&[2, -1, -1], &[vars[0], vars[1], z], Operator::Eq, 0).unwrap();
        engine.add_propagator(&mut model, Box::new(link));

        let (result, solutions) = solve(
            &mut model,
            &mut engine,
            &vars,
            &SearchConfig::default(),
            Some(Objective::Minimize(z)),
        );

        assert_eq!(result.status, SolverStatus::Optimal);
        let objectives: Vec<i64> = solutions.iter().filter_map(|s| s.objective).collect();
        assert!(objectives.windows(2).all(|w| w[1] < w[0]), "{objectives:?}");
        assert_eq!(result.solution.as_ref().and_then(|s| s.objective), Some(-3));
        assert_eq!(result.measures.best_objective, Some(-3));
    }

    #[test]
    fn test_restarts_keep_bound_and_terminate() {
        let (mut model, mut engine, vars) = sum_model();
        let config = SearchConfig::default()
            .with_restart(RestartPolicy::OnSolution)
            .with_nogoods_on_restart(true);
        let (result, solutions) = solve(
            &mut model,
            &mut engine,
            &vars,
            &config,
            Some(Objective::Maximize(vars[0])),
        );

        assert_eq!(result.status, SolverStatus::Optimal);
        assert_eq!(result.solution.map(|s| s.value(vars[0])), Some(3));
        assert!(result.measures.restart_count >= 1);
        assert_eq!(solutions.len() as u64, result.measures.solution_count);
        assert_eq!(model.env().world_index(), 0);
    }

    #[test]
    fn test_restarts_do_not_repeat_solutions() {
        let (mut model, mut engine, vars) = sum_model();
        let config = SearchConfig::default().with_restart(RestartPolicy::Luby { scale: 1 });
        let mut strategy = IntStrategy::with_seed(vars.clone(), VarSelector::Random, ValSelector::Random, 9);
        let mut monitors: Vec<Box<dyn SearchMonitor>> = Vec::new();
        let mut found = Vec::new();
        let mut collect = |s: &Solution| found.push(s.values().to_vec());
        let result = SearchLoop::new(&mut model, &mut engine, &mut strategy, &mut monitors, &config)
            .with_solution_callback(&mut collect)
            .run();

        assert_eq!(result.status, SolverStatus::Feasible);
        found.sort();
        let before = found.len();
        found.dedup();
        assert_eq!(found.len(), before);
        assert_eq!(found.len(), 4);
    }

    #[test]
    fn test_recorded_nogoods_do_not_outlive_the_run() {
        let (mut model, mut engine, vars) = sum_model();
        let config = SearchConfig::default()
            .with_restart(RestartPolicy::OnSolution)
            .with_nogoods_on_restart(true);
        for _ in 0..2 {
            let (result, solutions) = solve(&mut model, &mut engine, &vars, &config, None);
            assert_eq!(result.status, SolverStatus::Feasible);
            assert_eq!(solutions.len(), 4);
            assert_eq!(engine.propagator_count(), 1);
        }
        for _ in 0..2 {
            let (result, _) = solve(
                &mut model,
                &mut engine,
                &vars,
                &config,
                Some(Objective::Maximize(vars[0])),
            );
            assert_eq!(result.status, SolverStatus::Optimal);
            assert_eq!(result.solution.map(|s| s.value(vars[0])), Some(3));
            assert_eq!(engine.propagator_count(), 1);
        }
    }

    #[test]
    fn test_cancellation() {
        let (mut model, mut engine, vars) = sum_model();
        let mut strategy = IntStrategy::input_order_min(vars);
        let mut monitors: Vec<Box<dyn SearchMonitor>> = Vec::new();
        let config = SearchConfig::default();
        let cancel = AtomicBool::new(true);
        let result = SearchLoop::new(&mut model, &mut engine, &mut strategy, &mut monitors, &config)
            .with_cancel(Some(&cancel))
            .run();
        assert_eq!(result.status, SolverStatus::Unknown);
        assert_eq!(result.stopped, Some(StopReason::Cancelled));
    }
}
