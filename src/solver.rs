//! Solver façade: a model, its propagators and a search configuration.

use crate::error::{Result, SolverError};
use crate::model::Model;
use crate::propagation::{PropagationEngine, Propagator, PropagatorId};
use crate::search::{
    IntStrategy, Objective, SearchConfig, SearchLoop, SearchMonitor, SearchResult,
    SearchStrategy, Solution, ValSelector, VarSelector,
};
use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Owns a [`Model`] and a [`PropagationEngine`] and runs searches over them.
///
/// Every search starts from the state the model is in when it is called
/// and leaves it there on return, so a solver can be searched repeatedly,
/// with propagators posted or removed in between.
///
/// # Examples
///
/// ```
/// use u_cpsolve::constraints::{LinearSum, Operator};
/// use u_cpsolve::search::SolverStatus;
/// use u_cpsolve::Solver;
///
/// let mut solver = Solver::new("sum");
/// let x = solver.model_mut().new_int_var("x", 0, 3).unwrap();
/// let y = solver.model_mut().new_int_var("y", 0, 3).unwrap();
/// solver.post(LinearSum::sum(&[x, y], Operator::Eq, 3).unwrap());
///
/// let mut count = 0;
/// let result = solver.find_all_solutions(|_| count += 1).unwrap();
/// assert_eq!(result.status, SolverStatus::Feasible);
/// assert_eq!(count, 4);
/// ```
pub struct Solver {
    model: Model,
    engine: PropagationEngine,
    config: SearchConfig,
    strategy: Option<Box<dyn SearchStrategy>>,
    monitors: Vec<Box<dyn SearchMonitor>>,
    cancel: Option<Arc<AtomicBool>>,
}

impl Solver {
    pub fn new(name: impl Into<String>) -> Self {
        Self::from_model(Model::new(name))
    }

    /// Wraps an existing model. Its variables keep their current domains.
    pub fn from_model(model: Model) -> Self {
        Self {
            model,
            engine: PropagationEngine::new(),
            config: SearchConfig::default(),
            strategy: None,
            monitors: Vec::new(),
            cancel: None,
        }
    }

    pub fn with_config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    pub fn engine(&self) -> &PropagationEngine {
        &self.engine
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut SearchConfig {
        &mut self.config
    }

    /// Posts a propagator for every subsequent search.
    ///
    /// # Panics
    ///
    /// Panics if the propagator refers to a variable of another model.
    pub fn post<P: Propagator + 'static>(&mut self, propagator: P) -> PropagatorId {
        self.engine.add_propagator(&mut self.model, Box::new(propagator))
    }

    /// Removes a posted propagator.
    ///
    /// # Panics
    ///
    /// Panics if `id` was already removed.
    pub fn unpost(&mut self, id: PropagatorId) {
        self.engine.remove_propagator(id);
    }

    /// Replaces the decision heuristic.
    ///
    /// Without one, the search branches on every variable in creation order,
    /// smallest value first.
    pub fn set_strategy<S: SearchStrategy + 'static>(&mut self, strategy: S) {
        self.strategy = Some(Box::new(strategy));
    }

    pub fn add_monitor<M: SearchMonitor + 'static>(&mut self, monitor: M) {
        self.monitors.push(Box::new(monitor));
    }

    /// Installs a flag that stops the search at the next node once set.
    pub fn set_cancel_flag(&mut self, cancel: Arc<AtomicBool>) {
        self.cancel = Some(cancel);
    }

    /// Searches for one solution.
    pub fn solve(&mut self) -> Result<SearchResult> {
        let mut config = self.config.clone();
        config.solution_limit = Some(1);
        self.run(&config, None, &mut |_| {})
    }

    /// Enumerates solutions until the tree is exhausted or a limit is hit.
    pub fn find_all_solutions(
        &mut self,
        mut on_solution: impl FnMut(&Solution),
    ) -> Result<SearchResult> {
        let config = self.config.clone();
        self.run(&config, None, &mut on_solution)
    }

    /// Branch-and-bound: every reported solution strictly improves on the
    /// previous one, and the status is `Optimal` once the tree is exhausted.
    pub fn find_optimal_solution(
        &mut self,
        objective: Objective,
        mut on_solution: impl FnMut(&Solution),
    ) -> Result<SearchResult> {
        if !self.model.owns(objective.var()) {
            return Err(SolverError::Model(format!(
                "objective variable {} is not part of model {}",
                objective.var(),
                self.model.name()
            )));
        }
        let config = self.config.clone();
        self.run(&config, Some(objective), &mut on_solution)
    }

    fn run(
        &mut self,
        config: &SearchConfig,
        objective: Option<Objective>,
        on_solution: &mut dyn FnMut(&Solution),
    ) -> Result<SearchResult> {
        config.validate()?;

        let mut default_strategy;
        let strategy: &mut dyn SearchStrategy = match self.strategy.as_mut() {
            Some(strategy) => strategy.as_mut(),
            None => {
                default_strategy = IntStrategy::with_seed(
                    self.model.vars().collect(),
                    VarSelector::InputOrder,
                    ValSelector::Min,
                    config.seed.unwrap_or_else(rand::random),
                );
                &mut default_strategy
            }
        };

        let result = SearchLoop::new(
            &mut self.model,
            &mut self.engine,
            strategy,
            &mut self.monitors,
            config,
        )
        .with_objective(objective)
        .with_cancel(self.cancel.as_deref())
        .with_solution_callback(on_solution)
        .run();
        Ok(result)
    }
}

impl fmt::Debug for Solver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Solver")
            .field("model", &self.model.name())
            .field("vars", &self.model.var_count())
            .field("propagators", &self.engine.propagator_count())
            .field("config", &self.config)
            .field("monitors", &self.monitors.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::{DistanceXYC, LinearSum, NotEqualConst, NotEqualXYC, Operator};
    use crate::search::{Measures, RestartPolicy, SolverStatus, StopReason};
    use crate::variables::IntVar;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn sum_solver() -> (Solver, IntVar, IntVar) {
        let mut solver = Solver::new("sum");
        let x = solver.model_mut().new_int_var("x", 0, 3).unwrap();
        let y = solver.model_mut().new_int_var("y", 0, 3).unwrap();
        solver.post(LinearSum::sum(&[x, y], Operator::Eq, 3).unwrap());
        (solver, x, y)
    }

    #[test]
    fn test_solve_first_solution() {
        let (mut solver, x, y) = sum_solver();
        let result = solver.solve().unwrap();
        assert_eq!(result.status, SolverStatus::Feasible);
        let solution = result.solution.unwrap();
        assert_eq!((solution.value(x), solution.value(y)), (0, 3));
        // the model is left as it was
        assert_eq!(solver.model().size(x), 4);
    }

    #[test]
    fn test_repeated_searches_agree() {
        let (mut solver, _, _) = sum_solver();
        let first = solver.find_all_solutions(|_| {}).unwrap();
        let second = solver.find_all_solutions(|_| {}).unwrap();
        assert_eq!(first.measures.solution_count, 4);
        assert_eq!(second.measures.solution_count, 4);
    }

    #[test]
    fn test_unpost_widens_solutions() {
        let (mut solver, x, _) = sum_solver();
        let id = solver.post(NotEqualConst::new(x, 0));
        assert_eq!(solver.find_all_solutions(|_| {}).unwrap().measures.solution_count, 3);

        solver.unpost(id);
        assert_eq!(solver.find_all_solutions(|_| {}).unwrap().measures.solution_count, 4);
    }

    #[test]
    fn test_repeated_searches_with_restarts() {
        let (solver, x, _) = sum_solver();
        let config = SearchConfig::default()
            .with_restart(RestartPolicy::OnSolution)
            .with_nogoods_on_restart(true);
        let mut solver = solver.with_config(config);
        for _ in 0..2 {
            let result = solver.find_all_solutions(|_| {}).unwrap();
            assert_eq!(result.status, SolverStatus::Feasible);
            assert_eq!(result.measures.solution_count, 4);
        }
        let result = solver
            .find_optimal_solution(Objective::Minimize(x), |_| {})
            .unwrap();
        assert_eq!(result.status, SolverStatus::Optimal);
        assert_eq!(result.solution.map(|s| s.value(x)), Some(0));
        assert!(solver.solve().unwrap().is_solution_found());
        assert_eq!(solver.engine().propagator_count(), 1);
    }

    fn enumerate_bounded(val_selector: ValSelector) -> (SearchResult, Vec<i64>) {
        let mut solver = Solver::new("bounded").with_config(SearchConfig::default().with_node_limit(1_000));
        let x = solver.model_mut().new_bounded_var("x", 0, 4).unwrap();
        solver.set_strategy(IntStrategy::with_seed(vec![x], VarSelector::InputOrder, val_selector, 11));
        let mut values = Vec::new();
        let result = solver.find_all_solutions(|s| values.push(s.value(x))).unwrap();
        values.sort_unstable();
        (result, values)
    }

    #[test]
    fn test_bounded_enumeration_terminates() {
        for val_selector in [ValSelector::Middle, ValSelector::Random] {
            let (result, values) = enumerate_bounded(val_selector);
            assert_eq!(result.stopped, None, "{val_selector:?}");
            assert_eq!(result.status, SolverStatus::Feasible);
            assert_eq!(values, vec![0, 1, 2, 3, 4], "{val_selector:?}");
        }
    }

    #[test]
    fn test_optimal_with_callbacks() {
        let (mut solver, x, y) = sum_solver();
        // x and y at least 2 apart, maximize y
        solver.post(DistanceXYC::new(solver.model(), x, y, Operator::Gt, 1).unwrap());
        let mut seen = Vec::new();
        let result = solver
            .find_optimal_solution(Objective::Maximize(y), |s| seen.push(s.value(y)))
            .unwrap();

        assert_eq!(result.status, SolverStatus::Optimal);
        assert_eq!(result.solution.map(|s| s.value(y)), Some(3));
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_foreign_objective_rejected() {
        let (mut solver, _, _) = sum_solver();
        let mut other = Model::new("other");
        for i in 0..5 {
            other.new_int_var(format!("v{i}"), 0, 1).unwrap();
        }
        let foreign = other.vars().last().unwrap();
        let err = solver
            .find_optimal_solution(Objective::Minimize(foreign), |_| {})
            .unwrap_err();
        assert!(matches!(err, SolverError::Model(_)));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let (solver, _, _) = sum_solver();
        let config = SearchConfig::default().with_restart(RestartPolicy::Luby { scale: 0 });
        let mut solver = solver.with_config(config);
        assert!(matches!(solver.solve(), Err(SolverError::Config(_))));
    }

    #[test]
    fn test_limits_and_cancel() {
        let (solver, _, _) = sum_solver();
        let mut solver = solver.with_config(SearchConfig::default().with_node_limit(0));
        let result = solver.solve().unwrap();
        assert_eq!(result.status, SolverStatus::Unknown);
        assert!(!result.is_solution_found());

        solver.config_mut().node_limit = None;
        solver.set_cancel_flag(Arc::new(AtomicBool::new(true)));
        let result = solver.solve().unwrap();
        assert_eq!(result.stopped, Some(StopReason::Cancelled));
    }

    #[test]
    fn test_infeasible() {
        let (mut solver, x, y) = sum_solver();
        solver.post(NotEqualXYC::new(solver.model(), x, y, 3));
        let result = solver.find_all_solutions(|_| {}).unwrap();
        assert_eq!(result.status, SolverStatus::Infeasible);
        assert!(result.solution.is_none());
    }

    #[test]
    fn test_tracing_monitor_with_restarts() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let (solver, x, _) = sum_solver();
        let config = SearchConfig::default()
            .with_restart(RestartPolicy::Geometric {
                scale: 2,
                factor: 1.5,
            })
            .with_nogoods_on_restart(true)
            .with_seed(7);
        let mut solver = solver.with_config(config);
        solver.add_monitor(crate::search::TracingMonitor::new());

        let result = solver
            .find_optimal_solution(Objective::Minimize(x), |_| {})
            .unwrap();
        assert_eq!(result.status, SolverStatus::Optimal);
        assert_eq!(result.measures.best_objective, Some(0));
    }

    #[derive(Clone, Default)]
    struct Recorder {
        events: Rc<RefCell<Vec<String>>>,
    }

    impl SearchMonitor for Recorder {
        fn on_initialize(&mut self, _model: &Model) {
            self.events.borrow_mut().push("init".into());
        }

        fn on_solution(&mut self, _model: &Model, _solution: &Solution) {
            self.events.borrow_mut().push("solution".into());
        }

        fn on_close(&mut self, measures: &Measures, status: SolverStatus) {
            self.events
                .borrow_mut()
                .push(format!("close {status:?} {}", measures.solution_count));
        }
    }

    #[test]
    fn test_monitor_sees_lifecycle() {
        let (mut solver, _, _) = sum_solver();
        let recorder = Recorder::default();
        solver.add_monitor(recorder.clone());
        solver.solve().unwrap();
        assert_eq!(
            *recorder.events.borrow(),
            vec!["init", "solution", "close Feasible 1"]
        );
    }
}
