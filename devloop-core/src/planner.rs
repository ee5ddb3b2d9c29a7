//! Initial and change-driven task planning.

use std::sync::Arc;

use futures_util::future::join_all;

use crate::error::{Error, Result};
use crate::factory::{
    DefaultTaskFactory, DefaultWatchTasks, DeployTaskParams, TaskFactory, TestTaskParams,
    WatchTaskDeriver, WatchTaskParams,
};
use crate::graph::DependencyGraph;
use crate::module::Module;
use crate::request::TaskRequest;
use crate::settings::{module_should_be_tested, resolve, ResolvedSelection, SessionSettings};
use crate::task::Task;

/// A planning failure for one module or service.
#[derive(Debug)]
pub struct PlanningFailure {
    pub target: String,
    pub error: Error,
}

/// Output of one planner call.
///
/// A factory failure only drops the tasks of the item it was planning; tasks
/// for every other item are still present.
#[derive(Debug, Default)]
pub struct TaskPlan {
    pub tasks: Vec<Task>,
    pub failures: Vec<PlanningFailure>,
}

impl TaskPlan {
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Returns the tasks, or the first failure if any item could not be
    /// planned.
    pub fn into_result(self) -> Result<Vec<Task>> {
        match self.failures.into_iter().next() {
            Some(failure) => Err(Error::TaskPlanning {
                target: failure.target,
                message: failure.error.to_string(),
            }),
            None => Ok(self.tasks),
        }
    }

    fn record(&mut self, target: impl Into<String>, result: Result<Task>) {
        match result {
            Ok(task) => self.tasks.push(task),
            Err(error) => self.fail(target.into(), error),
        }
    }

    fn record_many(&mut self, target: impl Into<String>, result: Result<Vec<Task>>) {
        match result {
            Ok(tasks) => self.tasks.extend(tasks),
            Err(error) => self.fail(target.into(), error),
        }
    }

    fn fail(&mut self, target: String, error: Error) {
        tracing::warn!(item = %target, error = %error, "Failed to plan tasks");
        self.failures.push(PlanningFailure { target, error });
    }
}

/// Turns session settings and a graph snapshot into task lists.
pub struct TaskPlanner {
    factory: Arc<dyn TaskFactory>,
    watch_tasks: Arc<dyn WatchTaskDeriver>,
}

impl TaskPlanner {
    pub fn new() -> Self {
        Self {
            factory: Arc::new(DefaultTaskFactory),
            watch_tasks: Arc::new(DefaultWatchTasks::new(DefaultTaskFactory)),
        }
    }

    pub fn with_factory(mut self, factory: Arc<dyn TaskFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn with_watch_tasks(mut self, watch_tasks: Arc<dyn WatchTaskDeriver>) -> Self {
        self.watch_tasks = watch_tasks;
        self
    }

    /// Plans a full run: every build, then the selected tests, then deploys.
    pub async fn initial_tasks(
        &self,
        graph: &DependencyGraph,
        settings: &SessionSettings,
    ) -> TaskPlan {
        let resolution = resolve(graph, settings);
        let modules = graph.all_modules();
        let mut plan = TaskPlan::default();

        let builds = join_all(modules.iter().map(|m| self.factory.build_task(m, false))).await;
        for (module, result) in modules.iter().zip(builds) {
            plan.record(&module.name, result);
        }

        let tested: Vec<&Module> = modules
            .iter()
            .copied()
            .filter(|m| module_should_be_tested(settings, m))
            .collect();
        self.plan_tests(&mut plan, &tested, &resolution).await;

        let deploy_params = DeployTaskParams {
            force: false,
            force_build: false,
            from_watch: false,
            dev_mode_service_names: resolution.dev_mode_service_names.clone(),
            hot_reload_service_names: resolution.hot_reload_service_names.clone(),
        };
        let services: Vec<_> = resolution
            .services_to_deploy
            .iter()
            .filter(|s| !s.disabled)
            .collect();
        let deploys = join_all(
            services
                .iter()
                .map(|s| self.factory.deploy_task(s, &deploy_params)),
        )
        .await;
        for (service, result) in services.iter().zip(deploys) {
            plan.record(&service.name, result);
        }

        tracing::debug!(
            tasks = plan.tasks.len(),
            failures = plan.failures.len(),
            "Planned initial tasks"
        );
        plan
    }

    /// Plans the work caused by a change in `changed_module`.
    ///
    /// Rebuild and redeploy of the changed module come from the watch task
    /// deriver. Tests are re-run for the module and everything that
    /// transitively depends on it.
    ///
    /// # Errors
    ///
    /// Returns an error if `changed_module` is not in the graph.
    pub async fn watch_tasks(
        &self,
        graph: &DependencyGraph,
        changed_module: &str,
        settings: &SessionSettings,
    ) -> Result<TaskPlan> {
        let module = graph.module(changed_module)?;
        let resolution = resolve(graph, settings);
        let mut plan = TaskPlan::default();

        let params = WatchTaskParams {
            dev_mode_service_names: resolution.dev_mode_service_names.clone(),
            hot_reload_service_names: resolution.hot_reload_service_names.clone(),
            service_names: resolution.deploy_service_names(),
        };
        let derived = self
            .watch_tasks
            .module_watch_tasks(graph, module, &params)
            .await;
        plan.record_many(&module.name, derived);

        let tested: Vec<&Module> = graph
            .transitive_dependants(changed_module)?
            .into_iter()
            .filter(|m| module_should_be_tested(settings, m))
            .collect();
        self.plan_tests(&mut plan, &tested, &resolution).await;

        tracing::debug!(
            module = %changed_module,
            tasks = plan.tasks.len(),
            failures = plan.failures.len(),
            "Planned watch tasks"
        );
        Ok(plan)
    }

    /// Plans the single task a remote session asked for, with the session's
    /// dev-mode and hot-reload selections.
    ///
    /// # Errors
    ///
    /// Returns an error if the requested module or service is not in the
    /// graph.
    pub async fn requested_tasks(
        &self,
        graph: &DependencyGraph,
        request: &TaskRequest,
        settings: &SessionSettings,
    ) -> Result<TaskPlan> {
        let resolution = resolve(graph, settings);
        let mut plan = TaskPlan::default();

        match request {
            TaskRequest::Build { module, force } => {
                let module = graph.module(module)?;
                plan.record(&module.name, self.factory.build_task(module, *force).await);
            }
            TaskRequest::Deploy { service, force } => {
                let service = graph
                    .get_service(service)
                    .ok_or_else(|| Error::ServiceNotFound {
                        name: service.clone(),
                        available: graph.service_names().join(", "),
                    })?;
                let params = DeployTaskParams {
                    force: *force,
                    force_build: false,
                    from_watch: false,
                    dev_mode_service_names: resolution.dev_mode_service_names,
                    hot_reload_service_names: resolution.hot_reload_service_names,
                };
                plan.record(&service.name, self.factory.deploy_task(service, &params).await);
            }
            TaskRequest::Test { module, force } => {
                let module = graph.module(module)?;
                let params = TestTaskParams {
                    force: *force,
                    force_build: false,
                    dev_mode_service_names: resolution.dev_mode_service_names,
                    hot_reload_service_names: resolution.hot_reload_service_names,
                    test_names: resolution.test_names,
                };
                plan.record_many(&module.name, self.factory.test_tasks(module, &params).await);
            }
        }

        Ok(plan)
    }

    async fn plan_tests(
        &self,
        plan: &mut TaskPlan,
        modules: &[&Module],
        resolution: &ResolvedSelection,
    ) {
        let params = TestTaskParams {
            force: false,
            force_build: false,
            dev_mode_service_names: resolution.dev_mode_service_names.clone(),
            hot_reload_service_names: resolution.hot_reload_service_names.clone(),
            test_names: resolution.test_names.clone(),
        };
        let results = join_all(modules.iter().map(|m| self.factory.test_tasks(m, &params))).await;
        for (module, result) in modules.iter().zip(results) {
            plan.record_many(&module.name, result);
        }
    }
}

impl Default for TaskPlanner {
    fn default() -> Self {
        Self::new()
    }
}
