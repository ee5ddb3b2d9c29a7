//! Task factories: the seam between planners and task construction.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::Result;
use crate::graph::DependencyGraph;
use crate::module::{Module, Service};
use crate::task::{BuildTask, DeployTask, Task, TestTask};

/// Parameters shared by every test task generated for one module.
#[derive(Debug, Clone, Default)]
pub struct TestTaskParams {
    pub force: bool,
    pub force_build: bool,
    pub dev_mode_service_names: BTreeSet<String>,
    pub hot_reload_service_names: BTreeSet<String>,
    /// Only tests with these names are generated; `None` means all.
    pub test_names: Option<BTreeSet<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct DeployTaskParams {
    pub force: bool,
    pub force_build: bool,
    pub from_watch: bool,
    pub dev_mode_service_names: BTreeSet<String>,
    pub hot_reload_service_names: BTreeSet<String>,
}

/// Parameters for deriving the tasks of one changed module.
#[derive(Debug, Clone, Default)]
pub struct WatchTaskParams {
    pub dev_mode_service_names: BTreeSet<String>,
    pub hot_reload_service_names: BTreeSet<String>,
    /// Services currently selected for deployment.
    pub service_names: BTreeSet<String>,
}

/// Produces build, test and deploy tasks for graph items.
///
/// A failure applies to the single module or service being planned.
#[async_trait]
pub trait TaskFactory: Send + Sync {
    async fn build_task(&self, module: &Module, force: bool) -> Result<Task>;

    async fn test_tasks(&self, module: &Module, params: &TestTaskParams) -> Result<Vec<Task>>;

    async fn deploy_task(&self, service: &Service, params: &DeployTaskParams) -> Result<Task>;
}

/// Derives rebuild/redeploy tasks for the targets directly affected by a
/// change in one module.
#[async_trait]
pub trait WatchTaskDeriver: Send + Sync {
    async fn module_watch_tasks(
        &self,
        graph: &DependencyGraph,
        module: &Module,
        params: &WatchTaskParams,
    ) -> Result<Vec<Task>>;
}

/// Builds tasks directly from graph data.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTaskFactory;

#[async_trait]
impl TaskFactory for DefaultTaskFactory {
    async fn build_task(&self, module: &Module, force: bool) -> Result<Task> {
        Ok(Task::Build(BuildTask {
            module: module.name.clone(),
            force,
        }))
    }

    async fn test_tasks(&self, module: &Module, params: &TestTaskParams) -> Result<Vec<Task>> {
        Ok(module
            .tests
            .iter()
            .filter(|t| !t.disabled)
            .filter(|t| {
                params
                    .test_names
                    .as_ref()
                    .map_or(true, |names| names.contains(&t.name))
            })
            .map(|t| {
                Task::Test(TestTask {
                    module: module.name.clone(),
                    test_name: t.name.clone(),
                    force: params.force,
                    force_build: params.force_build,
                    dev_mode_service_names: params.dev_mode_service_names.clone(),
                    hot_reload_service_names: params.hot_reload_service_names.clone(),
                })
            })
            .collect())
    }

    async fn deploy_task(&self, service: &Service, params: &DeployTaskParams) -> Result<Task> {
        Ok(Task::Deploy(DeployTask {
            service: service.name.clone(),
            module: service.module.clone(),
            force: params.force,
            force_build: params.force_build,
            from_watch: params.from_watch,
            dev_mode_service_names: params.dev_mode_service_names.clone(),
            hot_reload_service_names: params.hot_reload_service_names.clone(),
        }))
    }
}

/// Forces a rebuild of the changed module and a redeploy of its selected
/// services.
///
/// Hot-reloaded services are not redeployed: their code is pushed into the
/// running service instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultWatchTasks<F = DefaultTaskFactory> {
    factory: F,
}

impl<F: TaskFactory> DefaultWatchTasks<F> {
    pub fn new(factory: F) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl<F: TaskFactory> WatchTaskDeriver for DefaultWatchTasks<F> {
    async fn module_watch_tasks(
        &self,
        _graph: &DependencyGraph,
        module: &Module,
        params: &WatchTaskParams,
    ) -> Result<Vec<Task>> {
        let mut tasks = vec![self.factory.build_task(module, true).await?];

        let deploy_params = DeployTaskParams {
            force: true,
            force_build: false,
            from_watch: true,
            dev_mode_service_names: params.dev_mode_service_names.clone(),
            hot_reload_service_names: params.hot_reload_service_names.clone(),
        };

        for service in &module.services {
            if service.disabled
                || !params.service_names.contains(&service.name)
                || params.hot_reload_service_names.contains(&service.name)
            {
                continue;
            }
            tasks.push(self.factory.deploy_task(service, &deploy_params).await?);
        }

        Ok(tasks)
    }
}
