//! Continuous-development session: startup planning, remote hookup and
//! change-driven replanning.

use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::events::{EventBus, EventName};
use crate::graph::DependencyGraph;
use crate::logs::{LogMultiplexer, LogSource};
use crate::module::Service;
use crate::planner::{TaskPlan, TaskPlanner};
use crate::remote::{ChannelState, EventChannel, RemoteConfig, RemoteSession};
use crate::request::TaskRequest;
use crate::settings::{resolve, validate, SessionSettings};

struct RemoteHookup {
    session: Arc<dyn RemoteSession>,
    config: RemoteConfig,
}

struct LogHookup {
    source: Arc<dyn LogSource>,
    since: Duration,
}

/// One `devloop dev` run.
///
/// Settings are fixed for the session; the graph is passed in fresh on every
/// planning call.
pub struct DevSession {
    settings: SessionSettings,
    bus: EventBus,
    planner: TaskPlanner,
    remote: Option<RemoteHookup>,
    log_source: Option<LogHookup>,
    channel: EventChannel,
    log_streams: Option<LogMultiplexer>,
}

impl DevSession {
    pub fn new(settings: SessionSettings, bus: EventBus) -> Self {
        Self {
            settings,
            bus,
            planner: TaskPlanner::new(),
            remote: None,
            log_source: None,
            channel: EventChannel::disabled(),
            log_streams: None,
        }
    }

    pub fn with_planner(mut self, planner: TaskPlanner) -> Self {
        self.planner = planner;
        self
    }

    pub fn with_remote(mut self, session: Arc<dyn RemoteSession>, config: RemoteConfig) -> Self {
        self.remote = Some(RemoteHookup { session, config });
        self
    }

    /// Streams logs of deployed services to the remote session, starting
    /// `since` ago.
    pub fn with_log_source(mut self, source: Arc<dyn LogSource>, since: Duration) -> Self {
        self.log_source = Some(LogHookup { source, since });
        self
    }

    /// Validates settings, connects the remote session if configured and
    /// plans the initial tasks.
    ///
    /// # Errors
    ///
    /// Returns a validation error, before anything is started, if the
    /// settings name unknown or incompatible targets.
    pub async fn start(&mut self, graph: &DependencyGraph) -> Result<TaskPlan> {
        validate(graph, &self.settings)?;

        if let Some(remote) = &self.remote {
            self.channel = EventChannel::start(
                Arc::clone(&remote.session),
                remote.config.clone(),
                self.bus.clone(),
            );
        }

        if self.channel.state() != ChannelState::NoRemote {
            if let Some(logs) = &self.log_source {
                let services: Vec<Service> = resolve(graph, &self.settings)
                    .services_to_deploy
                    .into_iter()
                    .filter(|s| !s.disabled)
                    .collect();
                tracing::info!(services = services.len(), "Starting service log streams");
                self.log_streams = Some(LogMultiplexer::start(
                    services,
                    Arc::clone(&logs.source),
                    Arc::new(self.channel.clone()),
                    logs.since,
                ));
            }
        }

        self.bus.emit(
            EventName::SessionSettings,
            serde_json::to_value(&self.settings)?,
        );

        Ok(self.planner.initial_tasks(graph, &self.settings).await)
    }

    /// Plans the work for one changed module against a freshly loaded graph.
    pub async fn on_module_changed(
        &self,
        graph: &DependencyGraph,
        module_name: &str,
    ) -> Result<TaskPlan> {
        self.planner
            .watch_tasks(graph, module_name, &self.settings)
            .await
    }

    /// Plans a task a remote session asked for.
    pub async fn on_request(
        &self,
        graph: &DependencyGraph,
        request: &TaskRequest,
    ) -> Result<TaskPlan> {
        self.planner
            .requested_tasks(graph, request, &self.settings)
            .await
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn channel(&self) -> &EventChannel {
        &self.channel
    }

    /// Stops log streams and the remote channel.
    pub async fn shutdown(&mut self) {
        if let Some(streams) = self.log_streams.take() {
            streams.shutdown().await;
        }
        self.channel.shutdown().await;
    }
}
