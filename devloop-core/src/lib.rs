//! Core library for continuous-development orchestration.

pub mod config;
pub mod error;
pub mod events;
pub mod factory;
pub mod graph;
pub mod logs;
pub mod module;
pub mod planner;
pub mod remote;
pub mod request;
pub mod session;
pub mod settings;
pub mod task;
pub mod watcher;

pub use config::{ProjectConfig, CONFIG_FILE_NAME};
pub use error::{Error, Result};
pub use events::{Event, EventBus, EventName, EventSubscription};
pub use factory::{DefaultTaskFactory, DefaultWatchTasks, TaskFactory, WatchTaskDeriver};
pub use graph::DependencyGraph;
pub use logs::{CommandLogSource, LogMultiplexer, LogSink, LogSource, LogStreamEntry};
pub use module::{Module, Service, TestConfig};
pub use planner::{PlanningFailure, TaskPlan, TaskPlanner};
pub use remote::{ChannelState, EventChannel, RemoteConfig, RemoteSession, WsRemoteSession};
pub use request::TaskRequest;
pub use session::DevSession;
pub use settings::{module_should_be_tested, resolve, ResolvedSelection, Selection, SessionSettings};
pub use task::{dedupe_tasks, Task, TaskKind};
pub use watcher::{ModuleWatcher, WatcherConfig};
