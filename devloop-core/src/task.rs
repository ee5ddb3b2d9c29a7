//! Build, test and deploy work items handed to the executor.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Build,
    Test,
    Deploy,
}

impl TaskKind {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Build => "build",
            TaskKind::Test => "test",
            TaskKind::Deploy => "deploy",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildTask {
    pub module: String,
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestTask {
    pub module: String,
    pub test_name: String,
    pub force: bool,
    pub force_build: bool,
    pub dev_mode_service_names: BTreeSet<String>,
    pub hot_reload_service_names: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployTask {
    pub service: String,
    pub module: String,
    pub force: bool,
    pub force_build: bool,
    pub from_watch: bool,
    pub dev_mode_service_names: BTreeSet<String>,
    pub hot_reload_service_names: BTreeSet<String>,
}

/// A unit of work for the external executor.
///
/// Ordering within a plan carries no scheduling meaning; the executor derives
/// real dependency order from the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Task {
    Build(BuildTask),
    Test(TestTask),
    Deploy(DeployTask),
}

impl Task {
    pub fn kind(&self) -> TaskKind {
        match self {
            Task::Build(_) => TaskKind::Build,
            Task::Test(_) => TaskKind::Test,
            Task::Deploy(_) => TaskKind::Deploy,
        }
    }

    /// Stable identity of the task's target, e.g. `test.api.unit`.
    pub fn key(&self) -> String {
        match self {
            Task::Build(t) => format!("build.{}", t.module),
            Task::Test(t) => format!("test.{}.{}", t.module, t.test_name),
            Task::Deploy(t) => format!("deploy.{}", t.service),
        }
    }

    pub fn force(&self) -> bool {
        match self {
            Task::Build(t) => t.force,
            Task::Test(t) => t.force,
            Task::Deploy(t) => t.force,
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())?;
        if self.force() {
            write!(f, " (force)")?;
        }
        Ok(())
    }
}

/// Drops tasks whose key was already seen, keeping the first occurrence.
pub fn dedupe_tasks(tasks: Vec<Task>) -> Vec<Task> {
    let mut seen = HashSet::new();
    tasks.into_iter().filter(|t| seen.insert(t.key())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(module: &str, force: bool) -> Task {
        Task::Build(BuildTask {
            module: module.to_string(),
            force,
        })
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let tasks = vec![build("a", true), build("b", false), build("a", false)];
        let deduped = dedupe_tasks(tasks);
        assert_eq!(deduped, vec![build("a", true), build("b", false)]);
    }

    #[test]
    fn test_task_serializes_with_kind_tag() {
        let json = serde_json::to_value(build("a", false)).unwrap();
        assert_eq!(json["kind"], "build");
        assert_eq!(json["module"], "a");
    }
}
