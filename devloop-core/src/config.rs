//! TOML configuration for a devloop project (`devloop.toml`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::graph::DependencyGraph;
use crate::module::Module;
use crate::remote::RemoteConfig;
use crate::settings::{Selection, SessionSettings};

pub const CONFIG_FILE_NAME: &str = "devloop.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSection {
    pub name: String,
}

/// Default selections for `devloop dev`, overridable from the command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDefaults {
    #[serde(default = "select_all")]
    pub deploy: Selection,
    #[serde(default = "select_all")]
    pub test_modules: Selection,
    #[serde(default = "select_all")]
    pub tests: Selection,
    #[serde(default)]
    pub dev_mode: Selection,
    #[serde(default)]
    pub hot_reload: Selection,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            deploy: Selection::All,
            test_modules: Selection::All,
            tests: Selection::All,
            dev_mode: Selection::none(),
            hot_reload: Selection::none(),
        }
    }
}

fn select_all() -> Selection {
    Selection::All
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsConfig {
    /// How far back log streams start when the session begins.
    #[serde(default = "default_since_secs")]
    pub since_secs: u64,
}

fn default_since_secs() -> u64 {
    60
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            since_secs: default_since_secs(),
        }
    }
}

impl LogsConfig {
    pub fn since(&self) -> Duration {
        Duration::from_secs(self.since_secs)
    }
}

/// Project configuration as defined in `devloop.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub project: ProjectSection,
    #[serde(default)]
    pub modules: Vec<Module>,
    #[serde(default)]
    pub session: SessionDefaults,
    #[serde(default)]
    pub remote: Option<RemoteConfig>,
    #[serde(default)]
    pub logs: LogsConfig,
    /// Directory containing the config file; module paths are relative to it.
    #[serde(skip)]
    pub root: PathBuf,
}

impl ProjectConfig {
    /// Loads and parses a project file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigNotFound`] if the file does not exist, or a TOML
    /// error naming the file if it cannot be parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::ConfigNotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)?;
        let mut config: ProjectConfig = toml::from_str(&content).map_err(|error| Error::Toml {
            error,
            context: path.display().to_string(),
        })?;
        config.root = path
            .parent()
            .map(Path::to_path_buf)
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(config)
    }

    /// Builds the dependency graph for the configured modules.
    pub fn graph(&self) -> Result<DependencyGraph> {
        DependencyGraph::new(self.modules.clone())
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            deploy_service_names: self.session.deploy.clone(),
            test_module_names: self.session.test_modules.clone(),
            test_config_names: self.session.tests.clone(),
            dev_mode_service_names: self.session.dev_mode.clone(),
            hot_reload_service_names: self.session.hot_reload.clone(),
        }
    }
}
