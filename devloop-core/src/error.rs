//! Error types and result aliases.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error in {context}: {error}")]
    Toml {
        error: toml::de::Error,
        context: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Module not found: {name}. Available modules: {available}")]
    ModuleNotFound { name: String, available: String },

    #[error("Service not found: {name}. Available services: {available}")]
    ServiceNotFound { name: String, available: String },

    #[error("Duplicate {kind} name: {name}")]
    DuplicateName { kind: &'static str, name: String },

    #[error("Circular dependency detected: {0}. Use 'devloop graph' to inspect module dependencies.")]
    CircularDependency(String),

    #[error("Config file not found: {0}. Expected 'devloop.toml' in the project root.")]
    ConfigNotFound(PathBuf),

    #[error("Invalid session settings: {0}")]
    Validation(String),

    #[error("Failed to plan {target}: {message}")]
    TaskPlanning { target: String, message: String },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Log source error for {service}: {message}")]
    LogSource { service: String, message: String },

    #[error("Watcher error: {0}")]
    Watcher(String),
}

impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::Toml {
            error,
            context: "devloop.toml".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
