//! Configuration for the remote collaboration session.

use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    500
}

/// Configuration for the remote collaboration session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base WebSocket URL; the session id is appended as the last segment.
    pub url: String,
    /// Session to join. Without one there is no remote session.
    pub session_id: Option<String>,
    /// Reconnect attempts after the first connection, for the whole process.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first reconnect; doubled for each further attempt.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            session_id: None,
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl RemoteConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff_ms = backoff.as_millis() as u64;
        self
    }

    /// Whether a remote session can be joined at all.
    pub fn is_enabled(&self) -> bool {
        !self.url.is_empty() && self.session_id.as_deref().is_some_and(|id| !id.is_empty())
    }

    /// Delay before reconnect attempt `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.backoff_ms.saturating_mul(factor))
    }
}
