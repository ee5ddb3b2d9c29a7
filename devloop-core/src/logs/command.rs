//! Log source backed by a per-service shell command.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::error::{Error, Result};

use super::{LogEntryStream, LogRequest, LogSource, LogStreamEntry};

/// Runs the service's `logs` command and turns each stdout line into an
/// entry stamped with the time it was read.
///
/// The command sees `DEVLOOP_LOGS_SINCE` (seconds) and `DEVLOOP_LOGS_FOLLOW`
/// (`true`/`false`) in its environment.
pub struct CommandLogSource {
    working_dir: PathBuf,
}

impl CommandLogSource {
    pub fn new(working_dir: impl AsRef<Path>) -> Self {
        Self {
            working_dir: working_dir.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl LogSource for CommandLogSource {
    async fn open(&self, request: LogRequest) -> Result<LogEntryStream> {
        let service = request.service.name.clone();
        let command = request
            .service
            .logs
            .as_deref()
            .ok_or_else(|| Error::LogSource {
                service: service.clone(),
                message: "no logs command configured".to_string(),
            })?;

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.working_dir)
            .env("DEVLOOP_LOGS_SINCE", request.since.as_secs().to_string())
            .env("DEVLOOP_LOGS_FOLLOW", request.follow.to_string())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::LogSource {
                service: service.clone(),
                message: format!("Failed to spawn logs command: {}", e),
            })?;

        let stdout = child.stdout.take().ok_or_else(|| Error::LogSource {
            service: service.clone(),
            message: "Failed to capture stdout".to_string(),
        })?;
        let lines = BufReader::new(stdout).lines();

        // The child rides along in the stream state so it lives as long as
        // the stream and is killed when the stream is dropped.
        let stream = futures_util::stream::unfold(
            (child, lines, service),
            |(child, mut lines, service)| async move {
                match lines.next_line().await {
                    Ok(Some(message)) => {
                        let entry = LogStreamEntry {
                            service_name: service.clone(),
                            message,
                            timestamp: Some(Utc::now()),
                        };
                        Some((Ok(entry), (child, lines, service)))
                    }
                    Ok(None) => None,
                    Err(e) => {
                        let error = Error::LogSource {
                            service: service.clone(),
                            message: format!("Failed to read logs: {}", e),
                        };
                        Some((Err(error), (child, lines, service)))
                    }
                }
            },
        );

        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::Service;
    use std::time::Duration;
    use tempfile::TempDir;

    fn request(logs: Option<&str>) -> LogRequest {
        let mut service = Service::new("api", "backend");
        service.logs = logs.map(str::to_string);
        LogRequest {
            service,
            follow: false,
            since: Duration::from_secs(60),
        }
    }

    #[tokio::test]
    async fn test_streams_command_output_lines() {
        let temp_dir = TempDir::new().unwrap();
        let source = CommandLogSource::new(temp_dir.path());

        let stream = source
            .open(request(Some("echo first; echo second")))
            .await
            .unwrap();
        let entries: Vec<_> = stream.collect().await;

        let messages: Vec<String> = entries
            .into_iter()
            .map(|e| e.unwrap().message)
            .collect();
        assert_eq!(messages, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_passes_since_to_command() {
        let temp_dir = TempDir::new().unwrap();
        let source = CommandLogSource::new(temp_dir.path());

        let mut stream = source
            .open(request(Some("echo $DEVLOOP_LOGS_SINCE")))
            .await
            .unwrap();
        let entry = stream.next().await.unwrap().unwrap();
        assert_eq!(entry.message, "60");
        assert_eq!(entry.service_name, "api");
        assert!(entry.timestamp.is_some());
    }

    #[tokio::test]
    async fn test_missing_command_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let source = CommandLogSource::new(temp_dir.path());

        let result = source.open(request(None)).await;
        assert!(matches!(result, Err(Error::LogSource { .. })));
    }
}
