//! Per-service log streaming into the remote session.

mod command;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::module::Service;

pub use command::CommandLogSource;

/// One log line from a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogStreamEntry {
    pub service_name: String,
    pub message: String,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct LogRequest {
    pub service: Service,
    pub follow: bool,
    /// How far back to start reading.
    pub since: Duration,
}

pub type LogEntryStream = BoxStream<'static, Result<LogStreamEntry>>;

/// Opens log streams for services. Each call starts a fresh stream.
#[async_trait]
pub trait LogSource: Send + Sync {
    async fn open(&self, request: LogRequest) -> Result<LogEntryStream>;
}

/// Receives log lines. Delivery is best effort.
pub trait LogSink: Send + Sync {
    /// Returns `false` if the entry was dropped.
    fn offer(&self, entry: LogStreamEntry) -> bool;
}

/// Entries not worth sending, such as blank lines.
pub fn skip_entry(entry: &LogStreamEntry) -> bool {
    entry.message.trim().is_empty()
}

/// Runs one log-following task per service.
///
/// Streams are independent: a service whose source fails or ends does not
/// affect the others.
pub struct LogMultiplexer {
    tasks: JoinSet<()>,
    cancel: CancellationToken,
}

impl LogMultiplexer {
    pub fn start(
        services: Vec<Service>,
        source: Arc<dyn LogSource>,
        sink: Arc<dyn LogSink>,
        since: Duration,
    ) -> Self {
        let cancel = CancellationToken::new();
        let mut tasks = JoinSet::new();

        for service in services {
            let request = LogRequest {
                service,
                follow: true,
                since,
            };
            tasks.spawn(follow_service(
                request,
                Arc::clone(&source),
                Arc::clone(&sink),
                cancel.clone(),
            ));
        }

        Self { tasks, cancel }
    }

    /// Number of streams still running.
    pub fn active(&self) -> usize {
        self.tasks.len()
    }

    /// Waits until every stream has ended on its own.
    pub async fn join(mut self) {
        while self.tasks.join_next().await.is_some() {}
    }

    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        while self.tasks.join_next().await.is_some() {}
    }
}

async fn follow_service(
    request: LogRequest,
    source: Arc<dyn LogSource>,
    sink: Arc<dyn LogSink>,
    cancel: CancellationToken,
) {
    let service = request.service.name.clone();

    let mut stream = tokio::select! {
        _ = cancel.cancelled() => return,
        opened = source.open(request) => match opened {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(service = %service, error = %e, "Failed to open log stream");
                return;
            }
        },
    };
    tracing::debug!(service = %service, "Following service logs");

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => return,
            next = stream.next() => next,
        };

        match next {
            Some(Ok(mut entry)) => {
                if skip_entry(&entry) {
                    continue;
                }
                entry.service_name.clone_from(&service);
                if !sink.offer(entry) {
                    tracing::trace!(service = %service, "Dropped log entry");
                }
            }
            Some(Err(e)) => {
                tracing::warn!(service = %service, error = %e, "Log stream failed");
                return;
            }
            None => {
                tracing::debug!(service = %service, "Log stream ended");
                return;
            }
        }
    }
}
