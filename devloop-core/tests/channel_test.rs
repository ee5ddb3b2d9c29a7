use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use devloop_core::events::{EventBus, EventName};
use devloop_core::logs::LogStreamEntry;
use devloop_core::remote::{
    ChannelState, Connection, EventChannel, Frame, RemoteConfig, RemoteSession,
};
use devloop_core::{Error, Result};
use serde_json::{json, Value};
use tokio::sync::{mpsc, watch};

/// Client side of an in-memory connection.
struct MockConnection {
    inbound: mpsc::UnboundedReceiver<Result<Frame>>,
    outbound: mpsc::UnboundedSender<Frame>,
}

#[async_trait]
impl Connection for MockConnection {
    async fn send(&mut self, frame: Frame) -> Result<()> {
        self.outbound
            .send(frame)
            .map_err(|_| Error::Connection("remote end dropped".to_string()))
    }

    async fn recv(&mut self) -> Option<Result<Frame>> {
        self.inbound.recv().await
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Remote side of an in-memory connection. Dropping `to_client` closes it.
struct RemoteEnd {
    to_client: mpsc::UnboundedSender<Result<Frame>>,
    from_client: mpsc::UnboundedReceiver<Frame>,
}

impl RemoteEnd {
    async fn next_text(&mut self) -> Value {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), self.from_client.recv())
                .await
                .unwrap()
                .unwrap();
            if let Frame::Text(text) = frame {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }
}

fn connection_pair() -> (MockConnection, RemoteEnd) {
    let (to_client, inbound) = mpsc::unbounded_channel();
    let (outbound, from_client) = mpsc::unbounded_channel();
    (
        MockConnection { inbound, outbound },
        RemoteEnd {
            to_client,
            from_client,
        },
    )
}

/// Hands out queued connections; refuses once the queue is empty.
#[derive(Default)]
struct MockSession {
    attempts: AtomicUsize,
    connections: Mutex<VecDeque<MockConnection>>,
}

impl MockSession {
    fn with_connections(connections: Vec<MockConnection>) -> Arc<Self> {
        Arc::new(Self {
            attempts: AtomicUsize::new(0),
            connections: Mutex::new(connections.into()),
        })
    }

    fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteSession for MockSession {
    async fn connect(&self, _session_id: &str) -> Result<Box<dyn Connection>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        match self.connections.lock().unwrap().pop_front() {
            Some(connection) => Ok(Box::new(connection)),
            None => Err(Error::Connection("connection refused".to_string())),
        }
    }
}

fn config(backoff: Duration) -> RemoteConfig {
    RemoteConfig::new("ws://remote.test/sessions")
        .with_session_id("session-1")
        .with_backoff(backoff)
}

async fn wait_for_state(
    mut states: watch::Receiver<ChannelState>,
    wanted: impl Fn(&ChannelState) -> bool,
) -> ChannelState {
    let wait = async move {
        loop {
            let current = *states.borrow_and_update();
            if wanted(&current) {
                return current;
            }
            if states.changed().await.is_err() {
                let last = *states.borrow();
                assert!(wanted(&last), "channel stopped in state {:?}", last);
                return last;
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_gives_up_after_three_reconnects() {
    let mut connections = Vec::new();
    let mut remotes = Vec::new();
    for _ in 0..4 {
        let (connection, remote) = connection_pair();
        connections.push(connection);
        remotes.push(remote);
    }
    // Every connection closes right after it opens.
    drop(remotes);

    let session = MockSession::with_connections(connections);
    let channel = EventChannel::start(session.clone(), config(Duration::ZERO), EventBus::new());

    wait_for_state(channel.state_changes(), |s| *s == ChannelState::GivenUp).await;
    assert_eq!(session.attempts(), 4);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(session.attempts(), 4);
    assert_eq!(channel.state(), ChannelState::GivenUp);
}

#[tokio::test]
async fn test_failed_connects_count_against_retries() {
    let (connection, remote) = connection_pair();
    drop(remote);

    let session = MockSession::with_connections(vec![connection]);
    let channel = EventChannel::start(session.clone(), config(Duration::ZERO), EventBus::new());

    wait_for_state(channel.state_changes(), |s| *s == ChannelState::GivenUp).await;
    assert_eq!(session.attempts(), 4);
}

#[tokio::test]
async fn test_no_remote_without_session_id() {
    let session = MockSession::with_connections(vec![]);
    let config = RemoteConfig::new("ws://remote.test/sessions");
    let channel = EventChannel::start(session.clone(), config, EventBus::new());

    assert_eq!(channel.state(), ChannelState::NoRemote);
    assert!(channel.state().is_terminal());
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(session.attempts(), 0);
}

#[tokio::test]
async fn test_forwards_local_events() {
    let (connection, mut remote) = connection_pair();
    let session = MockSession::with_connections(vec![connection]);
    let bus = EventBus::new();
    let channel = EventChannel::start(session, config(Duration::ZERO), bus.clone());

    wait_for_state(channel.state_changes(), |s| *s == ChannelState::Connected).await;
    bus.emit(EventName::TaskComplete, json!({ "key": "build.api" }));

    let message = remote.next_text().await;
    assert_eq!(
        message,
        json!({ "type": "event", "name": "taskComplete", "key": "build.api" })
    );

    channel.shutdown().await;
    assert_eq!(channel.state(), ChannelState::Stopped);
}

#[tokio::test]
async fn test_events_raised_while_disconnected_are_not_replayed() {
    let (first, first_remote) = connection_pair();
    let (second, mut second_remote) = connection_pair();
    let session = MockSession::with_connections(vec![first, second]);
    let bus = EventBus::new();
    let channel = EventChannel::start(session, config(Duration::from_millis(200)), bus.clone());

    wait_for_state(channel.state_changes(), |s| *s == ChannelState::Connected).await;
    drop(first_remote);

    wait_for_state(channel.state_changes(), |s| {
        matches!(s, ChannelState::Retrying { attempt: 1 })
    })
    .await;
    bus.emit(EventName::TaskPending, json!({ "key": "while-disconnected" }));

    wait_for_state(channel.state_changes(), |s| *s == ChannelState::Connected).await;
    bus.emit(EventName::TaskPending, json!({ "key": "after-reconnect" }));

    let message = second_remote.next_text().await;
    assert_eq!(message["key"], "after-reconnect");

    channel.shutdown().await;
}

#[tokio::test]
async fn test_remote_requests_are_raised_locally() {
    let (connection, remote) = connection_pair();
    let session = MockSession::with_connections(vec![connection]);
    let bus = EventBus::new();
    let mut requests = bus.subscribe_to(&[EventName::BuildRequested, EventName::TaskComplete]);
    let channel = EventChannel::start(session, config(Duration::ZERO), bus.clone());

    wait_for_state(channel.state_changes(), |s| *s == ChannelState::Connected).await;
    let send = |text: &str| {
        remote
            .to_client
            .send(Ok(Frame::Text(text.to_string())))
            .unwrap()
    };
    send(r#"{"event": "taskComplete", "key": "spoofed"}"#);
    send("not json");
    send(r#"{"event": "buildRequested", "module": "api"}"#);

    let event = tokio::time::timeout(Duration::from_secs(5), requests.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.name, EventName::BuildRequested);
    assert_eq!(event.payload, json!({ "module": "api" }));

    channel.shutdown().await;
}

#[tokio::test]
async fn test_answers_ping_with_pong() {
    let (connection, mut remote) = connection_pair();
    let session = MockSession::with_connections(vec![connection]);
    let channel = EventChannel::start(session, config(Duration::ZERO), EventBus::new());

    wait_for_state(channel.state_changes(), |s| *s == ChannelState::Connected).await;
    remote.to_client.send(Ok(Frame::Ping(vec![1, 2, 3]))).unwrap();

    let frame = tokio::time::timeout(Duration::from_secs(5), remote.from_client.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(frame, Frame::Pong(vec![1, 2, 3]));

    channel.shutdown().await;
}

#[tokio::test]
async fn test_connection_errors_do_not_reconnect() {
    let (connection, mut remote) = connection_pair();
    let session = MockSession::with_connections(vec![connection]);
    let bus = EventBus::new();
    let channel = EventChannel::start(session.clone(), config(Duration::ZERO), bus.clone());

    wait_for_state(channel.state_changes(), |s| *s == ChannelState::Connected).await;
    remote
        .to_client
        .send(Err(Error::Connection("protocol error".to_string())))
        .unwrap();
    remote.to_client.send(Ok(Frame::Ping(vec![]))).unwrap();

    let frame = tokio::time::timeout(Duration::from_secs(5), remote.from_client.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(frame, Frame::Pong(vec![]));
    assert_eq!(channel.state(), ChannelState::Connected);
    assert_eq!(session.attempts(), 1);

    channel.shutdown().await;
}

#[tokio::test]
async fn test_sends_service_logs() {
    let (connection, mut remote) = connection_pair();
    let session = MockSession::with_connections(vec![connection]);
    let channel = EventChannel::start(session, config(Duration::ZERO), EventBus::new());

    wait_for_state(channel.state_changes(), |s| *s == ChannelState::Connected).await;
    let timestamp = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
    assert!(channel.send_log(LogStreamEntry {
        service_name: "api".to_string(),
        message: "listening on :8080".to_string(),
        timestamp: Some(timestamp),
    }));

    let message = remote.next_text().await;
    assert_eq!(
        message,
        json!({
            "type": "serviceLog",
            "name": "serviceLog",
            "serviceName": "api",
            "message": "listening on :8080",
            "timestamp": 1_700_000_000_123_i64,
        })
    );

    channel.shutdown().await;
}

#[tokio::test]
async fn test_logs_dropped_without_connection() {
    let channel = EventChannel::disabled();
    assert!(!channel.send_log(LogStreamEntry {
        service_name: "api".to_string(),
        message: "hello".to_string(),
        timestamp: None,
    }));
}
