//! Process-wide event bus with a closed set of event names.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

const EVENT_BUS_CAPACITY: usize = 1024;

/// Every event the process can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventName {
    SessionSettings,
    DeployRequested,
    BuildRequested,
    TestRequested,
    TaskPending,
    TaskComplete,
    TaskError,
    WatchingForChanges,
    ModuleSourcesChanged,
}

impl EventName {
    pub const ALL: [EventName; 9] = [
        EventName::SessionSettings,
        EventName::DeployRequested,
        EventName::BuildRequested,
        EventName::TestRequested,
        EventName::TaskPending,
        EventName::TaskComplete,
        EventName::TaskError,
        EventName::WatchingForChanges,
        EventName::ModuleSourcesChanged,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::SessionSettings => "sessionSettings",
            EventName::DeployRequested => "deployRequested",
            EventName::BuildRequested => "buildRequested",
            EventName::TestRequested => "testRequested",
            EventName::TaskPending => "taskPending",
            EventName::TaskComplete => "taskComplete",
            EventName::TaskError => "taskError",
            EventName::WatchingForChanges => "watchingForChanges",
            EventName::ModuleSourcesChanged => "moduleSourcesChanged",
        }
    }

    /// Names a remote session is allowed to raise in this process.
    pub fn from_remote(name: &str) -> Option<Self> {
        match name {
            "deployRequested" => Some(EventName::DeployRequested),
            "buildRequested" => Some(EventName::BuildRequested),
            "testRequested" => Some(EventName::TestRequested),
            _ => None,
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: EventName,
    pub payload: serde_json::Value,
}

/// Cloneable handle to the process event bus.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self { sender }
    }

    /// Raises an event. Events with no subscriber are discarded.
    pub fn emit(&self, name: EventName, payload: serde_json::Value) {
        tracing::trace!(event = %name, "Emitting event");
        let _ = self.sender.send(Event { name, payload });
    }

    /// Subscribes to every event raised after this call.
    pub fn subscribe(&self) -> EventSubscription {
        self.subscribe_to(&EventName::ALL)
    }

    /// Subscribes to the given event names only.
    pub fn subscribe_to(&self, names: &[EventName]) -> EventSubscription {
        EventSubscription {
            receiver: self.sender.subscribe(),
            names: names.iter().copied().collect(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

pub struct EventSubscription {
    receiver: broadcast::Receiver<Event>,
    names: HashSet<EventName>,
}

impl EventSubscription {
    /// Waits for the next matching event. Returns `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.names.contains(&event.name) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Discards everything queued so far; only later events are received.
    pub fn skip_pending(&mut self) {
        self.receiver = self.receiver.resubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscription_filters_by_name() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe_to(&[EventName::TaskComplete]);

        bus.emit(EventName::TaskPending, serde_json::json!({}));
        bus.emit(EventName::TaskComplete, serde_json::json!({ "key": "build.a" }));

        let event = sub.recv().await.unwrap();
        assert_eq!(event.name, EventName::TaskComplete);
        assert_eq!(event.payload["key"], "build.a");
    }

    #[tokio::test]
    async fn test_skip_pending_drops_queued_events() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();

        bus.emit(EventName::TaskPending, serde_json::json!({ "n": 1 }));
        sub.skip_pending();
        bus.emit(EventName::TaskPending, serde_json::json!({ "n": 2 }));

        let event = sub.recv().await.unwrap();
        assert_eq!(event.payload["n"], 2);
    }

    #[test]
    fn test_only_request_events_accepted_from_remote() {
        assert_eq!(
            EventName::from_remote("buildRequested"),
            Some(EventName::BuildRequested)
        );
        assert_eq!(EventName::from_remote("taskComplete"), None);
        assert_eq!(EventName::from_remote("sessionSettings"), None);
    }
}
