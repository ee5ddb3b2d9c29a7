//! JSON messages exchanged with the remote session.
//!
//! Outbound:
//! ```json
//! {"type": "event", "name": "taskComplete", "key": "build.api"}
//! {"type": "serviceLog", "name": "serviceLog", "serviceName": "api", "message": "...", "timestamp": 1700000000000}
//! ```
//!
//! Inbound:
//! ```json
//! {"event": "buildRequested", "module": "api"}
//! ```

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::events::{Event, EventName};
use crate::logs::LogStreamEntry;

const SERVICE_LOG: &str = "serviceLog";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ServiceLogMessage<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    name: &'static str,
    message: &'a str,
    service_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<i64>,
}

/// Encodes a local event. Object payloads are flattened into the message;
/// anything else is carried under `payload`.
pub fn encode_event(event: &Event) -> Result<String> {
    let mut message = match &event.payload {
        Value::Object(fields) => fields.clone(),
        Value::Null => Map::new(),
        other => {
            let mut fields = Map::new();
            fields.insert("payload".to_string(), other.clone());
            fields
        }
    };
    message.insert("type".to_string(), Value::from("event"));
    message.insert("name".to_string(), Value::from(event.name.as_str()));
    Ok(serde_json::to_string(&message)?)
}

/// Encodes a service log line with an epoch-milliseconds timestamp.
pub fn encode_log(entry: &LogStreamEntry) -> Result<String> {
    let message = ServiceLogMessage {
        kind: SERVICE_LOG,
        name: SERVICE_LOG,
        message: &entry.message,
        service_name: &entry.service_name,
        timestamp: entry.timestamp.map(|t| t.timestamp_millis()),
    };
    Ok(serde_json::to_string(&message)?)
}

/// Decodes an inbound command into a local event.
///
/// Returns `None` for malformed messages and for any `event` other than a
/// deploy, build or test request.
pub fn decode_inbound(text: &str) -> Option<Event> {
    let Value::Object(mut fields) = serde_json::from_str::<Value>(text).ok()? else {
        return None;
    };
    let name = match fields.remove("event")? {
        Value::String(name) => EventName::from_remote(&name)?,
        _ => return None,
    };
    Some(Event {
        name,
        payload: Value::Object(fields),
    })
}
