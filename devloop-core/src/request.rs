//! Task requests raised by a remote session.
//!
//! Payloads are camelCase JSON objects:
//! ```json
//! {"moduleName": "backend", "force": true}
//! {"serviceName": "api"}
//! ```

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::events::{Event, EventName};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestPayload {
    module_name: Option<String>,
    service_name: Option<String>,
    #[serde(default)]
    force: bool,
}

/// A single build, deploy or test run asked for by a remote session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskRequest {
    Build { module: String, force: bool },
    Deploy { service: String, force: bool },
    Test { module: String, force: bool },
}

impl TaskRequest {
    pub const EVENTS: [EventName; 3] = [
        EventName::BuildRequested,
        EventName::DeployRequested,
        EventName::TestRequested,
    ];

    /// Builds a request from a `*Requested` event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for other events and for payloads
    /// missing the target name.
    pub fn from_event(event: &Event) -> Result<Self> {
        let payload: RequestPayload = match &event.payload {
            serde_json::Value::Null => RequestPayload::default(),
            other => serde_json::from_value(other.clone())?,
        };
        let missing = |field: &str| {
            Error::Validation(format!("{} event without '{}'", event.name, field))
        };

        match event.name {
            EventName::BuildRequested => Ok(TaskRequest::Build {
                module: payload.module_name.ok_or_else(|| missing("moduleName"))?,
                force: payload.force,
            }),
            EventName::DeployRequested => Ok(TaskRequest::Deploy {
                service: payload.service_name.ok_or_else(|| missing("serviceName"))?,
                force: payload.force,
            }),
            EventName::TestRequested => Ok(TaskRequest::Test {
                module: payload.module_name.ok_or_else(|| missing("moduleName"))?,
                force: payload.force,
            }),
            other => Err(Error::Validation(format!(
                "'{}' is not a task request",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(name: EventName, payload: serde_json::Value) -> Event {
        Event { name, payload }
    }

    #[test]
    fn test_parses_requests() {
        let build = TaskRequest::from_event(&event(
            EventName::BuildRequested,
            json!({ "moduleName": "backend", "force": true }),
        ))
        .unwrap();
        assert_eq!(
            build,
            TaskRequest::Build {
                module: "backend".to_string(),
                force: true
            }
        );

        let deploy = TaskRequest::from_event(&event(
            EventName::DeployRequested,
            json!({ "serviceName": "api" }),
        ))
        .unwrap();
        assert_eq!(
            deploy,
            TaskRequest::Deploy {
                service: "api".to_string(),
                force: false
            }
        );
    }

    #[test]
    fn test_rejects_missing_target() {
        let result = TaskRequest::from_event(&event(
            EventName::TestRequested,
            json!({ "serviceName": "api" }),
        ));
        assert!(matches!(result, Err(Error::Validation(_))));

        let result = TaskRequest::from_event(&event(EventName::DeployRequested, json!(null)));
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_other_events() {
        let result = TaskRequest::from_event(&event(
            EventName::TaskComplete,
            json!({ "moduleName": "backend" }),
        ));
        assert!(result.is_err());
    }
}
