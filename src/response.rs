use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::ErrorBody;

// Process-wide sequence for responses to requests that carried no messageId.
static MESSAGE_SEQ: AtomicU64 = AtomicU64::new(1);

/// Generate a fresh correlation id for a request that did not supply one.
#[must_use]
pub fn fresh_message_id() -> String {
    let seq = MESSAGE_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("gw-{seq}")
}

/// Wire timestamp: UTC with millisecond precision, fixed textual format.
#[must_use]
pub fn now_utc_ms() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Outbound IPC response envelope.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IpcResponse {
    pub message_id: String,
    pub timestamp: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    pub data: Option<JsonValue>,
    pub error: Option<ErrorBody>,
}

impl IpcResponse {
    /// Successful envelope carrying a command result payload.
    #[must_use]
    pub fn ok(message_id: String, command: &str, data: JsonValue) -> Self {
        Self {
            message_id,
            timestamp: now_utc_ms(),
            success: true,
            command: Some(command.to_string()),
            data: Some(data),
            error: None,
        }
    }

    /// Failure envelope. `command` is echoed when the request parsed far
    /// enough to name one.
    #[must_use]
    pub fn fail(message_id: String, command: Option<&str>, error: ErrorBody) -> Self {
        Self {
            message_id,
            timestamp: now_utc_ms(),
            success: false,
            command: command.map(str::to_string),
            data: None,
            error: Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;

    #[test]
    fn fresh_ids_are_unique() {
        let a = fresh_message_id();
        let b = fresh_message_id();
        assert_ne!(a, b);
        assert!(a.starts_with("gw-"));
    }

    #[test]
    fn timestamp_has_millisecond_precision() {
        let ts = now_utc_ms();
        // e.g. 2026-08-25T10:15:42.123Z
        assert_eq!(ts.len(), 24);
        assert!(ts.ends_with('Z'));
        assert_eq!(&ts[19..20], ".");
    }

    #[test]
    fn envelope_shape_on_failure() {
        let resp = IpcResponse::fail(
            "m-1".into(),
            Some("read_data"),
            ErrorBody::from(GatewayError::DeviceNotConnected {
                device_id: "d1".into(),
            }),
        );
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(v["messageId"], "m-1");
        assert_eq!(v["success"], false);
        assert_eq!(v["command"], "read_data");
        assert!(v["data"].is_null());
        assert_eq!(v["error"]["kind"], "DeviceNotConnectedError");
        assert_eq!(v["error"]["deviceId"], "d1");
    }
}
