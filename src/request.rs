use serde::Deserialize;
use serde_json::Value as JsonValue;

/// Inbound IPC request as decoded from one wire line.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpcRequest {
    #[serde(default)]
    pub message_id: Option<String>,
    pub command: String,
    #[serde(default)]
    pub data: Option<JsonValue>,
    #[serde(default)]
    pub version: String,
}

/// Best-effort extraction of a correlation id from a document that failed to
/// decode as an [`IpcRequest`]. The id is echoed back on the error envelope
/// whenever the document got far enough to carry one.
#[must_use]
pub fn salvage_message_id(raw: &str) -> Option<String> {
    let value: JsonValue = serde_json::from_str(raw).ok()?;
    value
        .get("messageId")
        .and_then(JsonValue::as_str)
        .map(str::to_string)
}
