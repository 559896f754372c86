use serde::Serialize;
use thiserror::Error;

/// Gateway-level error taxonomy. Every command failure surfaced to an IPC
/// client maps onto exactly one of these kinds.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("malformed request: {0}")]
    Parse(String),

    #[error("device already registered: {device_id}")]
    DuplicateDevice { device_id: String },

    #[error("device not found: {device_id}")]
    DeviceNotFound { device_id: String },

    #[error("device not connected: {device_id}")]
    DeviceNotConnected { device_id: String },

    #[error("connect to {device_id} timed out after {timeout_ms} ms")]
    ConnectionTimeout { device_id: String, timeout_ms: u64 },

    #[error("driver error on {device_id}: {message}")]
    Driver { device_id: String, message: String },

    #[error("unknown command: {0}")]
    UnknownCommand(String),
}

impl GatewayError {
    /// Stable wire identifier for this error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Parse(_) => "ParseError",
            Self::DuplicateDevice { .. } => "DuplicateDeviceError",
            Self::DeviceNotFound { .. } => "DeviceNotFoundError",
            Self::DeviceNotConnected { .. } => "DeviceNotConnectedError",
            Self::ConnectionTimeout { .. } => "ConnectionTimeoutError",
            Self::Driver { .. } => "DriverError",
            Self::UnknownCommand(_) => "UnknownCommandError",
        }
    }

    /// Device the error refers to, when the kind carries one.
    #[must_use]
    pub fn device_id(&self) -> Option<&str> {
        match self {
            Self::DuplicateDevice { device_id }
            | Self::DeviceNotFound { device_id }
            | Self::DeviceNotConnected { device_id }
            | Self::ConnectionTimeout { device_id, .. }
            | Self::Driver { device_id, .. } => Some(device_id),
            Self::Parse(_) | Self::UnknownCommand(_) => None,
        }
    }
}

/// Structured error object placed in the response envelope's `error` field.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
    #[serde(rename = "deviceId", skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

impl From<&GatewayError> for ErrorBody {
    fn from(err: &GatewayError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            device_id: err.device_id().map(str::to_string),
        }
    }
}

impl From<GatewayError> for ErrorBody {
    fn from(err: GatewayError) -> Self {
        Self::from(&err)
    }
}
