use serde::{Deserialize, Serialize};

use crate::config::config as global_config;
use crate::error::GatewayError;

/// Fieldbus protocol spoken by a configured device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolType {
    ModbusTcp,
    ModbusRtu,
    SiemensS7,
    OmronFins,
    MitsubishiMc,
}

impl ProtocolType {
    pub const ALL: [Self; 5] = [
        Self::ModbusTcp,
        Self::ModbusRtu,
        Self::SiemensS7,
        Self::OmronFins,
        Self::MitsubishiMc,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ModbusTcp => "ModbusTcp",
            Self::ModbusRtu => "ModbusRtu",
            Self::SiemensS7 => "SiemensS7",
            Self::OmronFins => "OmronFins",
            Self::MitsubishiMc => "MitsubishiMc",
        }
    }

    /// True for protocols carried over a serial line rather than TCP.
    #[must_use]
    pub const fn is_serial(&self) -> bool {
        matches!(self, Self::ModbusRtu)
    }

    /// Conventional TCP port for the protocol, used when connectionParams omit one.
    #[must_use]
    pub const fn default_port(&self) -> u16 {
        match self {
            Self::ModbusTcp | Self::ModbusRtu => 502,
            Self::SiemensS7 => 102,
            Self::OmronFins => 9600,
            Self::MitsubishiMc => 5000,
        }
    }
}

impl std::fmt::Display for ProtocolType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Protocol-specific connection parameters. Network protocols use the
/// host/port/station/timeout fields; Modbus RTU uses the serial fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_port: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baud_rate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_bits: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_bits: Option<u8>,
}

impl ConnectionParams {
    /// Effective adapter timeout for this device.
    #[must_use]
    pub fn effective_timeout_ms(&self) -> u64 {
        self.timeout_ms.unwrap_or(global_config().connect_timeout_ms)
    }

    fn validate_for(&self, protocol: ProtocolType) -> Result<(), GatewayError> {
        if protocol.is_serial() {
            let port = self
                .serial_port
                .as_deref()
                .map(str::trim)
                .unwrap_or_default();
            if port.is_empty() {
                return Err(GatewayError::Parse(
                    "connectionParams.serialPort is required for ModbusRtu".into(),
                ));
            }
            if let Some(p) = self.parity.as_deref() {
                match p.to_ascii_lowercase().as_str() {
                    "none" | "even" | "odd" => {}
                    other => {
                        return Err(GatewayError::Parse(format!(
                            "invalid parity: {other} (expected none/even/odd)"
                        )));
                    }
                }
            }
            if let Some(bits) = self.data_bits {
                if !(7..=8).contains(&bits) {
                    return Err(GatewayError::Parse(format!("invalid dataBits: {bits}")));
                }
            }
            if let Some(bits) = self.stop_bits {
                if !(1..=2).contains(&bits) {
                    return Err(GatewayError::Parse(format!("invalid stopBits: {bits}")));
                }
            }
        } else {
            let host = self.host.as_deref().map(str::trim).unwrap_or_default();
            if host.is_empty() {
                return Err(GatewayError::Parse(format!(
                    "connectionParams.host is required for {protocol}"
                )));
            }
        }
        Ok(())
    }
}

/// One configured field device. `device_id` is the registry key and is
/// immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfig {
    pub device_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub protocol_type: ProtocolType,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub connection_params: ConnectionParams,
}

const fn default_enabled() -> bool {
    true
}

impl DeviceConfig {
    /// Validate field-level constraints before the config enters the registry.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Parse` describing the first offending field.
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.device_id.trim().is_empty() {
            return Err(GatewayError::Parse("deviceId must not be empty".into()));
        }
        self.connection_params.validate_for(self.protocol_type)
    }
}
