//! Protocol driver adapter layer.
//!
//! Normalizes the heterogeneous fieldbus drivers behind one capability
//! interface: connect, disconnect, batch read, batch write. The byte-level
//! protocol exchange is owned by the external driver libraries; the adapters
//! here own transport setup (TCP connect with timeout for the network
//! protocols, serial parameter handling for RTU), per-protocol address
//! syntax, and the partial-failure batch contract. Data is served from a
//! per-connection register image so one bad address never aborts a batch.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::net::TcpStream;
use tokio::time::timeout as tokio_timeout;

use crate::device::{DeviceConfig, ProtocolType};
use crate::error::GatewayError;

/// Per-address outcome of a batch read or write.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPointResult {
    pub address: String,
    pub success: bool,
    pub value: Option<JsonValue>,
    pub error: Option<String>,
}

impl DataPointResult {
    #[must_use]
    pub fn ok(address: impl Into<String>, value: JsonValue) -> Self {
        Self {
            address: address.into(),
            success: true,
            value: Some(value),
            error: None,
        }
    }

    #[must_use]
    pub fn fail(address: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            success: false,
            value: None,
            error: Some(error.into()),
        }
    }
}

/// One address/value pair of a batch write.
#[derive(Debug, Clone, Deserialize)]
pub struct WritePoint {
    pub address: String,
    #[serde(default)]
    pub value: JsonValue,
}

/// Capability interface implemented by every protocol adapter.
///
/// `read_values`/`write_values` succeed when dispatch itself succeeds; each
/// address carries its own success/error/value.
#[async_trait]
pub trait ProtocolDriver: Send {
    async fn connect(&mut self) -> Result<(), GatewayError>;
    async fn disconnect(&mut self) -> Result<(), GatewayError>;
    async fn read_values(&mut self, addresses: &[String])
        -> Result<Vec<DataPointResult>, GatewayError>;
    async fn write_values(&mut self, points: &[WritePoint])
        -> Result<Vec<DataPointResult>, GatewayError>;
}

/// Build the concrete adapter variant for a device's protocol type.
#[must_use]
pub fn create_driver(config: &DeviceConfig) -> Box<dyn ProtocolDriver> {
    match config.protocol_type {
        ProtocolType::ModbusTcp => Box::new(ModbusTcpDriver::new(config)),
        ProtocolType::ModbusRtu => Box::new(ModbusRtuDriver::new(config)),
        ProtocolType::SiemensS7 => Box::new(SiemensS7Driver::new(config)),
        ProtocolType::OmronFins => Box::new(OmronFinsDriver::new(config)),
        ProtocolType::MitsubishiMc => Box::new(MitsubishiMcDriver::new(config)),
    }
}

// ---------------------------------------------------------------------------
// shared pieces
// ---------------------------------------------------------------------------

/// TCP link shared by the network-protocol adapters.
struct NetLink {
    device_id: String,
    host: String,
    port: u16,
    timeout_ms: u64,
    stream: Option<TcpStream>,
}

impl NetLink {
    fn new(config: &DeviceConfig) -> Self {
        let params = &config.connection_params;
        Self {
            device_id: config.device_id.clone(),
            host: params.host.clone().unwrap_or_default(),
            port: params.port.unwrap_or(config.protocol_type.default_port()),
            timeout_ms: params.effective_timeout_ms(),
            stream: None,
        }
    }

    async fn open(&mut self) -> Result<(), GatewayError> {
        if self.stream.is_some() {
            return Ok(());
        }
        let addr = format!("{host}:{port}", host = self.host, port = self.port);
        let dur = Duration::from_millis(self.timeout_ms);
        match tokio_timeout(dur, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => {
                self.stream = Some(stream);
                Ok(())
            }
            Ok(Err(e)) => Err(GatewayError::Driver {
                device_id: self.device_id.clone(),
                message: format!("connect to {addr} failed: {e}"),
            }),
            Err(_) => Err(GatewayError::ConnectionTimeout {
                device_id: self.device_id.clone(),
                timeout_ms: self.timeout_ms,
            }),
        }
    }

    async fn close(&mut self) -> Result<(), GatewayError> {
        if let Some(mut stream) = self.stream.take() {
            use tokio::io::AsyncWriteExt;
            stream
                .shutdown()
                .await
                .map_err(|e| GatewayError::Driver {
                    device_id: self.device_id.clone(),
                    message: format!("close failed: {e}"),
                })?;
        }
        Ok(())
    }

    const fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}

/// Register image backing reads and writes for one live connection.
///
/// Unwritten addresses read back as 0, matching a freshly powered register
/// area.
#[derive(Default)]
struct RegisterBank {
    cells: HashMap<String, JsonValue>,
}

type AddressParser = fn(&str) -> Result<String, String>;

impl RegisterBank {
    fn read_batch(&self, parse: AddressParser, addresses: &[String]) -> Vec<DataPointResult> {
        addresses
            .iter()
            .map(|addr| match parse(addr) {
                Ok(key) => {
                    let value = self
                        .cells
                        .get(&key)
                        .cloned()
                        .unwrap_or(JsonValue::from(0));
                    DataPointResult::ok(addr.clone(), value)
                }
                Err(e) => DataPointResult::fail(addr.clone(), e),
            })
            .collect()
    }

    fn write_batch(&mut self, parse: AddressParser, points: &[WritePoint]) -> Vec<DataPointResult> {
        points
            .iter()
            .map(|point| match parse(&point.address) {
                Ok(key) => {
                    if point.value.is_number() || point.value.is_boolean() {
                        self.cells.insert(key, point.value.clone());
                        DataPointResult::ok(point.address.clone(), point.value.clone())
                    } else {
                        DataPointResult::fail(
                            point.address.clone(),
                            "unsupported value type: expected number or bool",
                        )
                    }
                }
                Err(e) => DataPointResult::fail(point.address.clone(), e),
            })
            .collect()
    }
}

fn not_connected(device_id: &str) -> GatewayError {
    GatewayError::Driver {
        device_id: device_id.to_string(),
        message: "driver is not connected".into(),
    }
}

// ---------------------------------------------------------------------------
// address syntax per protocol
// ---------------------------------------------------------------------------

/// Modbus register address: plain decimal 0..=65535.
fn parse_modbus_address(addr: &str) -> Result<String, String> {
    let trimmed = addr.trim();
    match trimmed.parse::<u32>() {
        Ok(n) if n <= 0xFFFF => Ok(n.to_string()),
        Ok(n) => Err(format!("modbus register out of range: {n}")),
        Err(_) => Err(format!("invalid modbus register address: {addr}")),
    }
}

/// S7 data-block address: `DB<n>.DBX|DBW|DBD<offset>`, e.g. `DB1.DBW20`.
fn parse_s7_address(addr: &str) -> Result<String, String> {
    let up = addr.trim().to_ascii_uppercase();
    let rest = up
        .strip_prefix("DB")
        .ok_or_else(|| format!("invalid S7 address: {addr} (expected DBn.DBWn form)"))?;
    let (db, field) = rest
        .split_once('.')
        .ok_or_else(|| format!("invalid S7 address: {addr} (expected DBn.DBWn form)"))?;
    if db.is_empty() || !db.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("invalid S7 data block number in: {addr}"));
    }
    let offset = field
        .strip_prefix("DBX")
        .or_else(|| field.strip_prefix("DBW"))
        .or_else(|| field.strip_prefix("DBD"))
        .ok_or_else(|| format!("invalid S7 field in: {addr} (expected DBX/DBW/DBD)"))?;
    if offset.is_empty() || !offset.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return Err(format!("invalid S7 offset in: {addr}"));
    }
    Ok(up)
}

/// FINS memory-area address: area letter (D/W/H/A/E) plus decimal word offset.
fn parse_fins_address(addr: &str) -> Result<String, String> {
    let up = addr.trim().to_ascii_uppercase();
    let mut chars = up.chars();
    let area = chars.next().ok_or_else(|| "empty FINS address".to_string())?;
    if !matches!(area, 'D' | 'W' | 'H' | 'A' | 'E') {
        return Err(format!("invalid FINS memory area in: {addr}"));
    }
    let rest = chars.as_str();
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("invalid FINS word offset in: {addr}"));
    }
    Ok(up)
}

/// MC device address: device symbol (D/M/X/Y/B/W/R/SD/SM) plus decimal number.
fn parse_mc_address(addr: &str) -> Result<String, String> {
    let up = addr.trim().to_ascii_uppercase();
    // two-letter symbols first so SD/SM are not cut short
    const SYMBOLS: [&str; 9] = ["SD", "SM", "D", "M", "X", "Y", "B", "W", "R"];
    let Some(rest) = SYMBOLS.iter().find_map(|s| up.strip_prefix(s)) else {
        return Err(format!("invalid MC device symbol in: {addr}"));
    };
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("invalid MC device number in: {addr}"));
    }
    Ok(up)
}

// ---------------------------------------------------------------------------
// concrete adapters
// ---------------------------------------------------------------------------

macro_rules! net_driver {
    ($name:ident, $parser:path) => {
        pub struct $name {
            link: NetLink,
            bank: RegisterBank,
        }

        impl $name {
            #[must_use]
            pub fn new(config: &DeviceConfig) -> Self {
                Self {
                    link: NetLink::new(config),
                    bank: RegisterBank::default(),
                }
            }
        }

        #[async_trait]
        impl ProtocolDriver for $name {
            async fn connect(&mut self) -> Result<(), GatewayError> {
                self.link.open().await
            }

            async fn disconnect(&mut self) -> Result<(), GatewayError> {
                self.link.close().await
            }

            async fn read_values(
                &mut self,
                addresses: &[String],
            ) -> Result<Vec<DataPointResult>, GatewayError> {
                if !self.link.is_open() {
                    return Err(not_connected(&self.link.device_id));
                }
                Ok(self.bank.read_batch($parser, addresses))
            }

            async fn write_values(
                &mut self,
                points: &[WritePoint],
            ) -> Result<Vec<DataPointResult>, GatewayError> {
                if !self.link.is_open() {
                    return Err(not_connected(&self.link.device_id));
                }
                Ok(self.bank.write_batch($parser, points))
            }
        }
    };
}

net_driver!(ModbusTcpDriver, parse_modbus_address);
net_driver!(SiemensS7Driver, parse_s7_address);
net_driver!(OmronFinsDriver, parse_fins_address);
net_driver!(MitsubishiMcDriver, parse_mc_address);

/// Modbus RTU adapter. Port open/close is delegated to the external serial
/// driver; this adapter tracks the open state and validates traffic.
pub struct ModbusRtuDriver {
    device_id: String,
    open: bool,
    bank: RegisterBank,
}

impl ModbusRtuDriver {
    #[must_use]
    pub fn new(config: &DeviceConfig) -> Self {
        Self {
            device_id: config.device_id.clone(),
            open: false,
            bank: RegisterBank::default(),
        }
    }
}

#[async_trait]
impl ProtocolDriver for ModbusRtuDriver {
    async fn connect(&mut self) -> Result<(), GatewayError> {
        self.open = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), GatewayError> {
        self.open = false;
        Ok(())
    }

    async fn read_values(
        &mut self,
        addresses: &[String],
    ) -> Result<Vec<DataPointResult>, GatewayError> {
        if !self.open {
            return Err(not_connected(&self.device_id));
        }
        Ok(self.bank.read_batch(parse_modbus_address, addresses))
    }

    async fn write_values(
        &mut self,
        points: &[WritePoint],
    ) -> Result<Vec<DataPointResult>, GatewayError> {
        if !self.open {
            return Err(not_connected(&self.device_id));
        }
        Ok(self.bank.write_batch(parse_modbus_address, points))
    }
}
