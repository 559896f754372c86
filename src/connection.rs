//! Per-device connection lifecycle and command serialization.
//!
//! Each registered device owns one [`DeviceSlot`]. The slot's mutex is the
//! device command lock: overlapping IPC commands for the same device queue in
//! arrival order, while commands for distinct devices run fully in parallel.

use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::device::DeviceConfig;
use crate::driver::{create_driver, DataPointResult, ProtocolDriver, WritePoint};
use crate::error::GatewayError;
use crate::response::now_utc_ms;

/// Connection state of one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionState {
    #[inline]
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check whether a connect attempt may start from this state.
    #[inline]
    #[must_use]
    pub const fn can_connect(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Error)
    }

    const fn as_u8(self) -> u8 {
        match self {
            Self::Disconnected => 0,
            Self::Connecting => 1,
            Self::Connected => 2,
            Self::Error => 3,
        }
    }

    const fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Error,
            _ => Self::Disconnected,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::Error => "Error",
        };
        write!(f, "{s}")
    }
}

/// Point-in-time view of a device connection, as reported by `device_status`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSnapshot {
    pub state: ConnectionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<String>,
}

struct DeviceConnection {
    state: ConnectionState,
    driver: Option<Box<dyn ProtocolDriver>>,
    last_error: Option<String>,
    last_activity: Option<String>,
}

/// Runtime companion of one [`DeviceConfig`]. Holds the exclusive command
/// lock and the driver handle; torn down together with the registry entry.
pub struct DeviceSlot {
    device_id: String,
    inner: Mutex<DeviceConnection>,
    // lock-free mirror of `inner.state` for the global status report
    state_cell: AtomicU8,
}

impl DeviceSlot {
    #[must_use]
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            inner: Mutex::new(DeviceConnection {
                state: ConnectionState::Disconnected,
                driver: None,
                last_error: None,
                last_activity: None,
            }),
            state_cell: AtomicU8::new(ConnectionState::Disconnected.as_u8()),
        }
    }

    /// Current state without taking the command lock. May lag behind an
    /// in-flight transition; use [`Self::snapshot`] for the serialized view.
    #[must_use]
    pub fn state_relaxed(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state_cell.load(Ordering::Relaxed))
    }

    fn set_state(&self, conn: &mut DeviceConnection, state: ConnectionState) {
        conn.state = state;
        self.state_cell.store(state.as_u8(), Ordering::Relaxed);
    }

    /// Serialized view of the connection for `device_status`.
    pub async fn snapshot(&self) -> ConnectionSnapshot {
        let conn = self.inner.lock().await;
        ConnectionSnapshot {
            state: conn.state,
            last_error: conn.last_error.clone(),
            last_activity: conn.last_activity.clone(),
        }
    }

    /// Attempt to bring the device online. A no-op success when already
    /// `Connected`; otherwise transitions through `Connecting` and ends in
    /// `Connected` or `Error`.
    ///
    /// # Errors
    ///
    /// Propagates the adapter's connect failure; the device stays registered
    /// with its state set to `Error`.
    pub async fn connect(&self, config: &DeviceConfig) -> Result<ConnectionState, GatewayError> {
        let mut conn = self.inner.lock().await;
        if conn.state.is_connected() {
            return Ok(ConnectionState::Connected);
        }
        // only Disconnected and Error remain: Connecting is never observable
        // while the command lock is held
        debug_assert!(conn.state.can_connect());
        self.set_state(&mut conn, ConnectionState::Connecting);
        let mut driver = create_driver(config);
        match driver.connect().await {
            Ok(()) => {
                conn.driver = Some(driver);
                conn.last_error = None;
                conn.last_activity = Some(now_utc_ms());
                self.set_state(&mut conn, ConnectionState::Connected);
                tracing::info!(device_id = %self.device_id, "device connected");
                Ok(ConnectionState::Connected)
            }
            Err(e) => {
                conn.driver = None;
                conn.last_error = Some(e.to_string());
                self.set_state(&mut conn, ConnectionState::Error);
                tracing::warn!(device_id = %self.device_id, error = %e, "device connect failed");
                Err(e)
            }
        }
    }

    /// Tear down the driver handle and return to `Disconnected`. Idempotent;
    /// close failures are logged, never surfaced.
    pub async fn disconnect(&self) {
        let mut conn = self.inner.lock().await;
        if let Some(mut driver) = conn.driver.take() {
            if let Err(e) = driver.disconnect().await {
                tracing::warn!(device_id = %self.device_id, error = %e, "driver close failed");
            }
        }
        conn.last_activity = Some(now_utc_ms());
        self.set_state(&mut conn, ConnectionState::Disconnected);
    }

    /// Batch read. Permitted only from `Connected`.
    ///
    /// # Errors
    ///
    /// `DeviceNotConnectedError` when the state gate fails (the driver is
    /// never invoked), otherwise whatever the driver dispatch surfaces.
    pub async fn read(&self, addresses: &[String]) -> Result<Vec<DataPointResult>, GatewayError> {
        let mut conn = self.inner.lock().await;
        let driver = Self::connected_driver(&mut conn, &self.device_id)?;
        let result = driver.read_values(addresses).await;
        Self::record_outcome(&mut conn, &result);
        result
    }

    /// Batch write. Permitted only from `Connected`.
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::read`].
    pub async fn write(&self, points: &[WritePoint]) -> Result<Vec<DataPointResult>, GatewayError> {
        let mut conn = self.inner.lock().await;
        let driver = Self::connected_driver(&mut conn, &self.device_id)?;
        let result = driver.write_values(points).await;
        Self::record_outcome(&mut conn, &result);
        result
    }

    fn connected_driver<'a>(
        conn: &'a mut DeviceConnection,
        device_id: &str,
    ) -> Result<&'a mut Box<dyn ProtocolDriver>, GatewayError> {
        if !conn.state.is_connected() {
            return Err(GatewayError::DeviceNotConnected {
                device_id: device_id.to_string(),
            });
        }
        conn.driver
            .as_mut()
            .ok_or_else(|| GatewayError::DeviceNotConnected {
                device_id: device_id.to_string(),
            })
    }

    fn record_outcome(conn: &mut DeviceConnection, result: &Result<Vec<DataPointResult>, GatewayError>) {
        match result {
            Ok(_) => conn.last_activity = Some(now_utc_ms()),
            Err(e) => conn.last_error = Some(e.to_string()),
        }
    }
}
