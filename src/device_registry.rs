//! Thread-safe device registry: deviceId → configuration + connection slot.
//!
//! All mutating operations are mutually exclusive behind a single coarse
//! lock. Device counts are small, so simplicity wins over throughput here;
//! the lock is only ever held for map operations, never across a driver
//! call.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::connection::DeviceSlot;
use crate::device::DeviceConfig;
use crate::error::GatewayError;

struct DeviceEntry {
    config: DeviceConfig,
    slot: Arc<DeviceSlot>,
}

/// Registry of configured devices. Rebuilt empty on every process start.
#[derive(Default)]
pub struct DeviceRegistry {
    devices: Mutex<HashMap<String, DeviceEntry>>,
}

impl DeviceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All configured devices, ordered by deviceId. Pure, never fails.
    pub async fn list(&self) -> Vec<DeviceConfig> {
        let devices = self.devices.lock().await;
        let mut configs: Vec<DeviceConfig> =
            devices.values().map(|e| e.config.clone()).collect();
        configs.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        configs
    }

    pub async fn count(&self) -> usize {
        self.devices.lock().await.len()
    }

    /// Count of devices whose relaxed state reads Connected. Lock-free per
    /// slot, so a hung driver call never stalls the global status report.
    pub async fn connected_count(&self) -> usize {
        let devices = self.devices.lock().await;
        devices
            .values()
            .filter(|e| e.slot.state_relaxed().is_connected())
            .count()
    }

    /// Insert a new device with no connection yet.
    ///
    /// # Errors
    ///
    /// `DuplicateDeviceError` when the deviceId is already registered; the
    /// original config is left untouched.
    pub async fn add(&self, config: DeviceConfig) -> Result<(), GatewayError> {
        let mut devices = self.devices.lock().await;
        if devices.contains_key(&config.device_id) {
            return Err(GatewayError::DuplicateDevice {
                device_id: config.device_id,
            });
        }
        let slot = Arc::new(DeviceSlot::new(config.device_id.clone()));
        tracing::info!(device_id = %config.device_id, protocol = %config.protocol_type, "device added");
        devices.insert(config.device_id.clone(), DeviceEntry { config, slot });
        Ok(())
    }

    /// Remove a device. A live connection is closed best-effort first; the
    /// entry is detached under the lock so the id frees immediately.
    ///
    /// # Errors
    ///
    /// `DeviceNotFoundError` when the id is not registered.
    pub async fn remove(&self, device_id: &str) -> Result<(), GatewayError> {
        let entry = {
            let mut devices = self.devices.lock().await;
            devices
                .remove(device_id)
                .ok_or_else(|| GatewayError::DeviceNotFound {
                    device_id: device_id.to_string(),
                })?
        };
        entry.slot.disconnect().await;
        tracing::info!(device_id, "device removed");
        Ok(())
    }

    /// Configuration of one device.
    ///
    /// # Errors
    ///
    /// `DeviceNotFoundError` when the id is not registered.
    pub async fn get(&self, device_id: &str) -> Result<DeviceConfig, GatewayError> {
        let devices = self.devices.lock().await;
        devices
            .get(device_id)
            .map(|e| e.config.clone())
            .ok_or_else(|| GatewayError::DeviceNotFound {
                device_id: device_id.to_string(),
            })
    }

    /// Connection slot of one device, for executing a serialized command.
    ///
    /// # Errors
    ///
    /// `DeviceNotFoundError` when the id is not registered.
    pub async fn slot(&self, device_id: &str) -> Result<Arc<DeviceSlot>, GatewayError> {
        let devices = self.devices.lock().await;
        devices
            .get(device_id)
            .map(|e| Arc::clone(&e.slot))
            .ok_or_else(|| GatewayError::DeviceNotFound {
                device_id: device_id.to_string(),
            })
    }
}
