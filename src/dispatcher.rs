//! Command dispatcher: routes one decoded request to its handler.
//!
//! Handlers consult the registry (and through it a device's connection slot)
//! and never touch the TCP layer. The dispatcher always returns an envelope;
//! no failure escapes past its boundary.

use std::sync::Arc;
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use crate::commands::Command;
use crate::device::{DeviceConfig, ProtocolType};
use crate::device_registry::DeviceRegistry;
use crate::driver::WritePoint;
use crate::error::{ErrorBody, GatewayError};
use crate::request::IpcRequest;
use crate::response::{fresh_message_id, IpcResponse};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceRef {
    device_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadPayload {
    device_id: String,
    addresses: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WritePayload {
    device_id: String,
    data_points: Vec<WritePoint>,
}

fn payload<T: DeserializeOwned>(data: Option<&JsonValue>) -> Result<T, GatewayError> {
    let value = data.ok_or_else(|| GatewayError::Parse("missing data payload".into()))?;
    serde_json::from_value(value.clone())
        .map_err(|e| GatewayError::Parse(format!("invalid data payload: {e}")))
}

pub struct Dispatcher {
    registry: Arc<DeviceRegistry>,
    started_at: Instant,
}

impl Dispatcher {
    #[must_use]
    pub fn new(registry: Arc<DeviceRegistry>) -> Self {
        Self {
            registry,
            started_at: Instant::now(),
        }
    }

    /// Execute one request and build its envelope. The response's messageId
    /// equals the request's whenever one was supplied.
    pub async fn dispatch(&self, req: IpcRequest) -> IpcResponse {
        let message_id = req.message_id.clone().unwrap_or_else(fresh_message_id);
        let Ok(command) = req.command.parse::<Command>() else {
            tracing::debug!(command = %req.command, "unrecognized command");
            return IpcResponse::fail(
                message_id,
                Some(req.command.as_str()),
                ErrorBody::from(GatewayError::UnknownCommand(req.command.clone())),
            );
        };
        match self.run(command, req.data.as_ref()).await {
            Ok(data) => IpcResponse::ok(message_id, command.as_str(), data),
            Err(e) => {
                tracing::debug!(command = command.as_str(), error = %e, "command failed");
                IpcResponse::fail(message_id, Some(command.as_str()), ErrorBody::from(e))
            }
        }
    }

    async fn run(
        &self,
        command: Command,
        data: Option<&JsonValue>,
    ) -> Result<JsonValue, GatewayError> {
        match command {
            Command::Ping => Ok(json!({
                "message": "pong",
                "version": env!("CARGO_PKG_VERSION"),
            })),
            Command::Status => self.status().await,
            Command::DeviceList => self.device_list().await,
            Command::AddDevice => self.add_device(data).await,
            Command::RemoveDevice => self.remove_device(data).await,
            Command::DeviceStatus => self.device_status(data).await,
            Command::ConnectDevice => self.connect_device(data).await,
            Command::DisconnectDevice => self.disconnect_device(data).await,
            Command::ReadData => self.read_data(data).await,
            Command::WriteData => self.write_data(data).await,
        }
    }

    async fn status(&self) -> Result<JsonValue, GatewayError> {
        Ok(json!({
            "uptimeSecs": self.started_at.elapsed().as_secs(),
            "version": env!("CARGO_PKG_VERSION"),
            "deviceCount": self.registry.count().await,
            "connectedCount": self.registry.connected_count().await,
        }))
    }

    async fn device_list(&self) -> Result<JsonValue, GatewayError> {
        let devices = self.registry.list().await;
        let protocols: Vec<&str> = ProtocolType::ALL.iter().map(ProtocolType::as_str).collect();
        Ok(json!({
            "devices": devices,
            "supportedProtocols": protocols,
        }))
    }

    async fn add_device(&self, data: Option<&JsonValue>) -> Result<JsonValue, GatewayError> {
        let config: DeviceConfig = payload(data)?;
        config.validate()?;
        let device_id = config.device_id.clone();
        self.registry.add(config).await?;
        Ok(json!({ "deviceId": device_id }))
    }

    async fn remove_device(&self, data: Option<&JsonValue>) -> Result<JsonValue, GatewayError> {
        let DeviceRef { device_id } = payload(data)?;
        self.registry.remove(&device_id).await?;
        Ok(json!({ "deviceId": device_id, "removed": true }))
    }

    async fn device_status(&self, data: Option<&JsonValue>) -> Result<JsonValue, GatewayError> {
        let DeviceRef { device_id } = payload(data)?;
        let slot = self.registry.slot(&device_id).await?;
        let snapshot = slot.snapshot().await;
        let mut value = serde_json::to_value(&snapshot)
            .map_err(|e| GatewayError::Parse(format!("serialize status: {e}")))?;
        if let Some(obj) = value.as_object_mut() {
            obj.insert("deviceId".into(), JsonValue::from(device_id));
        }
        Ok(value)
    }

    async fn connect_device(&self, data: Option<&JsonValue>) -> Result<JsonValue, GatewayError> {
        let DeviceRef { device_id } = payload(data)?;
        let config = self.registry.get(&device_id).await?;
        if !config.enabled {
            return Err(GatewayError::Driver {
                device_id,
                message: "device is disabled".into(),
            });
        }
        let slot = self.registry.slot(&device_id).await?;
        let state = slot.connect(&config).await?;
        Ok(json!({ "deviceId": device_id, "state": state }))
    }

    async fn disconnect_device(&self, data: Option<&JsonValue>) -> Result<JsonValue, GatewayError> {
        let DeviceRef { device_id } = payload(data)?;
        let slot = self.registry.slot(&device_id).await?;
        slot.disconnect().await;
        Ok(json!({ "deviceId": device_id, "state": "Disconnected" }))
    }

    async fn read_data(&self, data: Option<&JsonValue>) -> Result<JsonValue, GatewayError> {
        let ReadPayload {
            device_id,
            addresses,
        } = payload(data)?;
        let slot = self.registry.slot(&device_id).await?;
        let results = slot.read(&addresses).await?;
        Ok(json!({ "deviceId": device_id, "results": results }))
    }

    async fn write_data(&self, data: Option<&JsonValue>) -> Result<JsonValue, GatewayError> {
        let WritePayload {
            device_id,
            data_points,
        } = payload(data)?;
        let slot = self.registry.slot(&device_id).await?;
        let results = slot.write(&data_points).await?;
        Ok(json!({ "deviceId": device_id, "results": results }))
    }
}
