//! fieldgw
//!
//! fieldgw is a device-management and IPC gateway for industrial field
//! devices. An automation platform talks to it over a loopback TCP channel
//! (one JSON document per line) and manages a registry of fieldbus devices
//! (Modbus TCP/RTU, Siemens S7, Omron FINS, Mitsubishi MC) without linking
//! against protocol-specific drivers.
//!
//! Main pieces:
//! - device registry with per-device connection state machines
//! - command dispatcher over a fixed IPC command set
//! - protocol driver adapters behind one capability interface
//! - request/response correlation envelope
//!
//! Wire contract: a client opens a connection, writes one request line and
//! awaits the matching response (by `messageId`) before writing the next.
//! Device state is keyed by deviceId, never by socket.

pub mod commands;
pub mod config;
pub mod connection;
pub mod device;
pub mod device_registry;
pub mod dispatcher;
pub mod driver;
pub mod error;
pub mod gateway;
pub mod request;
pub mod response;

pub use commands::Command;
pub use connection::ConnectionState;
pub use device::{DeviceConfig, ProtocolType};
pub use device_registry::DeviceRegistry;
pub use dispatcher::Dispatcher;
pub use error::GatewayError;
pub use gateway::serve;
