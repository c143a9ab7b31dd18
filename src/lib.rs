//! Rust library for controlling Shelly Gen2+ devices over their local
//! WebSocket RPC API
//!
//! This library provides an async API for connecting to Shelly Plus and Pro
//! devices and keeping a live model of their state. It supports:
//!
//! - Persistent WebSocket connections with keepalive and automatic reconnect
//! - Request/response correlation with per-request timeouts
//! - SHA-256 digest authentication for password-protected devices
//! - Component state (switches, covers, inputs, sensors...) kept in sync from
//!   status pushes, with change notifications
//! - Typed actions for common components and the `Shelly.*` namespace
//! - A device collection fed by pluggable discoverers
//!
//! # Quick Start
//!
//! ```no_run
//! use shelly_gen2::{ClientOptions, Device, DeviceIdentifiers, ModelRegistry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let identifiers = DeviceIdentifiers::new("shellyplus1pm-a8032ab12345", "192.168.1.20");
//!     let options = ClientOptions::default().with_password("secret");
//!
//!     let device = Device::open(&identifiers, &options, &ModelRegistry::builtin()).await?;
//!
//!     if let Some(switch) = device.switch(0) {
//!         let was_on = switch.toggle().await?;
//!         println!("Switch was {}", if was_on { "on" } else { "off" });
//!
//!         // Watch for changes pushed by the device
//!         let mut changes = switch.subscribe();
//!         while let Ok(change) = changes.recv().await {
//!             println!("Change: {:?}", change);
//!             break; // Just show one change
//!         }
//!     }
//!
//!     device.destroy().await;
//!     Ok(())
//! }
//! ```
//!
//! # Raw RPC
//!
//! Methods without a typed wrapper can be called directly:
//!
//! ```no_run
//! use shelly_gen2::{ClientOptions, RpcClient};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RpcClient::for_host("192.168.1.20", &ClientOptions::default());
//!     let result = client.request("KVS.Get", Some(json!({ "key": "mode" }))).await?;
//!     println!("{}", result);
//!     client.destroy().await;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! The library is organized into several layers:
//!
//! - **Collection**: Devices fed by discoverers (`Shellies`)
//! - **Device**: Identity, component table and push routing
//! - **Component**: Schema-driven state model and typed actions
//! - **RPC**: Request correlation, timeouts and digest authentication
//! - **Transport**: WebSocket lifecycle, keepalive and reconnect
//! - **Protocol**: JSON message structures

mod auth;
mod collection;
mod component;
mod config;
mod device;
mod error;
mod models;
mod pending;
mod protocol;
mod rpc;
mod subscription;
mod transport;
mod types;

// Public exports
pub use auth::{digest_response, AuthChallenge, AuthContext};
pub use collection::{CollectionEvent, Discoverer, Shellies, SkipReason, StaticDiscoverer};
pub use component::{
    apply_update, compound, scalar, Change, Characteristic, Component, ComponentEvent,
    ComponentKind, ComponentSignal, Cover, FieldKind, Input, Light, ShellyMethods, Switch, Sys,
    Wifi, WifiNetwork,
};
pub use config::{ClientOptions, ReconnectPolicy};
pub use device::Device;
pub use error::{Result, ShellyError};
pub use models::{ComponentRef, ModelDefinition, ModelRegistry};
pub use protocol::{
    AuthParams, DeviceEvent, EventNotification, Request, Response, RpcErrorObject,
    StatusNotification,
};
pub use rpc::RpcClient;
pub use subscription::EventReceiver;
pub use transport::{ConnectionState, Transport, TransportEvent};
pub use types::{DeviceId, DeviceIdentifiers, DeviceIdentity};
