//! Component state model.
//!
//! A [`Component`] mirrors one functional unit of a device (a switch, an
//! input, the Wi-Fi radio...). Its observable fields are declared by a static
//! schema of [`Characteristic`]s; server payloads are applied with
//! [`apply_update`], which only touches declared fields and reports the
//! minimal set of changes.

mod actions;
mod kind;

pub use actions::{Cover, Input, Light, ShellyMethods, Switch, Sys, Wifi, WifiNetwork};
pub use kind::{ComponentKind, ComponentSignal};

use crate::error::Result;
use crate::protocol::DeviceEvent;
use crate::rpc::RpcClient;
use crate::subscription::{EventReceiver, EVENT_CHANNEL_CAPACITY};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

/// How a characteristic absorbs updates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Replaced wholesale
    Scalar,
    /// Object merged field by field
    Compound,
}

/// A declared, observable field of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Characteristic {
    pub name: &'static str,
    pub kind: FieldKind,
}

/// Declare a scalar characteristic
pub const fn scalar(name: &'static str) -> Characteristic {
    Characteristic {
        name,
        kind: FieldKind::Scalar,
    }
}

/// Declare a compound (object) characteristic
pub const fn compound(name: &'static str) -> Characteristic {
    Characteristic {
        name,
        kind: FieldKind::Compound,
    }
}

/// One characteristic whose value changed during an update
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub key: &'static str,
    pub value: Value,
}

/// Apply a partial payload to `values`, laid out in `schema` order.
///
/// Keys not declared in the schema are ignored. Returns the changed
/// characteristics in schema order.
pub fn apply_update(schema: &[Characteristic], values: &mut [Value], partial: &Value) -> Vec<Change> {
    let Some(partial) = partial.as_object() else {
        return Vec::new();
    };

    let mut changes = Vec::new();
    for (characteristic, current) in schema.iter().zip(values.iter_mut()) {
        let Some(incoming) = partial.get(characteristic.name) else {
            continue;
        };
        if current == incoming {
            continue;
        }

        let next = match characteristic.kind {
            FieldKind::Scalar => incoming.clone(),
            FieldKind::Compound => merge_compound(current, incoming),
        };
        if *current == next {
            continue;
        }

        *current = next;
        changes.push(Change {
            key: characteristic.name,
            value: current.clone(),
        });
    }
    changes
}

/// Shallow merge of `incoming` into `current`; non-objects replace wholesale
fn merge_compound(current: &Value, incoming: &Value) -> Value {
    match (current, incoming) {
        (Value::Object(current), Value::Object(incoming)) => {
            let mut merged = current.clone();
            for (key, value) in incoming {
                merged.insert(key.clone(), value.clone());
            }
            Value::Object(merged)
        }
        _ => incoming.clone(),
    }
}

/// Notifications emitted by a component
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentEvent {
    /// A characteristic changed
    Change { key: &'static str, value: Value },

    /// The stored configuration was replaced
    ConfigUpdated(Value),

    /// The device reported a configuration change (`config_changed`)
    ConfigChanged {
        revision: Option<u64>,
        restart_required: bool,
    },

    /// A domain event this component type understands
    Signal(ComponentSignal),

    /// An event no recognizer claimed
    Unhandled(DeviceEvent),
}

struct ComponentState {
    values: Vec<Value>,
    config: Option<Value>,
}

/// A functional unit of a device
pub struct Component {
    kind: ComponentKind,
    id: Option<u32>,
    key: String,
    state: Mutex<ComponentState>,
    events: broadcast::Sender<ComponentEvent>,
    rpc: RpcClient,
}

impl Component {
    /// Create a component with every characteristic unset (`null`)
    pub fn new(kind: ComponentKind, id: Option<u32>, rpc: RpcClient) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            kind,
            id,
            key: kind.key(id),
            state: Mutex::new(ComponentState {
                values: vec![Value::Null; kind.schema().len()],
                config: None,
            }),
            events,
            rpc,
        }
    }

    fn state(&self) -> MutexGuard<'_, ComponentState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: ComponentEvent) {
        let _ = self.events.send(event);
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    /// Instance id, for component types that have several instances
    pub fn id(&self) -> Option<u32> {
        self.id
    }

    /// Key used in status payloads, e.g. `switch:0`
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn schema(&self) -> &'static [Characteristic] {
        self.kind.schema()
    }

    /// Current value of a characteristic; `None` if it is not declared
    pub fn get(&self, name: &str) -> Option<Value> {
        let index = self.schema().iter().position(|c| c.name == name)?;
        Some(self.state().values[index].clone())
    }

    /// Current value of a characteristic, deserialized; `None` if unset
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.get(name)
            .filter(|value| !value.is_null())
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// Every characteristic with its current value, in declaration order
    pub fn characteristics(&self) -> Vec<(&'static str, Value)> {
        let state = self.state();
        self.schema()
            .iter()
            .zip(state.values.iter())
            .map(|(c, value)| (c.name, value.clone()))
            .collect()
    }

    /// Last configuration loaded for this component
    pub fn config(&self) -> Option<Value> {
        self.state().config.clone()
    }

    /// Subscribe to this component's notifications
    pub fn subscribe(&self) -> EventReceiver<ComponentEvent> {
        EventReceiver::new(self.events.subscribe())
    }

    /// Apply a (partial) status payload.
    ///
    /// All fields are applied before the first `Change` is emitted.
    pub fn update(&self, partial: &Value) -> Vec<Change> {
        let changes = {
            let mut state = self.state();
            apply_update(self.kind.schema(), &mut state.values, partial)
        };

        if !changes.is_empty() {
            tracing::debug!("{}: {} characteristic(s) changed", self.key, changes.len());
        }
        for change in &changes {
            self.emit(ComponentEvent::Change {
                key: change.key,
                value: change.value.clone(),
            });
        }
        changes
    }

    /// Replace the stored configuration; returns whether it changed
    pub fn update_config(&self, config: &Value) -> bool {
        {
            let mut state = self.state();
            if state.config.as_ref() == Some(config) {
                return false;
            }
            state.config = Some(config.clone());
        }
        self.emit(ComponentEvent::ConfigUpdated(config.clone()));
        true
    }

    /// Dispatch an event raised by this component
    pub fn handle_event(&self, event: &DeviceEvent) {
        let notification = match self.kind.interpret(event) {
            Some(signal) => ComponentEvent::Signal(signal),
            None => base_event(event),
        };
        tracing::debug!("{}: event {}", self.key, event.event);
        self.emit(notification);
    }

    /// Invoke `<Type>.<method>` with this component's instance id
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let method = format!("{}.{}", self.kind.rpc_namespace(), method);
        self.rpc.request(&method, self.with_instance_id(params)).await
    }

    /// Fetch and apply the component status
    pub async fn get_status(&self) -> Result<Value> {
        let status = self.call("GetStatus", None).await?;
        self.update(&status);
        Ok(status)
    }

    /// Fetch and store the component configuration
    pub async fn get_config(&self) -> Result<Value> {
        let config = self.call("GetConfig", None).await?;
        self.update_config(&config);
        Ok(config)
    }

    /// Write (part of) the component configuration
    pub async fn set_config(&self, config: Value) -> Result<Value> {
        self.call("SetConfig", Some(json!({ "config": config }))).await
    }

    fn with_instance_id(&self, params: Option<Value>) -> Option<Value> {
        let Some(id) = self.id else {
            return params;
        };
        let mut params = match params {
            Some(Value::Object(map)) => map,
            None => Map::new(),
            Some(other) => return Some(other),
        };
        params.insert("id".to_string(), json!(id));
        Some(Value::Object(params))
    }
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("key", &self.key)
            .field("characteristics", &self.characteristics())
            .finish()
    }
}

/// Events every component understands
fn base_event(event: &DeviceEvent) -> ComponentEvent {
    match event.event.as_str() {
        "config_changed" => ComponentEvent::ConfigChanged {
            revision: event.field("cfg_rev").and_then(Value::as_u64),
            restart_required: event
                .field("restart_required")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        },
        _ => ComponentEvent::Unhandled(event.clone()),
    }
}
