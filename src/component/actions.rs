use super::{Component, ComponentKind};
use crate::error::Result;
use crate::rpc::RpcClient;
use crate::types::DeviceIdentity;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::ops::Deref;
use std::sync::Arc;

macro_rules! component_view {
    ($(#[$meta:meta])* $name:ident, $kind:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name {
            component: Arc<Component>,
        }

        impl $name {
            pub const KIND: ComponentKind = $kind;

            /// Wrap a component; `None` if it is of another kind
            pub fn new(component: Arc<Component>) -> Option<Self> {
                (component.kind() == Self::KIND).then_some(Self { component })
            }

            pub fn component(&self) -> &Arc<Component> {
                &self.component
            }
        }

        impl Deref for $name {
            type Target = Component;

            fn deref(&self) -> &Component {
                &self.component
            }
        }
    };
}

component_view!(
    /// Relay output with optional power metering
    Switch,
    ComponentKind::Switch
);
component_view!(
    /// Roller shutter
    Cover,
    ComponentKind::Cover
);
component_view!(
    /// Dimmable light output
    Light,
    ComponentKind::Light
);
component_view!(
    /// Physical input (button, switch or analog)
    Input,
    ComponentKind::Input
);
component_view!(
    /// Wi-Fi station and access point
    Wifi,
    ComponentKind::Wifi
);
component_view!(
    /// Device system information
    Sys,
    ComponentKind::Sys
);

/// Drop `None` entries so optional arguments are omitted on the wire
fn params(entries: impl IntoIterator<Item = (&'static str, Option<Value>)>) -> Option<Value> {
    let map: Map<String, Value> = entries
        .into_iter()
        .filter_map(|(key, value)| value.map(|value| (key.to_string(), value)))
        .collect();
    Some(Value::Object(map))
}

#[derive(Deserialize)]
struct WasOn {
    was_on: bool,
}

impl Switch {
    pub fn output(&self) -> Option<bool> {
        self.get_as("output")
    }

    /// Active power in watts
    pub fn active_power(&self) -> Option<f64> {
        self.get_as("apower")
    }

    /// Turn the output on or off, optionally flipping back after `toggle_after`
    /// seconds. Returns the previous output state.
    pub async fn set(&self, on: bool, toggle_after: Option<f64>) -> Result<bool> {
        let params = params([
            ("on", Some(json!(on))),
            ("toggle_after", toggle_after.map(|s| json!(s))),
        ]);
        let result: WasOn = serde_json::from_value(self.call("Set", params).await?)?;
        Ok(result.was_on)
    }

    /// Flip the output; returns the previous output state
    pub async fn toggle(&self) -> Result<bool> {
        let result: WasOn = serde_json::from_value(self.call("Toggle", None).await?)?;
        Ok(result.was_on)
    }

    /// Reset energy counters; all counters when `types` is `None`
    pub async fn reset_counters(&self, types: Option<&[&str]>) -> Result<Value> {
        self.call("ResetCounters", params([("type", types.map(|t| json!(t)))]))
            .await
    }
}

impl Cover {
    /// `open`, `closed`, `opening`, `closing`, `stopped` or `calibrating`
    pub fn state(&self) -> Option<String> {
        self.get_as("state")
    }

    /// Position in percent, when calibrated
    pub fn current_position(&self) -> Option<u8> {
        self.get_as("current_pos")
    }

    pub async fn open(&self, duration: Option<f64>) -> Result<Value> {
        self.call("Open", params([("duration", duration.map(|d| json!(d)))]))
            .await
    }

    pub async fn close(&self, duration: Option<f64>) -> Result<Value> {
        self.call("Close", params([("duration", duration.map(|d| json!(d)))]))
            .await
    }

    pub async fn stop(&self) -> Result<Value> {
        self.call("Stop", None).await
    }

    /// Move to an absolute position (0-100)
    pub async fn go_to_position(&self, position: u8) -> Result<Value> {
        self.call("GoToPosition", Some(json!({ "pos": position })))
            .await
    }

    /// Move by a relative offset (-100..100)
    pub async fn move_relative(&self, offset: i8) -> Result<Value> {
        self.call("GoToPosition", Some(json!({ "rel": offset })))
            .await
    }

    pub async fn calibrate(&self) -> Result<Value> {
        self.call("Calibrate", None).await
    }
}

impl Light {
    pub fn output(&self) -> Option<bool> {
        self.get_as("output")
    }

    pub fn brightness(&self) -> Option<u8> {
        self.get_as("brightness")
    }

    /// Change output and/or brightness; unset arguments are left untouched
    pub async fn set(
        &self,
        on: Option<bool>,
        brightness: Option<u8>,
        transition_duration: Option<f64>,
    ) -> Result<Value> {
        let params = params([
            ("on", on.map(|on| json!(on))),
            ("brightness", brightness.map(|b| json!(b))),
            ("transition_duration", transition_duration.map(|d| json!(d))),
        ]);
        self.call("Set", params).await
    }

    pub async fn toggle(&self) -> Result<Value> {
        self.call("Toggle", None).await
    }
}

impl Input {
    pub fn state(&self) -> Option<bool> {
        self.get_as("state")
    }

    /// Emulate a button event, e.g. `single_push`
    pub async fn trigger(&self, event_type: &str) -> Result<Value> {
        self.call("Trigger", Some(json!({ "event_type": event_type })))
            .await
    }
}

/// One access point found by a Wi-Fi scan
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WifiNetwork {
    pub ssid: Option<String>,
    pub bssid: String,
    pub auth: u8,
    pub channel: u16,
    pub rssi: i32,
}

#[derive(Deserialize)]
struct ScanResults {
    results: Vec<WifiNetwork>,
}

impl Wifi {
    pub fn station_ip(&self) -> Option<String> {
        self.get_as("sta_ip")
    }

    pub fn ssid(&self) -> Option<String> {
        self.get_as("ssid")
    }

    pub fn rssi(&self) -> Option<i32> {
        self.get_as("rssi")
    }

    /// Scan for nearby access points. Scans are slow; the device may need
    /// several seconds to answer.
    pub async fn scan(&self) -> Result<Vec<WifiNetwork>> {
        let results: ScanResults = serde_json::from_value(self.call("Scan", None).await?)?;
        Ok(results.results)
    }
}

impl Sys {
    pub fn uptime(&self) -> Option<u64> {
        self.get_as("uptime")
    }

    pub fn restart_required(&self) -> bool {
        self.get_as("restart_required").unwrap_or(false)
    }

    pub fn available_updates(&self) -> Option<Value> {
        self.get("available_updates").filter(|v| !v.is_null())
    }
}

/// Device-wide `Shelly.*` methods
#[derive(Clone)]
pub struct ShellyMethods {
    rpc: RpcClient,
}

#[derive(Deserialize)]
struct MethodList {
    methods: Vec<String>,
}

impl ShellyMethods {
    pub fn new(rpc: RpcClient) -> Self {
        Self { rpc }
    }

    /// Reboot the device, optionally after `delay_ms` milliseconds
    pub async fn reboot(&self, delay_ms: Option<u64>) -> Result<Value> {
        self.rpc
            .request("Shelly.Reboot", params([("delay_ms", delay_ms.map(|d| json!(d)))]))
            .await
    }

    /// Status of every component, keyed by component key
    pub async fn get_status(&self) -> Result<Value> {
        self.rpc.request("Shelly.GetStatus", None).await
    }

    /// Configuration of every component, keyed by component key
    pub async fn get_config(&self) -> Result<Value> {
        self.rpc.request("Shelly.GetConfig", None).await
    }

    pub async fn get_device_info(&self) -> Result<DeviceIdentity> {
        self.rpc.call("Shelly.GetDeviceInfo", None).await
    }

    pub async fn check_for_update(&self) -> Result<Value> {
        self.rpc.request("Shelly.CheckForUpdate", None).await
    }

    /// Start a firmware update from the `stable` or `beta` channel
    pub async fn update(&self, stage: &str) -> Result<Value> {
        self.rpc
            .request("Shelly.Update", Some(json!({ "stage": stage })))
            .await
    }

    pub async fn factory_reset(&self) -> Result<Value> {
        self.rpc.request("Shelly.FactoryReset", None).await
    }

    /// Names of every RPC method the device implements
    pub async fn list_methods(&self) -> Result<Vec<String>> {
        let list: MethodList = self.rpc.call("Shelly.ListMethods", None).await?;
        Ok(list.methods)
    }
}
