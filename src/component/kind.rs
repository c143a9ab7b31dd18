use super::{compound, scalar, Characteristic};
use crate::protocol::DeviceEvent;
use serde_json::Value;

/// Component types a device can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentKind {
    Sys,
    Wifi,
    Ethernet,
    Cloud,
    Mqtt,
    WebSocket,
    Switch,
    Input,
    Cover,
    Light,
    Temperature,
    Humidity,
    DevicePower,
}

const SYS: &[Characteristic] = &[
    scalar("mac"),
    scalar("restart_required"),
    scalar("time"),
    scalar("unixtime"),
    scalar("uptime"),
    scalar("ram_size"),
    scalar("ram_free"),
    scalar("fs_size"),
    scalar("fs_free"),
    scalar("cfg_rev"),
    scalar("kvs_rev"),
    scalar("schedule_rev"),
    scalar("webhook_rev"),
    compound("available_updates"),
];

const WIFI: &[Characteristic] = &[
    scalar("sta_ip"),
    scalar("status"),
    scalar("ssid"),
    scalar("rssi"),
    scalar("ap_client_count"),
];

const ETHERNET: &[Characteristic] = &[scalar("ip")];

const CONNECTED: &[Characteristic] = &[scalar("connected")];

const SWITCH: &[Characteristic] = &[
    scalar("id"),
    scalar("source"),
    scalar("output"),
    scalar("apower"),
    scalar("voltage"),
    scalar("current"),
    scalar("pf"),
    scalar("freq"),
    compound("aenergy"),
    compound("temperature"),
    scalar("errors"),
];

const INPUT: &[Characteristic] = &[
    scalar("id"),
    scalar("state"),
    scalar("percent"),
    scalar("errors"),
];

const COVER: &[Characteristic] = &[
    scalar("id"),
    scalar("source"),
    scalar("state"),
    scalar("apower"),
    scalar("voltage"),
    scalar("current"),
    scalar("pf"),
    scalar("freq"),
    compound("aenergy"),
    scalar("current_pos"),
    scalar("target_pos"),
    scalar("move_timeout"),
    scalar("move_started_at"),
    scalar("pos_control"),
    scalar("last_direction"),
    compound("temperature"),
    scalar("errors"),
];

const LIGHT: &[Characteristic] = &[
    scalar("id"),
    scalar("source"),
    scalar("output"),
    scalar("brightness"),
    scalar("timer_started_at"),
    scalar("timer_duration"),
];

const TEMPERATURE: &[Characteristic] = &[
    scalar("id"),
    scalar("tC"),
    scalar("tF"),
    scalar("errors"),
];

const HUMIDITY: &[Characteristic] = &[scalar("id"), scalar("rh"), scalar("errors")];

const DEVICE_POWER: &[Characteristic] = &[
    scalar("id"),
    compound("battery"),
    compound("external"),
    scalar("errors"),
];

impl ComponentKind {
    pub const ALL: [ComponentKind; 13] = [
        ComponentKind::Sys,
        ComponentKind::Wifi,
        ComponentKind::Ethernet,
        ComponentKind::Cloud,
        ComponentKind::Mqtt,
        ComponentKind::WebSocket,
        ComponentKind::Switch,
        ComponentKind::Input,
        ComponentKind::Cover,
        ComponentKind::Light,
        ComponentKind::Temperature,
        ComponentKind::Humidity,
        ComponentKind::DevicePower,
    ];

    /// Key prefix used in status payloads
    pub fn prefix(self) -> &'static str {
        match self {
            ComponentKind::Sys => "sys",
            ComponentKind::Wifi => "wifi",
            ComponentKind::Ethernet => "eth",
            ComponentKind::Cloud => "cloud",
            ComponentKind::Mqtt => "mqtt",
            ComponentKind::WebSocket => "ws",
            ComponentKind::Switch => "switch",
            ComponentKind::Input => "input",
            ComponentKind::Cover => "cover",
            ComponentKind::Light => "light",
            ComponentKind::Temperature => "temperature",
            ComponentKind::Humidity => "humidity",
            ComponentKind::DevicePower => "devicepower",
        }
    }

    /// Namespace of the component's RPC methods, e.g. `Switch` in `Switch.Set`
    pub fn rpc_namespace(self) -> &'static str {
        match self {
            ComponentKind::Sys => "Sys",
            ComponentKind::Wifi => "WiFi",
            ComponentKind::Ethernet => "Eth",
            ComponentKind::Cloud => "Cloud",
            ComponentKind::Mqtt => "MQTT",
            ComponentKind::WebSocket => "WS",
            ComponentKind::Switch => "Switch",
            ComponentKind::Input => "Input",
            ComponentKind::Cover => "Cover",
            ComponentKind::Light => "Light",
            ComponentKind::Temperature => "Temperature",
            ComponentKind::Humidity => "Humidity",
            ComponentKind::DevicePower => "DevicePower",
        }
    }

    /// Whether a device may carry several numbered instances
    pub fn is_multi_instance(self) -> bool {
        !matches!(
            self,
            ComponentKind::Sys
                | ComponentKind::Wifi
                | ComponentKind::Ethernet
                | ComponentKind::Cloud
                | ComponentKind::Mqtt
                | ComponentKind::WebSocket
        )
    }

    /// Declared characteristics, in the order changes are reported
    pub fn schema(self) -> &'static [Characteristic] {
        match self {
            ComponentKind::Sys => SYS,
            ComponentKind::Wifi => WIFI,
            ComponentKind::Ethernet => ETHERNET,
            ComponentKind::Cloud | ComponentKind::Mqtt | ComponentKind::WebSocket => CONNECTED,
            ComponentKind::Switch => SWITCH,
            ComponentKind::Input => INPUT,
            ComponentKind::Cover => COVER,
            ComponentKind::Light => LIGHT,
            ComponentKind::Temperature => TEMPERATURE,
            ComponentKind::Humidity => HUMIDITY,
            ComponentKind::DevicePower => DEVICE_POWER,
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.prefix() == prefix)
    }

    /// Status key for an instance, e.g. `switch:1` or `sys`
    pub fn key(self, id: Option<u32>) -> String {
        match id {
            Some(id) => format!("{}:{}", self.prefix(), id),
            None => self.prefix().to_string(),
        }
    }

    /// Split a status key into its kind and instance id.
    ///
    /// Returns `None` for unknown prefixes and for keys whose instance part
    /// does not fit the kind.
    pub fn parse_key(key: &str) -> Option<(Self, Option<u32>)> {
        let (prefix, id) = match key.split_once(':') {
            Some((prefix, id)) => (prefix, Some(id.parse::<u32>().ok()?)),
            None => (key, None),
        };
        let kind = Self::from_prefix(prefix)?;
        (kind.is_multi_instance() == id.is_some()).then_some((kind, id))
    }

    /// Recognize an event this kind of component defines
    pub fn interpret(self, event: &DeviceEvent) -> Option<ComponentSignal> {
        let name = event.event.as_str();
        match self {
            ComponentKind::Input => match name {
                "btn_down" => Some(ComponentSignal::ButtonDown),
                "btn_up" => Some(ComponentSignal::ButtonUp),
                "single_push" => Some(ComponentSignal::SinglePush),
                "double_push" => Some(ComponentSignal::DoublePush),
                "triple_push" => Some(ComponentSignal::TriplePush),
                "long_push" => Some(ComponentSignal::LongPush),
                _ => None,
            },
            ComponentKind::Wifi => {
                let reason = event.field("reason").and_then(Value::as_i64);
                match name {
                    "sta_connect_fail" => Some(ComponentSignal::WifiConnectFailed { reason }),
                    "sta_disconnected" => Some(ComponentSignal::WifiDisconnected { reason }),
                    _ => None,
                }
            }
            ComponentKind::Sys => {
                let message = event
                    .field("msg")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                match name {
                    "ota_begin" => Some(ComponentSignal::OtaBegin { message }),
                    "ota_progress" => Some(ComponentSignal::OtaProgress {
                        percent: event.field("progress_percent").and_then(Value::as_f64),
                        message,
                    }),
                    "ota_success" => Some(ComponentSignal::OtaSuccess { message }),
                    "ota_error" => Some(ComponentSignal::OtaError { message }),
                    "scheduled_restart" => Some(ComponentSignal::ScheduledRestart {
                        time_ms: event.field("time_ms").and_then(Value::as_u64),
                    }),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Domain events raised by specific component types
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentSignal {
    ButtonDown,
    ButtonUp,
    SinglePush,
    DoublePush,
    TriplePush,
    LongPush,
    WifiConnectFailed { reason: Option<i64> },
    WifiDisconnected { reason: Option<i64> },
    OtaBegin { message: Option<String> },
    OtaProgress { percent: Option<f64>, message: Option<String> },
    OtaSuccess { message: Option<String> },
    OtaError { message: Option<String> },
    ScheduledRestart { time_ms: Option<u64> },
}
