use serde::{Deserialize, Serialize};

/// Device identifier, e.g. `shellyplus1pm-a8032ab12345`
pub type DeviceId = String;

/// What a discoverer knows about a device before connecting to it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentifiers {
    pub device_id: DeviceId,

    /// Host name or address the RPC endpoint is reachable at
    #[serde(default)]
    pub hostname: Option<String>,
}

impl DeviceIdentifiers {
    pub fn new(device_id: impl Into<DeviceId>, hostname: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            hostname: Some(hostname.into()),
        }
    }

    /// Hostname, treating an empty string as absent
    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref().filter(|h| !h.is_empty())
    }
}

/// Immutable device identity, as reported by `Shelly.GetDeviceInfo`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub id: DeviceId,
    pub mac: String,
    pub model: String,

    /// Device generation
    #[serde(rename = "gen")]
    pub generation: u8,

    /// Firmware build id
    pub fw_id: String,

    /// Firmware version
    #[serde(rename = "ver")]
    pub version: String,

    /// Application name, e.g. `Plus1PM`
    pub app: String,

    /// Whether authentication is enabled
    #[serde(rename = "auth_en", default)]
    pub auth_enabled: bool,

    /// User-assigned name
    #[serde(default)]
    pub name: Option<String>,
}
