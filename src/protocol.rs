use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Error code a device uses to request authentication
pub const UNAUTHORIZED_CODE: i64 = 401;

/// Method of a partial status push
pub const NOTIFY_STATUS: &str = "NotifyStatus";
/// Method of a full status push
pub const NOTIFY_FULL_STATUS: &str = "NotifyFullStatus";
/// Method of an event push
pub const NOTIFY_EVENT: &str = "NotifyEvent";

/// RPC request envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    /// Client identifier, filled in by the transport before sending
    pub src: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthParams>,
}

impl Request {
    /// Create a new request with the given id and method
    pub fn new(id: u64, method: impl Into<String>) -> Self {
        Self {
            id,
            src: String::new(),
            method: method.into(),
            params: None,
            auth: None,
        }
    }

    /// Set the request parameters
    pub fn with_params(mut self, params: Option<Value>) -> Self {
        self.params = params;
        self
    }

    /// Attach an authentication block
    pub fn with_auth(mut self, auth: Option<AuthParams>) -> Self {
        self.auth = auth;
        self
    }
}

/// Authentication block attached to requests once a challenge was answered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthParams {
    pub realm: String,
    pub username: String,
    pub nonce: u64,
    pub cnonce: u64,
    pub response: String,
    pub algorithm: String,
}

/// RPC response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorObject>,
}

impl Response {
    /// Split the response into its result or the reported error
    pub fn into_result(self) -> crate::Result<Value> {
        match self.error {
            Some(error) => Err(crate::ShellyError::Rpc {
                code: error.code,
                message: error.message,
            }),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// Error object carried by a failed response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

/// Partial or full status push
#[derive(Debug, Clone, PartialEq)]
pub struct StatusNotification {
    /// Whether this is a `NotifyFullStatus`
    pub full: bool,
    /// Device timestamp, in seconds
    pub ts: Option<f64>,
    /// Component key to (partial) status object
    pub components: Map<String, Value>,
}

/// Batch of discrete events pushed by a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventNotification {
    #[serde(default)]
    pub ts: Option<f64>,
    #[serde(default)]
    pub events: Vec<DeviceEvent>,
}

/// A discrete event raised by one component.
///
/// Everything beyond the core set is kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceEvent {
    /// Component key, e.g. `"input:0"`
    pub component: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    /// Event name, e.g. `"single_push"`
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DeviceEvent {
    /// Key of the component this event belongs to.
    ///
    /// Devices usually send `input:0`; when only the type is given the
    /// instance id is appended.
    pub fn component_key(&self) -> String {
        match self.id {
            Some(id) if !self.component.contains(':') => format!("{}:{}", self.component, id),
            _ => self.component.clone(),
        }
    }

    /// Look up an extra field
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }
}

/// Classified inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Response(Response),
    Status(StatusNotification),
    Event(EventNotification),
    /// Valid JSON of a shape we do not handle
    Ignored,
}

/// Loose frame shape used for classification
#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

impl Inbound {
    /// Parse and classify a text frame
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        let frame: RawFrame = serde_json::from_str(text)?;

        if let Some(method) = frame.method.as_deref() {
            return Ok(match method {
                NOTIFY_STATUS | NOTIFY_FULL_STATUS => {
                    let mut components = match frame.params {
                        Some(Value::Object(map)) => map,
                        _ => Map::new(),
                    };
                    let ts = components.remove("ts").and_then(|ts| ts.as_f64());
                    Inbound::Status(StatusNotification {
                        full: method == NOTIFY_FULL_STATUS,
                        ts,
                        components,
                    })
                }
                NOTIFY_EVENT => match frame.params {
                    Some(params) => Inbound::Event(serde_json::from_value(params)?),
                    None => Inbound::Ignored,
                },
                // Requests from the device to us are not part of this protocol
                _ => Inbound::Ignored,
            });
        }

        match frame.id.as_ref().and_then(Value::as_u64) {
            Some(id) => Ok(Inbound::Response(Response {
                id,
                result: frame.result,
                error: frame.error,
            })),
            None => Ok(Inbound::Ignored),
        }
    }
}
