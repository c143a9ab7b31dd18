//! Client configuration.
//!
//! [`ClientOptions`] can be built in code or deserialized from any serde
//! format. Durations are expressed in (fractional) seconds on the wire:
//!
//! ```
//! use shelly_gen2::ClientOptions;
//!
//! let options: ClientOptions = serde_json::from_str(
//!     r#"{ "request_timeout": 5, "reconnect_interval": [5, 10, 30], "password": "secret" }"#,
//! ).unwrap();
//! assert_eq!(options.request_timeout.as_secs(), 5);
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_RECONNECT_INTERVALS: [u64; 6] = [5, 10, 30, 60, 5 * 60, 10 * 60];

/// Options shared by every connection a client opens
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    /// Identifier sent as `src` with every request
    pub client_id: String,

    /// Time to wait for a response (and for a pong)
    #[serde(with = "seconds")]
    pub request_timeout: Duration,

    /// Keepalive ping interval; zero disables keepalive
    #[serde(with = "seconds")]
    pub ping_interval: Duration,

    /// Waits before successive reconnect attempts
    pub reconnect_interval: ReconnectPolicy,

    /// Password for devices with authentication enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            client_id: default_client_id(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            ping_interval: DEFAULT_PING_INTERVAL,
            reconnect_interval: ReconnectPolicy::default(),
            password: None,
        }
    }
}

impl ClientOptions {
    /// Set the client identifier
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// Set the request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the keepalive ping interval (zero disables keepalive)
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Set the reconnect policy
    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect_interval = policy;
        self
    }

    /// Set the device password
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

/// A client id unique to this process run
fn default_client_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("shelly-gen2-{}", &id[..8])
}

/// Reconnect backoff schedule.
///
/// Element `n` is the wait before the `n`th consecutive reconnect attempt.
/// Once the schedule is exhausted the last element repeats. A zero element,
/// or an empty schedule, means no attempt is made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    intervals: Vec<Duration>,
}

impl ReconnectPolicy {
    /// Build a policy from an explicit schedule
    pub fn new(intervals: impl IntoIterator<Item = Duration>) -> Self {
        Self {
            intervals: intervals.into_iter().collect(),
        }
    }

    /// The same wait before every attempt
    pub fn fixed(interval: Duration) -> Self {
        Self::new([interval])
    }

    /// Never reconnect
    pub fn disabled() -> Self {
        Self::new([])
    }

    /// The configured schedule
    pub fn intervals(&self) -> &[Duration] {
        &self.intervals
    }

    /// Wait before the given (zero-based) attempt, or `None` when reconnecting is off
    pub fn delay(&self, attempt: usize) -> Option<Duration> {
        let last = self.intervals.len().checked_sub(1)?;
        let delay = self.intervals[attempt.min(last)];
        (!delay.is_zero()).then_some(delay)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RECONNECT_INTERVALS.map(Duration::from_secs))
    }
}

/// Wire shape: a single number or a list of numbers, in seconds
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum IntervalSeconds {
    Single(f64),
    List(Vec<f64>),
}

impl Serialize for ReconnectPolicy {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let secs = self.intervals.iter().map(Duration::as_secs_f64).collect();
        IntervalSeconds::List(secs).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ReconnectPolicy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let secs = match IntervalSeconds::deserialize(deserializer)? {
            IntervalSeconds::Single(secs) => vec![secs],
            IntervalSeconds::List(secs) => secs,
        };
        let intervals = secs
            .into_iter()
            .map(seconds::to_duration)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self::new(intervals))
    }
}

/// serde helpers for durations written as seconds
mod seconds {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Zero, negative and NaN map to zero; values too large for a `Duration` are rejected
    pub(super) fn to_duration<E: Error>(secs: f64) -> Result<Duration, E> {
        if secs.is_nan() || secs <= 0.0 {
            return Ok(Duration::ZERO);
        }
        Duration::try_from_secs_f64(secs)
            .map_err(|e| E::custom(format!("invalid duration of {} seconds: {}", secs, e)))
    }

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        to_duration(f64::deserialize(deserializer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(list: &[u64]) -> ReconnectPolicy {
        ReconnectPolicy::new(list.iter().copied().map(Duration::from_secs))
    }

    #[test]
    fn delay_clamps_at_last_interval() {
        let policy = secs(&[5, 10, 30]);
        assert_eq!(policy.delay(0), Some(Duration::from_secs(5)));
        assert_eq!(policy.delay(1), Some(Duration::from_secs(10)));
        assert_eq!(policy.delay(2), Some(Duration::from_secs(30)));
        assert_eq!(policy.delay(3), Some(Duration::from_secs(30)));
        assert_eq!(policy.delay(100), Some(Duration::from_secs(30)));
    }

    #[test]
    fn zero_or_empty_disables() {
        assert_eq!(secs(&[0]).delay(0), None);
        assert_eq!(ReconnectPolicy::disabled().delay(0), None);

        let policy = secs(&[5, 0]);
        assert_eq!(policy.delay(0), Some(Duration::from_secs(5)));
        assert_eq!(policy.delay(1), None);
        assert_eq!(policy.delay(7), None);
    }

    #[test]
    fn default_options() {
        let options = ClientOptions::default();
        assert!(options.client_id.starts_with("shelly-gen2-"));
        assert_eq!(options.request_timeout, Duration::from_secs(10));
        assert_eq!(options.ping_interval, Duration::from_secs(60));
        assert_eq!(options.reconnect_interval.delay(0), Some(Duration::from_secs(5)));
        assert_eq!(options.reconnect_interval.delay(9), Some(Duration::from_secs(600)));
        assert!(options.password.is_none());
    }

    #[test]
    fn client_ids_differ_between_instances() {
        assert_ne!(ClientOptions::default().client_id, ClientOptions::default().client_id);
    }

    #[test]
    fn reconnect_interval_accepts_number_or_list() {
        let single: ClientOptions =
            serde_json::from_str(r#"{ "reconnect_interval": 15 }"#).unwrap();
        assert_eq!(single.reconnect_interval, secs(&[15]));

        let list: ClientOptions =
            serde_json::from_str(r#"{ "reconnect_interval": [1, 2.5] }"#).unwrap();
        assert_eq!(
            list.reconnect_interval.intervals(),
            &[Duration::from_secs(1), Duration::from_millis(2500)]
        );

        let off: ClientOptions = serde_json::from_str(r#"{ "reconnect_interval": 0 }"#).unwrap();
        assert_eq!(off.reconnect_interval.delay(0), None);
    }

    #[test]
    fn fractional_seconds_and_defaults_mix() {
        let options: ClientOptions =
            serde_json::from_str(r#"{ "client_id": "tester", "ping_interval": 0, "request_timeout": 0.5 }"#)
                .unwrap();
        assert_eq!(options.client_id, "tester");
        assert!(options.ping_interval.is_zero());
        assert_eq!(options.request_timeout, Duration::from_millis(500));
        assert_eq!(options.reconnect_interval, ReconnectPolicy::default());
    }

    #[test]
    fn oversized_durations_are_rejected() {
        let error = serde_json::from_str::<ClientOptions>(r#"{ "request_timeout": 1e30 }"#)
            .unwrap_err();
        assert!(error.to_string().contains("invalid duration"));

        assert!(serde_json::from_str::<ClientOptions>(r#"{ "reconnect_interval": [5, 1e30] }"#).is_err());

        // Long but representable
        let options: ClientOptions =
            serde_json::from_str(r#"{ "request_timeout": 1e12 }"#).unwrap();
        assert_eq!(options.request_timeout, Duration::from_secs(1_000_000_000_000));
    }

    #[test]
    fn negative_durations_mean_zero() {
        let options: ClientOptions =
            serde_json::from_str(r#"{ "ping_interval": -3, "reconnect_interval": -1 }"#).unwrap();
        assert!(options.ping_interval.is_zero());
        assert_eq!(options.reconnect_interval.delay(0), None);
    }
}
