//! Agent configuration.
//!
//! Every section deserializes with defaults so a partial TOML or JSON document
//! (or none at all) yields a working agent. `from_env` applies `QOE_*`
//! overrides on top of the defaults.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Domain used when neither a beacon domain nor a collection domain is set.
pub const DEFAULT_BEACON_DOMAIN: &str = ".metrix.ws";

/// Response header carrying the collector's preferred flush interval.
pub const DEFAULT_CADENCE_HEADER: &str = "x-litix-io-beacon-flush-ms";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub beacon: BeaconConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub transport: TransportConfig,
}

impl AgentConfig {
    /// Parses and validates a JSON document.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `QOE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(domain) = std::env::var("QOE_BEACON_DOMAIN") {
            config.beacon.domain = Some(domain);
        }
        if let Ok(domain) = std::env::var("QOE_BEACON_COLLECTION_DOMAIN") {
            config.beacon.collection_domain = Some(domain);
        }
        if let Ok(flag) = std::env::var("QOE_LONG_DISPATCH") {
            config.beacon.long_dispatch = parse_env("QOE_LONG_DISPATCH", &flag)?;
        }
        if let Ok(capacity) = std::env::var("QOE_QUEUE_CAPACITY") {
            config.delivery.queue_capacity = parse_env("QOE_QUEUE_CAPACITY", &capacity)?;
        }
        if let Ok(scheme) = std::env::var("QOE_TRANSPORT_SCHEME") {
            config.transport.scheme = scheme;
        }
        if let Ok(timeout) = std::env::var("QOE_TRANSPORT_TIMEOUT_SECS") {
            config.transport.timeout_secs = parse_env("QOE_TRANSPORT_TIMEOUT_SECS", &timeout)?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.delivery.queue_capacity == 0 {
            return Err(Error::config("delivery.queue_capacity must be positive"));
        }
        if self.delivery.tick_interval_ms == 0 {
            return Err(Error::config("delivery.tick_interval_ms must be positive"));
        }
        if self.delivery.min_cadence_ms > self.delivery.max_cadence_ms {
            return Err(Error::config(
                "delivery.min_cadence_ms must not exceed delivery.max_cadence_ms",
            ));
        }
        if self.delivery.min_batch_size > self.delivery.max_batch_size {
            return Err(Error::config(
                "delivery.min_batch_size must not exceed delivery.max_batch_size",
            ));
        }
        if !matches!(self.transport.scheme.as_str(), "http" | "https") {
            return Err(Error::config(format!(
                "unsupported transport scheme '{}'",
                self.transport.scheme
            )));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| Error::config(format!("{name}: {e}")))
}

/// Where beacons go.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BeaconConfig {
    /// Base domain; a leading `.` is added when missing.
    #[serde(default)]
    pub domain: Option<String>,
    /// Full collection domain, used verbatim and preferred over `domain`.
    #[serde(default)]
    pub collection_domain: Option<String>,
    /// Selects the long dispatch tier (30 s / 600 events).
    #[serde(default)]
    pub long_dispatch: bool,
}

impl BeaconConfig {
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Effective beacon domain: collection domain, then dotted domain, then the default.
    pub fn resolved_domain(&self) -> String {
        if let Some(collection) = self.collection_domain.as_deref().filter(|d| !d.is_empty()) {
            return collection.to_string();
        }
        match self.domain.as_deref().filter(|d| !d.is_empty()) {
            Some(domain) if domain.starts_with('.') => domain.to_string(),
            Some(domain) => format!(".{domain}"),
            None => DEFAULT_BEACON_DOMAIN.to_string(),
        }
    }
}

/// Delivery engine tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_standard_tier")]
    pub standard: DispatchTier,
    #[serde(default = "default_long_tier")]
    pub long: DispatchTier,
    #[serde(default = "default_min_cadence_ms")]
    pub min_cadence_ms: u64,
    #[serde(default = "default_max_cadence_ms")]
    pub max_cadence_ms: u64,
    #[serde(default = "default_min_batch_size")]
    pub min_batch_size: usize,
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    /// Events allowed per second of server-driven cadence.
    #[serde(default = "default_events_per_second")]
    pub events_per_second: usize,
    /// Past this gap since the previous event, the next one is sent in full.
    #[serde(default = "default_delta_staleness_ms")]
    pub delta_staleness_ms: u64,
    #[serde(default = "default_cadence_header")]
    pub cadence_header: String,
}

/// Flush interval and batch size pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchTier {
    pub interval_ms: u64,
    pub batch_size: usize,
}

fn default_queue_capacity() -> usize {
    3600
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_standard_tier() -> DispatchTier {
    DispatchTier {
        interval_ms: 10_000,
        batch_size: 300,
    }
}

fn default_long_tier() -> DispatchTier {
    DispatchTier {
        interval_ms: 30_000,
        batch_size: 600,
    }
}

fn default_min_cadence_ms() -> u64 {
    10_000
}

fn default_max_cadence_ms() -> u64 {
    60_000
}

fn default_min_batch_size() -> usize {
    300
}

fn default_max_batch_size() -> usize {
    1000
}

fn default_events_per_second() -> usize {
    30
}

fn default_delta_staleness_ms() -> u64 {
    10 * 60 * 1000
}

fn default_cadence_header() -> String {
    DEFAULT_CADENCE_HEADER.to_string()
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            tick_interval_ms: default_tick_interval_ms(),
            standard: default_standard_tier(),
            long: default_long_tier(),
            min_cadence_ms: default_min_cadence_ms(),
            max_cadence_ms: default_max_cadence_ms(),
            min_batch_size: default_min_batch_size(),
            max_batch_size: default_max_batch_size(),
            events_per_second: default_events_per_second(),
            delta_staleness_ms: default_delta_staleness_ms(),
            cadence_header: default_cadence_header(),
        }
    }
}

impl DeliveryConfig {
    pub fn tier(&self, long_dispatch: bool) -> DispatchTier {
        if long_dispatch { self.long } else { self.standard }
    }
}

/// Timing thresholds used by the session window and the monitors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Sliding session expiry.
    #[serde(default = "default_session_timeout_ms")]
    pub session_timeout_ms: i64,
    /// Idle gap after which the next event starts a new view.
    #[serde(default = "default_resume_threshold_ms")]
    pub resume_threshold_ms: i64,
    #[serde(default = "default_pulse_interval_ms")]
    pub pulse_interval_ms: i64,
    /// Largest playhead advance counted as continuous playback.
    #[serde(default = "default_playhead_jump_limit_ms")]
    pub playhead_jump_limit_ms: i64,
    /// Host player polling period.
    #[serde(default = "default_sampling_interval_ms")]
    pub sampling_interval_ms: u64,
}

fn default_session_timeout_ms() -> i64 {
    25 * 60 * 1000
}

fn default_resume_threshold_ms() -> i64 {
    60 * 60 * 1000
}

fn default_pulse_interval_ms() -> i64 {
    10_000
}

fn default_playhead_jump_limit_ms() -> i64 {
    1000
}

fn default_sampling_interval_ms() -> u64 {
    100
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            session_timeout_ms: default_session_timeout_ms(),
            resume_threshold_ms: default_resume_threshold_ms(),
            pulse_interval_ms: default_pulse_interval_ms(),
            playhead_jump_limit_ms: default_playhead_jump_limit_ms(),
            sampling_interval_ms: default_sampling_interval_ms(),
        }
    }
}

/// HTTP transport settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default = "default_transport_timeout")]
    pub timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

fn default_scheme() -> String {
    "https".to_string()
}

fn default_transport_timeout() -> u64 {
    10
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            timeout_secs: default_transport_timeout(),
            user_agent: None,
        }
    }
}

/// Per-player overrides of the beacon settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerOptions {
    pub beacon_domain: Option<String>,
    pub beacon_collection_domain: Option<String>,
    pub long_dispatch: Option<bool>,
}

impl PlayerOptions {
    /// Beacon settings for this player, falling back to `defaults`.
    pub fn beacon(&self, defaults: &BeaconConfig) -> BeaconConfig {
        BeaconConfig {
            domain: self.beacon_domain.clone().or_else(|| defaults.domain.clone()),
            collection_domain: self
                .beacon_collection_domain
                .clone()
                .or_else(|| defaults.collection_domain.clone()),
            long_dispatch: self.long_dispatch.unwrap_or(defaults.long_dispatch),
        }
    }
}
