//! # QoE Agent
//!
//! Embeddable playback quality-of-experience telemetry agent.
//!
//! A host player integration drives a [`Tracker`]; the tracker feeds a
//! per-player state machine whose monitors derive view metrics (startup
//! time, rebuffering, seeking, scaling, throughput, watch time). Trackable
//! events are stamped with player, view and environment data, delta-encoded
//! and shipped in batches to the collector by a [`DeliveryEngine`], with
//! backoff on failure and server-driven cadence.
//!
//! ## Features
//!
//! - Depth-first monitor pipeline with feedback events
//! - Long-idle detection that rolls over to a new view
//! - Bounded delivery queue with overflow marking and requeue on failure
//! - Pluggable [`Transport`], with a `reqwest` implementation
//!
//! ## License
//!
//! MIT License
//!
//! ## Authors
//!
//! - hua0512
//!

pub mod bus;
pub mod clock;
pub mod config;
pub mod delivery;
pub mod error;
pub mod host;
pub mod logging;
pub mod monitor;
pub mod player;
pub mod registry;
pub mod session;
pub mod tracker;
pub mod transport;
pub mod view;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AgentConfig, PlayerOptions};
pub use delivery::{DeliveryEngine, DeliveryStats};
pub use error::{Error, Result};
pub use host::{DeviceDescriptor, PlayerSnapshot, PlayerStateProvider, SharedPlayerState, VideoSource};
pub use registry::{EventObserver, Registry, RegistryBuilder};
pub use tracker::{CustomerData, Presentation, Tracker};
pub use transport::{BeaconRequest, BeaconResponse, HttpTransport, MemoryTransport, Transport};

pub use playback_model;
