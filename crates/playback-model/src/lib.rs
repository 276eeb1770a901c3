//! # Playback Model
//!
//! Data model shared by the playback telemetry agent: a schema-aware
//! attribute bag used for every entity (player, view, video, viewer, ...),
//! the wire key catalog and the event taxonomy that flows through the
//! agent's buses.
//!
//! ## License
//!
//! MIT License
//!
//! ## Authors
//!
//! - hua0512
//!

pub mod bag;
pub mod entities;
pub mod error;
pub mod event;
pub mod schema;
pub mod session_tags;

pub use bag::{AttributeBag, Synced};
pub use entities::{
    BandwidthFields, Orientation, PlayerFields, RequestSample, VideoFields, ViewFields,
};
pub use error::FormatError;
pub use event::{
    DataEvent, DebugEvent, ErrorEvent, Event, PlaybackEvent, PlaybackEventKind,
    SessionDataEvent, TrackableEvent, ViewMetricEvent,
};
pub use schema::{EntityKind, keys};
pub use session_tags::SessionTag;
