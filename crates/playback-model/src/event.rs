use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};

use crate::bag::{AttributeBag, Synced};
use crate::schema::{EntityKind, keys};

pub const DATA_EVENT: &str = "dataEvent";
pub const SESSION_DATA_EVENT: &str = "sessionDataEvent";
pub const VIEW_METRIC_EVENT: &str = "viewMetricEvent";
pub const ERROR_EVENT: &str = "errorEvent";
pub const DEBUG_EVENT: &str = "debugEvent";
/// Marker queued once when the delivery queue overflows.
pub const OVERFLOW_EVENT: &str = "eventRateExceeded";

/// Lifecycle events a player can go through.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    IntoStaticStr,
    EnumIter,
)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum PlaybackEventKind {
    Buffered,
    Buffering,
    Ended,
    Error,
    InternalHeartbeatEnd,
    InternalHeartbeat,
    OrientationChange,
    Pause,
    PlayerReady,
    Play,
    Playing,
    Pulse,
    RequestCanceled,
    RequestCompleted,
    RequestFailed,
    Sampling,
    Seeked,
    Seeking,
    TimeUpdate,
    VariantChanged,
    VideoChange,
    ViewBegin,
    ViewCompleted,
    ViewInit,
}

impl PlaybackEventKind {
    /// Kinds forwarded to the collector as trackable events.
    pub fn is_reportable(self) -> bool {
        !matches!(
            self,
            Self::InternalHeartbeat | Self::InternalHeartbeatEnd | Self::TimeUpdate | Self::ViewInit
        )
    }

    pub fn is_heartbeat(self) -> bool {
        matches!(self, Self::InternalHeartbeat | Self::InternalHeartbeatEnd)
    }

    pub fn is_request(self) -> bool {
        matches!(
            self,
            Self::RequestCompleted | Self::RequestFailed | Self::RequestCanceled
        )
    }

    pub fn suppressed_by_default(self) -> bool {
        self == Self::Seeking
    }
}

/// A player lifecycle event together with the host's view of the player.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackEvent {
    pub kind: PlaybackEventKind,
    pub player: AttributeBag,
    /// Delta merged into the live view before monitors run.
    pub view: AttributeBag,
    pub bandwidth: Option<AttributeBag>,
    pub suppressed: bool,
}

impl PlaybackEvent {
    pub fn new(kind: PlaybackEventKind) -> Self {
        Self {
            kind,
            player: AttributeBag::new(EntityKind::Player),
            view: AttributeBag::new(EntityKind::View),
            bandwidth: None,
            suppressed: kind.suppressed_by_default(),
        }
    }

    pub fn with_player(mut self, player: AttributeBag) -> Self {
        self.player = player;
        self
    }

    pub fn with_view(mut self, view: AttributeBag) -> Self {
        self.view = view;
        self
    }

    pub fn with_bandwidth(mut self, bandwidth: AttributeBag) -> Self {
        self.bandwidth = Some(bandwidth);
        self
    }

    pub fn with_suppressed(mut self, suppressed: bool) -> Self {
        self.suppressed = suppressed;
        self
    }

    /// A new event of `kind` carrying this event's player snapshot.
    pub fn derive(&self, kind: PlaybackEventKind) -> Self {
        Self::new(kind).with_player(self.player.clone())
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.into()
    }
}

/// Metadata updates for the entities a view or player carries.
#[derive(Debug, Clone, PartialEq)]
pub struct DataEvent {
    pub viewer: AttributeBag,
    pub environment: AttributeBag,
    pub video: AttributeBag,
    pub customer_video: AttributeBag,
    pub customer_view: AttributeBag,
    pub customer_player: AttributeBag,
    pub customer_viewer: AttributeBag,
    pub custom: AttributeBag,
}

impl Default for DataEvent {
    fn default() -> Self {
        Self {
            viewer: AttributeBag::new(EntityKind::Viewer),
            environment: AttributeBag::new(EntityKind::Environment),
            video: AttributeBag::new(EntityKind::Video),
            customer_video: AttributeBag::new(EntityKind::CustomerVideo),
            customer_view: AttributeBag::new(EntityKind::CustomerView),
            customer_player: AttributeBag::new(EntityKind::CustomerPlayer),
            customer_viewer: AttributeBag::new(EntityKind::CustomerViewer),
            custom: AttributeBag::new(EntityKind::Custom),
        }
    }
}

impl DataEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        [
            &self.viewer,
            &self.environment,
            &self.video,
            &self.customer_video,
            &self.customer_view,
            &self.customer_player,
            &self.customer_viewer,
            &self.custom,
        ]
        .iter()
        .all(|bag| bag.is_empty())
    }
}

/// Customer metadata routed from session tags.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionDataEvent {
    pub customer_player: AttributeBag,
    pub customer_video: AttributeBag,
    pub customer_view: AttributeBag,
    pub custom: AttributeBag,
}

impl Default for SessionDataEvent {
    fn default() -> Self {
        Self {
            customer_player: AttributeBag::new(EntityKind::CustomerPlayer),
            customer_video: AttributeBag::new(EntityKind::CustomerVideo),
            customer_view: AttributeBag::new(EntityKind::CustomerView),
            custom: AttributeBag::new(EntityKind::Custom),
        }
    }
}

impl SessionDataEvent {
    /// Mutable bag for an entity kind, if session tags can target it.
    pub fn bag_for(&mut self, kind: EntityKind) -> Option<&mut AttributeBag> {
        match kind {
            EntityKind::CustomerPlayer => Some(&mut self.customer_player),
            EntityKind::CustomerVideo => Some(&mut self.customer_video),
            EntityKind::CustomerView => Some(&mut self.customer_view),
            EntityKind::Custom => Some(&mut self.custom),
            _ => None,
        }
    }
}

/// An event bound for the collector. `query` accumulates every entity
/// stamped onto it on the way out.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackableEvent {
    event_type: String,
    pub query: AttributeBag,
}

impl TrackableEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        let event_type = event_type.into();
        let mut query = AttributeBag::new(EntityKind::Query);
        query.insert_scalar(keys::EVENT_NAME, event_type.as_str());
        Self { event_type, query }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Stamps `bag` onto the query.
    pub fn stamp(&mut self, bag: &AttributeBag) {
        self.query.update(bag);
    }
}

impl Synced for TrackableEvent {
    fn bag_mut(&mut self) -> &mut AttributeBag {
        &mut self.query
    }

    fn sync(&mut self) {
        if let Some(name) = self.query.get_string(keys::EVENT_NAME) {
            self.event_type = name;
        }
    }
}

/// View metric delta produced by a monitor.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewMetricEvent {
    pub view: AttributeBag,
}

impl ViewMetricEvent {
    pub fn new(view: AttributeBag) -> Self {
        Self { view }
    }
}

/// A player error reported by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub code: i64,
    pub message: String,
    pub context: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DebugEvent {
    pub message: String,
}

/// Every event that travels through the agent.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Playback(PlaybackEvent),
    Data(DataEvent),
    Session(SessionDataEvent),
    Trackable(TrackableEvent),
    ViewMetric(ViewMetricEvent),
    Error(ErrorEvent),
    Debug(DebugEvent),
}

impl Event {
    pub fn type_name(&self) -> &str {
        match self {
            Self::Playback(e) => e.type_name(),
            Self::Data(_) => DATA_EVENT,
            Self::Session(_) => SESSION_DATA_EVENT,
            Self::Trackable(e) => e.event_type(),
            Self::ViewMetric(_) => VIEW_METRIC_EVENT,
            Self::Error(_) => ERROR_EVENT,
            Self::Debug(_) => DEBUG_EVENT,
        }
    }

    pub fn is_trackable(&self) -> bool {
        matches!(self, Self::Trackable(_))
    }

    pub fn is_playback(&self) -> bool {
        matches!(self, Self::Playback(_))
    }

    pub fn is_data(&self) -> bool {
        matches!(self, Self::Data(_))
    }

    pub fn is_session(&self) -> bool {
        matches!(self, Self::Session(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn is_view_metric(&self) -> bool {
        matches!(self, Self::ViewMetric(_))
    }

    pub fn is_debug(&self) -> bool {
        matches!(self, Self::Debug(_))
    }

    pub fn as_playback(&self) -> Option<&PlaybackEvent> {
        match self {
            Self::Playback(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PlaybackEvent> for Event {
    fn from(event: PlaybackEvent) -> Self {
        Self::Playback(event)
    }
}

impl From<TrackableEvent> for Event {
    fn from(event: TrackableEvent) -> Self {
        Self::Trackable(event)
    }
}

impl From<DataEvent> for Event {
    fn from(event: DataEvent) -> Self {
        Self::Data(event)
    }
}
