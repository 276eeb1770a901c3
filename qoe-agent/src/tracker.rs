//! Host-facing tracker for one player.
//!
//! A [`Tracker`] is what a player integration talks to. It turns host calls
//! (playback transitions, request samples, metadata updates) into events,
//! decorated with a fresh reading of the player's state, and dispatches them
//! through the shared [`Registry`]. It also polls the host for video source
//! changes while the player is alive.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use playback_model::session_tags::route;
use playback_model::{
    AttributeBag, DataEvent, EntityKind, ErrorEvent, Event, Orientation, PlaybackEvent,
    PlaybackEventKind, RequestSample, SessionTag, keys,
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::config::PlayerOptions;
use crate::delivery::DeliveryStats;
use crate::host::{PlayerSnapshot, PlayerStateProvider};
use crate::registry::Registry;
use crate::{Error, Result};

/// Largest player dimension accepted from the host, in pixels.
pub const MAX_PLAYER_DIMENSION: i64 = 1 << 20;

/// Explicit presentation mode reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Presentation {
    Normal,
    Fullscreen,
}

/// Metadata the integrating application supplies about its player, video,
/// view and viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerData {
    pub player: AttributeBag,
    pub video: AttributeBag,
    pub view: AttributeBag,
    pub viewer: AttributeBag,
    pub custom: AttributeBag,
}

impl Default for CustomerData {
    fn default() -> Self {
        Self {
            player: AttributeBag::new(EntityKind::CustomerPlayer),
            video: AttributeBag::new(EntityKind::CustomerVideo),
            view: AttributeBag::new(EntityKind::CustomerView),
            viewer: AttributeBag::new(EntityKind::CustomerViewer),
            custom: AttributeBag::new(EntityKind::Custom),
        }
    }
}

impl CustomerData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges every bag of `other` into this one.
    pub fn merge(&mut self, other: &CustomerData) {
        self.player.update(&other.player);
        self.video.update(&other.video);
        self.view.update(&other.view);
        self.viewer.update(&other.viewer);
        self.custom.update(&other.custom);
    }

    pub fn to_data_event(&self) -> DataEvent {
        DataEvent {
            customer_player: self.player.clone(),
            customer_video: self.video.clone(),
            customer_view: self.view.clone(),
            customer_viewer: self.viewer.clone(),
            custom: self.custom.clone(),
            ..DataEvent::new()
        }
    }
}

pub struct Tracker {
    tag: String,
    registry: Arc<Registry>,
    provider: Arc<dyn PlayerStateProvider>,
    software: AttributeBag,
    customer: CustomerData,
    automatic_error_tracking: bool,
    dropped_frames: i64,
    player_size: Option<(i64, i64)>,
    screen_size: Option<(i64, i64)>,
    presentation: Option<Presentation>,
    preloaded: bool,
    sampled_video: Arc<Mutex<Option<AttributeBag>>>,
    sampler: CancellationToken,
    released: bool,
}

impl Tracker {
    /// Registers the player, opens its first view and starts sampling.
    ///
    /// Fails when `name` is empty, when no customer player data is given, or
    /// when the registry refuses the player.
    pub fn new(
        registry: Arc<Registry>,
        name: &str,
        provider: Arc<dyn PlayerStateProvider>,
        customer: CustomerData,
        options: &PlayerOptions,
    ) -> Result<Self> {
        if name.trim().is_empty() {
            return Err(Error::config("player name must not be empty"));
        }
        if customer.player.is_empty() {
            return Err(Error::config("customer player data is required"));
        }
        registry.create_player(name, options)?;

        let mut tracker = Self {
            tag: name.to_string(),
            software: registry.device().player_bag(),
            registry,
            provider,
            customer,
            automatic_error_tracking: true,
            dropped_frames: 0,
            player_size: None,
            screen_size: None,
            presentation: None,
            preloaded: false,
            sampled_video: Arc::new(Mutex::new(None)),
            sampler: CancellationToken::new(),
            released: false,
        };
        let now = tracker.registry.clock().now_ms();
        tracker.customer.player.insert_scalar(keys::PLAYER_INIT_TIME, now);

        tracker.dispatch_playback(PlaybackEvent::new(PlaybackEventKind::ViewInit))?;
        tracker.send_customer_data()?;
        tracker.dispatch_playback(PlaybackEvent::new(PlaybackEventKind::PlayerReady))?;
        tracker.spawn_sampler();
        info!(player = %tracker.tag, "Tracker started");
        Ok(tracker)
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn customer_data(&self) -> &CustomerData {
        &self.customer
    }

    // ========== Playback ==========

    /// Reports a playback transition.
    pub fn handle(&mut self, kind: PlaybackEventKind) -> Result<()> {
        if kind == PlaybackEventKind::Error && !self.automatic_error_tracking {
            debug!(player = %self.tag, "Automatic error tracking is off; player error ignored");
            return Ok(());
        }
        self.dispatch_playback(PlaybackEvent::new(kind))
    }

    /// Reports a network request with its bandwidth sample.
    pub fn handle_request(&mut self, kind: PlaybackEventKind, sample: &RequestSample) -> Result<()> {
        if !kind.is_request() {
            return Err(Error::config(format!("{kind} is not a request event")));
        }
        let bandwidth = sample.to_bag(kind.as_ref())?;
        self.dispatch_playback(PlaybackEvent::new(kind).with_bandwidth(bandwidth))
    }

    // ========== Metadata ==========

    /// Replaces the customer metadata and forwards it.
    pub fn set_customer_data(&mut self, data: CustomerData) -> Result<()> {
        let init_time = self.customer.player.get(keys::PLAYER_INIT_TIME).cloned();
        self.customer = data;
        if let Some(init_time) = init_time {
            self.customer.player.insert_scalar(keys::PLAYER_INIT_TIME, init_time);
        }
        self.send_customer_data()
    }

    /// Merges `data` into the customer metadata and forwards the change.
    pub fn update_customer_data(&mut self, data: &CustomerData) -> Result<()> {
        self.customer.merge(data);
        self.registry.dispatch_data(&self.tag, data.to_data_event())
    }

    pub fn set_session_data(&mut self, tags: &[SessionTag]) -> Result<()> {
        let event = route(tags);
        self.customer.player.update(&event.customer_player);
        self.registry.dispatch(&self.tag, Event::Session(event))
    }

    /// Ends the current view and starts a new one for another video.
    pub fn video_change(&mut self, data: CustomerData) -> Result<()> {
        self.dispatch_playback(PlaybackEvent::new(PlaybackEventKind::ViewCompleted))?;
        self.sampled_video.lock().take();
        self.dispatch_playback(PlaybackEvent::new(PlaybackEventKind::ViewInit))?;

        self.customer.player.update(&data.player);
        self.customer.video = data.video;
        self.customer.view = data.view;
        self.customer.viewer.update(&data.viewer);
        self.customer.custom = data.custom;
        self.send_customer_data()
    }

    /// A new program within the same stream: a video change followed by an
    /// immediate resume, flagged as a program change.
    pub fn program_change(&mut self, data: CustomerData) -> Result<()> {
        self.video_change(data)?;
        for kind in [PlaybackEventKind::Play, PlaybackEventKind::Playing] {
            let mut view = AttributeBag::new(EntityKind::View);
            view.insert_scalar(keys::VIEW_PROGRAM_CHANGED, true);
            self.dispatch_playback(PlaybackEvent::new(kind).with_view(view))?;
        }
        Ok(())
    }

    // ========== Player state ==========

    pub fn set_player_size(&mut self, width: i64, height: i64) {
        self.player_size = Some((
            width.clamp(0, MAX_PLAYER_DIMENSION),
            height.clamp(0, MAX_PLAYER_DIMENSION),
        ));
    }

    pub fn set_screen_size(&mut self, width: i64, height: i64) {
        self.screen_size = Some((width.max(0), height.max(0)));
    }

    pub fn presentation_change(&mut self, presentation: Presentation) {
        self.presentation = Some(presentation);
    }

    pub fn set_dropped_frames(&mut self, count: i64) {
        self.dropped_frames = count.max(0);
    }

    pub fn set_preloaded(&mut self, preloaded: bool) {
        self.preloaded = preloaded;
    }

    pub fn orientation_change(&mut self, orientation: Orientation) -> Result<()> {
        self.registry.orientation_change(&self.tag, orientation)
    }

    // ========== Errors ==========

    /// Reports a player error with its code, message and optional context.
    pub fn error(&mut self, code: i64, message: &str, context: Option<&str>) -> Result<()> {
        let mut player = self.player_bag(&self.provider.snapshot());
        player.insert_scalar(keys::PLAYER_ERROR_CODE, code);
        player.insert_scalar(keys::PLAYER_ERROR_MESSAGE, message);
        if let Some(context) = context {
            player.insert_scalar(keys::PLAYER_ERROR_CONTEXT, context);
        }
        self.registry.dispatch(
            &self.tag,
            Event::Error(ErrorEvent {
                code,
                message: message.to_string(),
                context: context.map(str::to_string),
            }),
        )?;
        let event = PlaybackEvent::new(PlaybackEventKind::Error)
            .with_player(player)
            .with_view(self.view_delta());
        self.registry.dispatch(&self.tag, Event::Playback(event))
    }

    /// Reports a failure inside the integration itself. Nothing is sent to
    /// the collector.
    pub fn internal_error(&mut self, message: &str) -> Result<()> {
        self.registry.dispatch(
            &self.tag,
            Event::Error(ErrorEvent {
                code: -1,
                message: message.to_string(),
                context: Some("internal".into()),
            }),
        )
    }

    /// Whether `error` playback transitions from the player are reported.
    /// Explicit [`error`](Self::error) calls are always reported.
    pub fn set_automatic_error_tracking(&mut self, enabled: bool) {
        self.automatic_error_tracking = enabled;
    }

    // ========== Delivery ==========

    pub fn set_verbose(&self, verbose: bool) -> Result<()> {
        self.registry.set_verbose(&self.tag, verbose)
    }

    pub fn flush(&self) -> Result<()> {
        self.registry.flush(&self.tag)
    }

    pub fn stats(&self) -> Result<DeliveryStats> {
        self.registry.stats(&self.tag)
    }

    /// Stops sampling and releases the player. Safe to call more than once.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.sampler.cancel();
        if let Err(e) = self.registry.destroy_player(&self.tag) {
            debug!(player = %self.tag, error = %e, "Player already gone");
        }
    }

    fn dispatch_playback(&self, event: PlaybackEvent) -> Result<()> {
        let snapshot = self.provider.snapshot();
        let view = self.merge_view_delta(&event);
        let event = event.with_player(self.player_bag(&snapshot)).with_view(view);
        trace!(player = %self.tag, event = event.type_name(), "Dispatching playback event");
        self.registry.dispatch(&self.tag, Event::Playback(event))
    }

    fn merge_view_delta(&self, event: &PlaybackEvent) -> AttributeBag {
        let mut view = event.view.clone();
        view.update(&self.view_delta());
        view
    }

    fn view_delta(&self) -> AttributeBag {
        let mut view = AttributeBag::new(EntityKind::View);
        view.insert_scalar(keys::VIEW_DROPPED_FRAME_COUNT, self.dropped_frames);
        view
    }

    fn send_customer_data(&self) -> Result<()> {
        let mut data = self.customer.to_data_event();
        data.video = self.provider.snapshot().source.to_bag();
        *self.sampled_video.lock() = Some(data.video.clone());
        self.registry.dispatch_data(&self.tag, data)
    }

    fn player_bag(&self, snapshot: &PlayerSnapshot) -> AttributeBag {
        let mut bag = self.software.clone();
        let (width, height) = self
            .player_size
            .unwrap_or((snapshot.view_width, snapshot.view_height));
        bag.insert_scalar(keys::PLAYER_PLAYHEAD_TIME, snapshot.position_ms);
        bag.insert_scalar(keys::PLAYER_IS_PAUSED, snapshot.is_paused);
        bag.insert_scalar(keys::PLAYER_AUTOPLAY_ON, snapshot.is_autoplay);
        bag.insert_scalar(keys::PLAYER_PRELOAD_ON, self.preloaded);
        bag.insert_scalar(keys::PLAYER_WIDTH, width);
        bag.insert_scalar(keys::PLAYER_HEIGHT, height);
        bag.insert_scalar(keys::PLAYER_IS_FULLSCREEN, self.is_fullscreen(width, height));
        if let Some(time) = snapshot.program_time_ms {
            bag.insert_scalar(keys::PLAYER_PROGRAM_TIME, time);
        }
        if let Some(time) = snapshot.manifest_newest_time_ms {
            bag.insert_scalar(keys::PLAYER_MANIFEST_NEWEST_PROGRAM_TIME, time);
        }
        bag
    }

    fn is_fullscreen(&self, width: i64, height: i64) -> bool {
        match self.presentation {
            Some(presentation) => presentation == Presentation::Fullscreen,
            None => self.screen_size.is_some_and(|(screen_width, screen_height)| {
                width > 0 && height > 0 && width >= screen_width && height >= screen_height
            }),
        }
    }

    fn spawn_sampler(&self) {
        let registry: Weak<Registry> = Arc::downgrade(&self.registry);
        let provider = Arc::clone(&self.provider);
        let sampled = Arc::clone(&self.sampled_video);
        let cancel = self.sampler.clone();
        let tag = self.tag.clone();
        let period = Duration::from_millis(self.registry.config().timing.sampling_interval_ms.max(1));

        self.registry.runtime().spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(registry) = registry.upgrade() else {
                            break;
                        };
                        let Some(video) = changed_video(provider.as_ref(), &sampled) else {
                            continue;
                        };
                        debug!(player = %tag, "Video source changed");
                        let data = DataEvent {
                            video,
                            ..DataEvent::new()
                        };
                        if let Err(e) = registry.dispatch_data(&tag, data) {
                            debug!(player = %tag, error = %e, "Sampling stopped");
                            break;
                        }
                    }
                }
            }
        });
    }
}

/// The current video bag if it differs from the last one sent.
fn changed_video(
    provider: &dyn PlayerStateProvider,
    sampled: &Mutex<Option<AttributeBag>>,
) -> Option<AttributeBag> {
    let video = provider.snapshot().source.to_bag();
    let mut last = sampled.lock();
    if last.as_ref().is_some_and(|previous| previous.is_equal_to(&video)) {
        return None;
    }
    *last = Some(video.clone());
    Some(video)
}

impl Drop for Tracker {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::AgentConfig;
    use crate::host::{SharedPlayerState, VideoSource};
    use crate::registry::EventObserver;
    use crate::transport::MemoryTransport;
    use playback_model::TrackableEvent;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<TrackableEvent>>,
    }

    impl EventObserver for Recorder {
        fn on_event(&self, _player: &str, event: &TrackableEvent) {
            self.events.lock().push(event.clone());
        }
    }

    impl Recorder {
        fn names(&self) -> Vec<String> {
            self.events
                .lock()
                .iter()
                .map(|e| e.event_type().to_string())
                .collect()
        }

        fn last(&self, name: &str) -> TrackableEvent {
            self.events
                .lock()
                .iter()
                .rev()
                .find(|e| e.event_type() == name)
                .cloned()
                .unwrap()
        }
    }

    struct Setup {
        tracker: Tracker,
        recorder: Arc<Recorder>,
        state: Arc<SharedPlayerState>,
    }

    fn customer() -> CustomerData {
        let mut data = CustomerData::new();
        data.player.put(keys::WORKSPACE_ID, "ws1").unwrap();
        data.video.put("vdid", "video-1").unwrap();
        data
    }

    fn setup() -> Setup {
        let registry = Registry::builder(AgentConfig::default())
            .transport(Arc::new(MemoryTransport::new()))
            .clock(Arc::new(ManualClock::new(1_700_000_000_000)))
            .build()
            .unwrap();
        let recorder = Arc::new(Recorder::default());
        registry.set_event_observer(Some(recorder.clone()));
        let state = Arc::new(SharedPlayerState::default());
        let tracker = Tracker::new(
            registry,
            "main",
            state.clone(),
            customer(),
            &PlayerOptions::default(),
        )
        .unwrap();
        Setup {
            tracker,
            recorder,
            state,
        }
    }

    #[tokio::test]
    async fn construction_requires_name_and_customer_data() {
        let registry = Registry::builder(AgentConfig::default())
            .transport(Arc::new(MemoryTransport::new()))
            .build()
            .unwrap();
        let state = Arc::new(SharedPlayerState::default());
        let missing_name = Tracker::new(
            registry.clone(),
            " ",
            state.clone(),
            customer(),
            &PlayerOptions::default(),
        );
        assert!(matches!(missing_name, Err(Error::Configuration(_))));

        let missing_data = Tracker::new(
            registry.clone(),
            "main",
            state,
            CustomerData::new(),
            &PlayerOptions::default(),
        );
        assert!(matches!(missing_data, Err(Error::Configuration(_))));
        assert!(registry.player_tags().is_empty());
    }

    #[tokio::test]
    async fn startup_reports_player_ready_with_customer_data() {
        let setup = setup();
        assert_eq!(setup.recorder.names(), ["playerReady"]);
        let ready = setup.recorder.last("playerReady");
        assert_eq!(ready.query.get_string(keys::WORKSPACE_ID).as_deref(), Some("ws1"));
        assert_eq!(ready.query.get_string("vdid").as_deref(), Some("video-1"));
        assert_eq!(ready.query.get_i64(keys::PLAYER_INIT_TIME), Some(1_700_000_000_000));
    }

    #[tokio::test]
    async fn player_state_is_read_on_every_event() {
        let mut setup = setup();
        setup.state.update(|s| {
            s.position_ms = 4_200;
            s.view_width = 640;
            s.view_height = 360;
        });
        setup.tracker.set_dropped_frames(7);
        setup.tracker.handle(PlaybackEventKind::Play).unwrap();

        let play = setup.recorder.last("play");
        assert_eq!(play.query.get_i64(keys::PLAYER_PLAYHEAD_TIME), Some(4_200));
        assert_eq!(play.query.get_i64(keys::PLAYER_WIDTH), Some(640));
        assert_eq!(play.query.get_i64(keys::VIEW_DROPPED_FRAME_COUNT), Some(7));
        assert_eq!(play.query.get_bool(keys::PLAYER_IS_FULLSCREEN), Some(false));
    }

    #[tokio::test]
    async fn fullscreen_derivation() {
        let mut setup = setup();
        setup.tracker.set_screen_size(1920, 1080);
        setup.tracker.set_player_size(4_000_000, 1080);
        setup.tracker.handle(PlaybackEventKind::Play).unwrap();
        let play = setup.recorder.last("play");
        assert_eq!(play.query.get_i64(keys::PLAYER_WIDTH), Some(MAX_PLAYER_DIMENSION));
        assert_eq!(play.query.get_bool(keys::PLAYER_IS_FULLSCREEN), Some(true));

        setup.tracker.presentation_change(Presentation::Normal);
        setup.tracker.handle(PlaybackEventKind::Pause).unwrap();
        let pause = setup.recorder.last("pause");
        assert_eq!(pause.query.get_bool(keys::PLAYER_IS_FULLSCREEN), Some(false));
    }

    #[tokio::test]
    async fn automatic_error_tracking_switch() {
        let mut setup = setup();
        setup.tracker.set_automatic_error_tracking(false);
        setup.tracker.handle(PlaybackEventKind::Error).unwrap();
        assert!(!setup.recorder.names().contains(&"error".to_string()));

        setup.tracker.error(404, "not found", Some("manifest")).unwrap();
        let error = setup.recorder.last("error");
        assert_eq!(error.query.get_i64(keys::PLAYER_ERROR_CODE), Some(404));
        assert_eq!(error.query.get_string(keys::PLAYER_ERROR_CONTEXT).as_deref(), Some("manifest"));
    }

    #[tokio::test]
    async fn request_events_require_request_kinds() {
        let mut setup = setup();
        let sample = RequestSample {
            request_start: Some(0),
            response_start: Some(10),
            response_end: Some(110),
            bytes_loaded: Some(1_000),
            hostname: Some("cdn.test".into()),
            ..Default::default()
        };
        assert!(setup.tracker.handle_request(PlaybackEventKind::Play, &sample).is_err());
        setup
            .tracker
            .handle_request(PlaybackEventKind::RequestCompleted, &sample)
            .unwrap();
        let completed = setup.recorder.last("requestCompleted");
        assert_eq!(completed.query.get_string(keys::REQUEST_HOSTNAME).as_deref(), Some("cdn.test"));
        assert_eq!(completed.query.get_i64(keys::VIEW_REQUEST_COUNT), Some(1));
    }

    #[tokio::test]
    async fn video_change_starts_a_new_view() {
        let mut setup = setup();
        setup.tracker.handle(PlaybackEventKind::Play).unwrap();
        let first_view = setup.recorder.last("viewBegin").query.get_string(keys::VIEW_ID);

        let mut next = CustomerData::new();
        next.video.put("vdid", "video-2").unwrap();
        setup.tracker.program_change(next).unwrap();

        let names = setup.recorder.names();
        let completed = names.iter().position(|n| n == "viewCompleted").unwrap();
        assert!(names[completed..].contains(&"viewBegin".to_string()));
        let begin = setup.recorder.last("viewBegin");
        assert_ne!(begin.query.get_string(keys::VIEW_ID), first_view);
        assert_eq!(begin.query.get_string("vdid").as_deref(), Some("video-2"));
        assert_eq!(begin.query.get_bool(keys::VIEW_PROGRAM_CHANGED), Some(true));
        assert_eq!(begin.query.get_string(keys::WORKSPACE_ID).as_deref(), Some("ws1"));
    }

    #[tokio::test]
    async fn session_tags_reach_the_view() {
        let mut setup = setup();
        setup
            .tracker
            .set_session_data(&[
                SessionTag::new("video_title", "Big Buck Bunny"),
                SessionTag::new("custom_1", "blue"),
            ])
            .unwrap();
        setup.tracker.handle(PlaybackEventKind::Play).unwrap();
        let play = setup.recorder.last("play");
        assert_eq!(play.query.get_string("vdtt").as_deref(), Some("Big Buck Bunny"));
        assert_eq!(play.query.get_string("cm1").as_deref(), Some("blue"));
    }

    #[tokio::test]
    async fn sampling_picks_up_source_changes() {
        let setup = setup();
        setup.state.update(|s| {
            s.source = VideoSource {
                width: Some(1280),
                height: Some(720),
                ..Default::default()
            }
        });
        let registry = Arc::clone(setup.tracker.registry());
        let mut width = None;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            width = registry
                .with_player("main", |player| {
                    player
                        .view()
                        .and_then(|view| view.bags().video.get_i64(keys::VIDEO_SOURCE_WIDTH))
                })
                .unwrap();
            if width.is_some() {
                break;
            }
        }
        assert_eq!(width, Some(1280));
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let mut setup = setup();
        setup.tracker.release();
        setup.tracker.release();
        assert!(!setup.tracker.registry().contains("main"));
        assert!(setup.tracker.handle(PlaybackEventKind::Play).is_err());
    }
}
