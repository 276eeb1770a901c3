//! Per-player state: identity, player bags and the live view.

use std::sync::Arc;

use playback_model::{
    AttributeBag, EntityKind, Event, Orientation, PlaybackEvent, PlaybackEventKind,
    TrackableEvent, keys,
};
use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::Result;
use crate::bus::{EventBus, ListenerId};
use crate::clock::Clock;
use crate::config::TimingConfig;
use crate::view::{ViewRestart, ViewStateMachine};

/// Receives what a player produces for the outside world: trackable events
/// bound for the collector and host-reported errors.
pub trait PlayerListener: Send {
    fn on_event(&mut self, event: &Event) -> Result<()>;

    /// Push out anything buffered.
    fn flush(&mut self) {}

    /// The player is going away.
    fn release(&mut self) {}
}

pub struct PlayerStateMachine {
    tag: String,
    player: AttributeBag,
    customer_player: AttributeBag,
    instance_id: String,
    sequence: i64,
    view: Option<ViewStateMachine>,
    listeners: EventBus<dyn PlayerListener>,
    clock: Arc<dyn Clock>,
    timing: TimingConfig,
}

impl PlayerStateMachine {
    pub fn new(tag: impl Into<String>, clock: Arc<dyn Clock>, timing: TimingConfig) -> Self {
        let instance_id = Uuid::new_v4().to_string();
        let mut player = AttributeBag::new(EntityKind::Player);
        player.insert_scalar(keys::PLAYER_INSTANCE_ID, instance_id.as_str());
        Self {
            tag: tag.into(),
            player,
            customer_player: AttributeBag::new(EntityKind::CustomerPlayer),
            instance_id,
            sequence: 0,
            view: None,
            listeners: EventBus::new(),
            clock,
            timing,
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Trackable events produced so far.
    pub fn sequence(&self) -> i64 {
        self.sequence
    }

    pub fn view(&self) -> Option<&ViewStateMachine> {
        self.view.as_ref()
    }

    pub fn player_bag(&self) -> &AttributeBag {
        &self.player
    }

    pub fn customer_player(&self) -> &AttributeBag {
        &self.customer_player
    }

    pub fn add_listener(&mut self, listener: Box<dyn PlayerListener>) -> ListenerId {
        self.listeners.add_listener(listener)
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove_listener(id).is_some()
    }

    pub fn dispatch(&mut self, event: Event) {
        match event {
            Event::Trackable(trackable) => self.emit_trackable(trackable),
            Event::Error(_) => self.notify(&event),
            Event::Session(session) => {
                self.customer_player.update(&session.customer_player);
                self.forward(Event::Session(session));
            }
            Event::Data(data) => {
                self.customer_player.update(&data.customer_player);
                self.forward(Event::Data(data));
            }
            Event::Playback(playback) => {
                self.player.update(&playback.player);
                if playback.kind == PlaybackEventKind::ViewInit {
                    self.start_view();
                }
                self.forward(Event::Playback(playback));
            }
            Event::ViewMetric(_) | Event::Debug(_) => self.forward(event),
        }
    }

    /// Reports a device rotation as an `orientationChange` playback event.
    pub fn dispatch_orientation_change(&mut self, orientation: Orientation) -> Result<()> {
        let mut view = AttributeBag::new(EntityKind::View);
        view.put(
            keys::VIEW_DEVICE_ORIENTATION,
            orientation.to_json().to_string(),
        )?;
        let event = PlaybackEvent::new(PlaybackEventKind::OrientationChange)
            .with_player(self.player.clone())
            .with_view(view);
        self.dispatch(Event::Playback(event));
        Ok(())
    }

    pub fn flush(&mut self) {
        self.listeners.flush(|listener| listener.flush());
    }

    /// Tears down the view and lets listeners release their resources.
    pub fn release(&mut self) {
        if let Some(mut view) = self.view.take() {
            view.teardown();
        }
        self.listeners.flush(|listener| listener.release());
        self.listeners.remove_all_listeners();
        debug!(player = %self.tag, sequence = self.sequence, "Player released");
    }

    fn start_view(&mut self) {
        if let Some(mut previous) = self.view.take() {
            previous.teardown();
        }
        let view = ViewStateMachine::new(Arc::clone(&self.clock), self.timing.clone());
        debug!(player = %self.tag, view = %view.view_id(), "New view");
        self.view = Some(view);
        for key in [
            keys::PLAYER_ERROR_CODE,
            keys::PLAYER_ERROR_MESSAGE,
            keys::PLAYER_ERROR_CONTEXT,
        ] {
            self.player.remove(key);
        }
    }

    fn forward(&mut self, event: Event) {
        let Some(view) = self.view.as_mut() else {
            trace!(player = %self.tag, event = event.type_name(), "No active view; event ignored");
            return;
        };
        let outcome = view.dispatch(event);
        for escalated in outcome.escalated {
            match escalated {
                Event::Trackable(trackable) => self.emit_trackable(trackable),
                other => self.notify(&other),
            }
        }
        if let Some(restart) = outcome.restart {
            self.restart_view(restart);
        }
    }

    fn restart_view(&mut self, restart: ViewRestart) {
        info!(player = %self.tag, "Playback resumed after a long pause; starting a new view");
        let player = restart
            .late_event
            .as_ref()
            .map_or_else(|| self.player.clone(), |late| late.player.clone());

        self.dispatch(Event::Playback(
            PlaybackEvent::new(PlaybackEventKind::ViewInit).with_player(player.clone()),
        ));
        self.forward(Event::Data(restart.carry));
        if restart.resume_playback {
            self.dispatch(Event::Playback(
                PlaybackEvent::new(PlaybackEventKind::Play).with_player(player.clone()),
            ));
            if restart.emit_playing {
                self.dispatch(Event::Playback(
                    PlaybackEvent::new(PlaybackEventKind::Playing).with_player(player),
                ));
            }
        }
        if let Some(late) = restart.late_event {
            self.dispatch(Event::Playback(late));
        }
    }

    fn emit_trackable(&mut self, mut trackable: TrackableEvent) {
        self.sequence += 1;
        self.player
            .insert_scalar(keys::PLAYER_SEQUENCE_NUMBER, self.sequence);
        trackable.stamp(&self.player);
        trackable.stamp(&self.customer_player);
        self.notify(&Event::Trackable(trackable));
    }

    fn notify(&mut self, event: &Event) {
        self.listeners.dispatch(|listener| listener.on_event(event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use parking_lot::Mutex;
    use playback_model::{DataEvent, ViewFields};

    #[derive(Clone, Default)]
    struct Capture {
        events: Arc<Mutex<Vec<Event>>>,
    }

    impl PlayerListener for Capture {
        fn on_event(&mut self, event: &Event) -> Result<()> {
            self.events.lock().push(event.clone());
            Ok(())
        }
    }

    impl Capture {
        fn names(&self) -> Vec<String> {
            self.events
                .lock()
                .iter()
                .map(|e| e.type_name().to_string())
                .collect()
        }

        fn trackables(&self) -> Vec<TrackableEvent> {
            self.events
                .lock()
                .iter()
                .filter_map(|e| match e {
                    Event::Trackable(t) => Some(t.clone()),
                    _ => None,
                })
                .collect()
        }
    }

    fn player() -> (PlayerStateMachine, Capture, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let mut player = PlayerStateMachine::new("main", clock.clone(), TimingConfig::default());
        let capture = Capture::default();
        player.add_listener(Box::new(capture.clone()));
        (player, capture, clock)
    }

    fn playback(kind: PlaybackEventKind) -> Event {
        Event::Playback(PlaybackEvent::new(kind))
    }

    #[test]
    fn events_before_view_init_are_ignored() {
        let (mut player, capture, _) = player();
        player.dispatch(playback(PlaybackEventKind::Play));
        assert!(capture.names().is_empty());
        assert!(player.view().is_none());
    }

    #[test]
    fn trackables_carry_player_identity_and_sequence() {
        let (mut player, capture, _) = player();
        let mut data = DataEvent::new();
        data.customer_player.put(keys::WORKSPACE_ID, "ws1").unwrap();
        player.dispatch(Event::Data(data));
        player.dispatch(playback(PlaybackEventKind::ViewInit));
        player.dispatch(playback(PlaybackEventKind::Play));

        let sent = capture.trackables();
        assert_eq!(
            sent.iter().map(|t| t.event_type()).collect::<Vec<_>>(),
            ["viewBegin", "play"]
        );
        for (index, trackable) in sent.iter().enumerate() {
            let q = &trackable.query;
            assert_eq!(q.get_i64(keys::PLAYER_SEQUENCE_NUMBER), Some(index as i64 + 1));
            assert_eq!(q.get_string(keys::PLAYER_INSTANCE_ID).as_deref(), Some(player.instance_id()));
            assert_eq!(q.get_string(keys::WORKSPACE_ID).as_deref(), Some("ws1"));
        }
    }

    #[test]
    fn view_init_replaces_the_view_and_clears_errors() {
        let (mut player, _, _) = player();
        player.dispatch(playback(PlaybackEventKind::ViewInit));
        let first = player.view().unwrap().view_id().to_string();

        let mut failing = AttributeBag::new(EntityKind::Player);
        failing.put(keys::PLAYER_ERROR_CODE, "500").unwrap();
        player.dispatch(Event::Playback(
            PlaybackEvent::new(PlaybackEventKind::Error).with_player(failing),
        ));
        assert!(player.player_bag().contains_key(keys::PLAYER_ERROR_CODE));

        player.dispatch(playback(PlaybackEventKind::ViewInit));
        assert_ne!(player.view().unwrap().view_id(), first);
        assert!(!player.player_bag().contains_key(keys::PLAYER_ERROR_CODE));
    }

    #[test]
    fn orientation_change_is_reported_with_rotation() {
        let (mut player, capture, _) = player();
        player.dispatch(playback(PlaybackEventKind::ViewInit));
        player
            .dispatch_orientation_change(Orientation::Landscape)
            .unwrap();

        let sent = capture.trackables();
        let change = sent.last().unwrap();
        assert_eq!(change.event_type(), "orientationChange");
        assert_eq!(
            change.query.get_string(keys::VIEW_DEVICE_ORIENTATION).as_deref(),
            Some(r#"{"x":0,"y":0,"z":0}"#)
        );
    }

    #[test]
    fn long_pause_restarts_the_view_before_the_late_event() {
        let (mut player, capture, clock) = player();
        player.dispatch(playback(PlaybackEventKind::ViewInit));
        player.dispatch(playback(PlaybackEventKind::Playing));
        let first = player.view().unwrap().view_id().to_string();

        clock.advance(61 * 60 * 1000);
        capture.events.lock().clear();
        player.dispatch(playback(PlaybackEventKind::Play));

        let second = player.view().unwrap().view_id().to_string();
        assert_ne!(first, second);
        let sent = capture.trackables();
        assert_eq!(
            sent.iter().map(|t| t.event_type()).collect::<Vec<_>>(),
            ["viewBegin", "play"]
        );
        assert!(sent.iter().all(|t| t.query.view_id().as_deref() == Some(second.as_str())));
    }

    #[test]
    fn errors_reach_listeners() {
        let (mut player, capture, _) = player();
        player.dispatch(Event::Error(playback_model::ErrorEvent {
            code: 3,
            message: "network".into(),
            context: Some("segment 12".into()),
        }));
        assert_eq!(capture.names(), ["errorEvent"]);
    }
}
