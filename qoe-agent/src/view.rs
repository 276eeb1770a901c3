//! One viewing session of one piece of content.
//!
//! The view owns the bags that describe what is being watched, runs every
//! playback event through its monitor pipeline and hands trackable and
//! error events back to the player in the order they were produced.

use std::ops::ControlFlow;
use std::sync::Arc;

use playback_model::{
    AttributeBag, DataEvent, EntityKind, Event, PlaybackEvent, SessionDataEvent, keys,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::bus::{EventBus, ListenerId};
use crate::clock::Clock;
use crate::config::TimingConfig;
use crate::monitor::{Monitor, MonitorContext, NewViewRequest, standard_monitors};

/// Bags owned by the view, stamped onto every trackable it produces.
#[derive(Debug, Clone)]
pub struct ViewBags {
    pub view: AttributeBag,
    pub video: AttributeBag,
    pub customer_video: AttributeBag,
    pub customer_view: AttributeBag,
    pub customer_viewer: AttributeBag,
    pub custom: AttributeBag,
}

impl Default for ViewBags {
    fn default() -> Self {
        Self {
            view: AttributeBag::new(EntityKind::View),
            video: AttributeBag::new(EntityKind::Video),
            customer_video: AttributeBag::new(EntityKind::CustomerVideo),
            customer_view: AttributeBag::new(EntityKind::CustomerView),
            customer_viewer: AttributeBag::new(EntityKind::CustomerViewer),
            custom: AttributeBag::new(EntityKind::Custom),
        }
    }
}

/// Everything the player needs to replace this view with a new one.
#[derive(Debug, Clone)]
pub struct ViewRestart {
    /// Metadata carried from the old view into the new one.
    pub carry: DataEvent,
    pub resume_playback: bool,
    pub emit_playing: bool,
    /// The event that arrived too late for the old view.
    pub late_event: Option<PlaybackEvent>,
}

/// Result of dispatching one event into the view.
#[derive(Debug, Default)]
pub struct ViewDispatch {
    /// Trackable and error events for the player, in production order.
    pub escalated: Vec<Event>,
    pub restart: Option<ViewRestart>,
}

pub struct ViewStateMachine {
    bags: ViewBags,
    view_id: String,
    sequence: i64,
    monitors: EventBus<dyn Monitor>,
    clock: Arc<dyn Clock>,
    timing: TimingConfig,
}

impl ViewStateMachine {
    pub fn new(clock: Arc<dyn Clock>, timing: TimingConfig) -> Self {
        Self::with_monitors(clock, timing, standard_monitors())
    }

    pub fn with_monitors(
        clock: Arc<dyn Clock>,
        timing: TimingConfig,
        monitors: Vec<Box<dyn Monitor>>,
    ) -> Self {
        let view_id = Uuid::new_v4().to_string();
        let mut bags = ViewBags::default();
        bags.view.insert_scalar(keys::VIEW_ID, view_id.as_str());
        bags.view.insert_scalar(keys::VIEW_START, clock.now_ms());

        let mut view = Self {
            bags,
            view_id,
            sequence: 0,
            monitors: EventBus::new(),
            clock,
            timing,
        };
        for monitor in monitors {
            view.attach(monitor);
        }
        debug!(view = %view.view_id, monitors = view.monitors.len(), "View created");
        view
    }

    fn attach(&mut self, mut monitor: Box<dyn Monitor>) {
        let mut ctx = MonitorContext::new(
            &mut self.bags.view,
            &self.bags.video,
            self.clock.as_ref(),
            &self.timing,
        );
        if let Err(e) = monitor.attach(&mut ctx) {
            warn!(monitor = monitor.name(), error = %e, "Monitor failed to attach");
        }
        // attach hooks only merge metrics
        drop(ctx.finish());
        self.monitors.add_listener(monitor);
    }

    pub fn view_id(&self) -> &str {
        &self.view_id
    }

    pub fn sequence(&self) -> i64 {
        self.sequence
    }

    pub fn bags(&self) -> &ViewBags {
        &self.bags
    }

    /// Processes `event` and everything it causes.
    pub fn dispatch(&mut self, event: Event) -> ViewDispatch {
        let mut out = ViewDispatch::default();
        let trigger = event.as_playback().cloned();
        if let ControlFlow::Break(request) = self.process(event, &mut out.escalated) {
            out.restart = Some(ViewRestart {
                carry: self.carry_data(),
                resume_playback: request.resume_playback,
                emit_playing: request.emit_playing,
                late_event: trigger,
            });
        }
        out
    }

    fn process(&mut self, event: Event, escalated: &mut Vec<Event>) -> ControlFlow<NewViewRequest> {
        match event {
            Event::Playback(playback) => {
                self.bags.view.update(&playback.view);
                self.run_monitors(&Event::Playback(playback), escalated)?;
            }
            Event::Trackable(mut trackable) => {
                self.sequence += 1;
                self.bags
                    .view
                    .insert_scalar(keys::VIEW_SEQUENCE_NUMBER, self.sequence);
                for bag in [
                    &self.bags.view,
                    &self.bags.video,
                    &self.bags.customer_video,
                    &self.bags.customer_view,
                    &self.bags.customer_viewer,
                    &self.bags.custom,
                ] {
                    trackable.stamp(bag);
                }
                let event = Event::Trackable(trackable);
                self.run_monitors(&event, escalated)?;
                escalated.push(event);
            }
            Event::ViewMetric(metric) => self.bags.view.update(&metric.view),
            Event::Session(session) => self.apply_session(&session),
            Event::Data(data) => self.apply_data(&data),
            Event::Error(_) => escalated.push(event),
            Event::Debug(note) => debug!(view = %self.view_id, message = %note.message, "Debug event"),
        }
        ControlFlow::Continue(())
    }

    fn run_monitors(
        &mut self,
        event: &Event,
        escalated: &mut Vec<Event>,
    ) -> ControlFlow<NewViewRequest> {
        let round = self.monitors.begin_round();
        let outcome = self.run_round(round.ids(), event, escalated);
        self.monitors.end_round(round);
        outcome
    }

    fn run_round(
        &mut self,
        ids: &[ListenerId],
        event: &Event,
        escalated: &mut Vec<Event>,
    ) -> ControlFlow<NewViewRequest> {
        for &id in ids {
            let Some(monitor) = self.monitors.get_mut(id) else {
                continue;
            };
            let mut ctx = MonitorContext::new(
                &mut self.bags.view,
                &self.bags.video,
                self.clock.as_ref(),
                &self.timing,
            );
            if let Err(e) = monitor.handle(event, &mut ctx) {
                warn!(monitor = monitor.name(), event = event.type_name(), error = %e, "Monitor failed");
            }
            let (emitted, new_view) = ctx.finish();
            if let Some(request) = new_view {
                return ControlFlow::Break(request);
            }
            for derived in emitted {
                self.process(derived, escalated)?;
            }
        }
        ControlFlow::Continue(())
    }

    fn apply_session(&mut self, session: &SessionDataEvent) {
        self.bags.customer_video.update(&session.customer_video);
        self.bags.customer_view.update(&session.customer_view);
        self.bags.custom.update(&session.custom);
    }

    fn apply_data(&mut self, data: &DataEvent) {
        self.bags.video.update(&data.video);
        self.bags.customer_video.update(&data.customer_video);
        self.bags.customer_view.update(&data.customer_view);
        self.bags.customer_viewer.update(&data.customer_viewer);
        self.bags.custom.update(&data.custom);
    }

    /// The metadata a replacement view starts from.
    pub fn carry_data(&self) -> DataEvent {
        DataEvent {
            video: self.bags.video.clone(),
            customer_video: self.bags.customer_video.clone(),
            customer_view: self.bags.customer_view.clone(),
            customer_viewer: self.bags.customer_viewer.clone(),
            custom: self.bags.custom.clone(),
            ..DataEvent::default()
        }
    }

    /// Detaches every monitor.
    pub fn teardown(&mut self) {
        debug!(view = %self.view_id, sequence = self.sequence, "View torn down");
        self.monitors.remove_all_listeners();
    }
}
