//! Stateful metric processors attached to every view.
//!
//! A monitor sees each event the view processes, reads the live view and
//! video bags through [`MonitorContext`], and reacts by merging metrics into
//! the view, emitting derived events (processed depth-first before the next
//! monitor runs) or asking for a brand new view.

mod adaptive_scaling;
mod delayed_resume;
mod local_heartbeat;
mod playback_time;
mod rebuffer;
mod remote_event;
mod remote_heartbeat;
mod request_metrics;
mod seek;
mod startup_frame;
mod state;
mod viewer_time;
mod watch_time;

pub use adaptive_scaling::AdaptiveScalingMonitor;
pub use delayed_resume::DelayedResumeMonitor;
pub use local_heartbeat::LocalHeartbeatMonitor;
pub use playback_time::PlaybackTimeMonitor;
pub use rebuffer::RebufferMonitor;
pub use remote_event::RemoteEventMonitor;
pub use remote_heartbeat::RemoteHeartbeatMonitor;
pub use request_metrics::{RequestCounts, RequestMetricsMonitor};
pub use seek::SeekMonitor;
pub use startup_frame::StartupFrameMonitor;
pub use state::PlaybackStateMonitor;
pub use viewer_time::ViewerTimeMonitor;
pub use watch_time::WatchTimeMonitor;

use playback_model::{AttributeBag, EntityKind, Event};

use crate::Result;
use crate::clock::Clock;
use crate::config::TimingConfig;

pub trait Monitor: Send {
    fn name(&self) -> &'static str;

    /// Called once when the monitor joins a view.
    fn attach(&mut self, _ctx: &mut MonitorContext<'_>) -> Result<()> {
        Ok(())
    }

    fn handle(&mut self, event: &Event, ctx: &mut MonitorContext<'_>) -> Result<()>;
}

/// Asks the owning player to replace the current view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewViewRequest {
    /// Synthesize `play` in the new view before the late event.
    pub resume_playback: bool,
    /// Also synthesize `playing` after `play`.
    pub emit_playing: bool,
}

pub struct MonitorContext<'a> {
    view: &'a mut AttributeBag,
    video: &'a AttributeBag,
    clock: &'a dyn Clock,
    timing: &'a TimingConfig,
    emitted: Vec<Event>,
    new_view: Option<NewViewRequest>,
}

impl<'a> MonitorContext<'a> {
    pub fn new(
        view: &'a mut AttributeBag,
        video: &'a AttributeBag,
        clock: &'a dyn Clock,
        timing: &'a TimingConfig,
    ) -> Self {
        Self {
            view,
            video,
            clock,
            timing,
            emitted: Vec::new(),
            new_view: None,
        }
    }

    pub fn now(&self) -> i64 {
        self.clock.now_ms()
    }

    /// The live view bag, including metrics merged earlier in this dispatch.
    pub fn view(&self) -> &AttributeBag {
        self.view
    }

    pub fn video(&self) -> &AttributeBag {
        self.video
    }

    pub fn timing(&self) -> &TimingConfig {
        self.timing
    }

    /// Queues a derived event for depth-first processing.
    pub fn emit(&mut self, event: impl Into<Event>) {
        self.emitted.push(event.into());
    }

    /// Merges a view metric delta into the live view right away.
    pub fn emit_metric(&mut self, delta: AttributeBag) {
        self.view.update(&delta);
    }

    pub fn request_new_view(&mut self, request: NewViewRequest) {
        self.new_view = Some(request);
    }

    pub fn finish(self) -> (Vec<Event>, Option<NewViewRequest>) {
        (self.emitted, self.new_view)
    }
}

/// Empty view delta for a monitor to fill.
pub(crate) fn metric() -> AttributeBag {
    AttributeBag::new(EntityKind::View)
}

/// The monitor set every view starts with, in attach order.
pub fn standard_monitors() -> Vec<Box<dyn Monitor>> {
    vec![
        Box::new(DelayedResumeMonitor::default()),
        Box::new(PlaybackStateMonitor::default()),
        Box::new(ViewerTimeMonitor),
        Box::new(AdaptiveScalingMonitor::default()),
        Box::new(SeekMonitor::default()),
        Box::new(LocalHeartbeatMonitor::default()),
        Box::new(PlaybackTimeMonitor::default()),
        Box::new(WatchTimeMonitor::default()),
        Box::new(StartupFrameMonitor::default()),
        Box::new(RebufferMonitor::default()),
        Box::new(RequestMetricsMonitor::default()),
        Box::new(RemoteEventMonitor),
        Box::new(RemoteHeartbeatMonitor::default()),
    ]
}
