use playback_model::{Event, PlaybackEventKind, TrackableEvent};
use tracing::trace;

use super::{Monitor, MonitorContext};
use crate::Result;

/// Emits a `pulse` to the collector when playback has been active for a
/// while without anything else being reported.
#[derive(Debug, Default)]
pub struct RemoteHeartbeatMonitor {
    active: bool,
    last_reported_at: i64,
}

impl Monitor for RemoteHeartbeatMonitor {
    fn name(&self) -> &'static str {
        "remote_heartbeat"
    }

    fn handle(&mut self, event: &Event, ctx: &mut MonitorContext<'_>) -> Result<()> {
        let now = ctx.now();
        match event {
            Event::Trackable(_) => self.last_reported_at = now,
            Event::Playback(playback) => match playback.kind {
                PlaybackEventKind::InternalHeartbeat => {
                    if !self.active {
                        self.last_reported_at = 0;
                    }
                    self.active = true;
                }
                PlaybackEventKind::InternalHeartbeatEnd => self.active = false,
                _ => {}
            },
            _ => {}
        }

        if self.active
            && self.last_reported_at > 0
            && self.last_reported_at + ctx.timing().pulse_interval_ms < now
        {
            trace!(silent_ms = now - self.last_reported_at, "Emitting pulse");
            self.last_reported_at = now;
            ctx.emit(TrackableEvent::new(PlaybackEventKind::Pulse.as_ref()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::testing::{Harness, kinds, playback};

    #[test]
    fn pulses_after_ten_quiet_seconds() {
        let mut harness = Harness::new();
        let mut monitor = RemoteHeartbeatMonitor::default();

        harness.run(&mut monitor, &playback(PlaybackEventKind::InternalHeartbeat));
        harness.run(&mut monitor, &Event::Trackable(TrackableEvent::new("playing")));

        harness.clock.advance(10_000);
        let (emitted, _) = harness.run(&mut monitor, &playback(PlaybackEventKind::InternalHeartbeat));
        assert!(emitted.is_empty());

        harness.clock.advance(1);
        let (emitted, _) = harness.run(&mut monitor, &playback(PlaybackEventKind::InternalHeartbeat));
        assert_eq!(kinds(&emitted), ["pulse"]);
        assert!(emitted[0].is_trackable());
    }

    #[test]
    fn no_pulse_while_inactive() {
        let mut harness = Harness::new();
        let mut monitor = RemoteHeartbeatMonitor::default();

        harness.run(&mut monitor, &Event::Trackable(TrackableEvent::new("pause")));
        harness.clock.advance(60_000);
        let (emitted, _) = harness.run(&mut monitor, &playback(PlaybackEventKind::TimeUpdate));
        assert!(emitted.is_empty());

        // the first heartbeat of a new activity period clears the timer
        let (emitted, _) = harness.run(&mut monitor, &playback(PlaybackEventKind::InternalHeartbeat));
        assert!(emitted.is_empty());
    }
}
