use playback_model::{Event, PlaybackEventKind};
use tracing::info;

use super::{Monitor, MonitorContext, NewViewRequest};
use crate::Result;

/// Starts a fresh view when an event arrives after a long stretch of silence.
#[derive(Debug, Default)]
pub struct DelayedResumeMonitor {
    last_event_at: i64,
    heartbeat_active: bool,
}

impl Monitor for DelayedResumeMonitor {
    fn name(&self) -> &'static str {
        "delayed_resume"
    }

    fn attach(&mut self, ctx: &mut MonitorContext<'_>) -> Result<()> {
        self.last_event_at = ctx.now();
        Ok(())
    }

    fn handle(&mut self, event: &Event, ctx: &mut MonitorContext<'_>) -> Result<()> {
        let Some(playback) = event.as_playback() else {
            return Ok(());
        };
        match playback.kind {
            PlaybackEventKind::InternalHeartbeat => {
                self.heartbeat_active = true;
                return Ok(());
            }
            PlaybackEventKind::InternalHeartbeatEnd => {
                self.heartbeat_active = false;
                return Ok(());
            }
            _ => {}
        }

        let now = ctx.now();
        let idle = now - self.last_event_at;
        if idle >= ctx.timing().resume_threshold_ms && playback.kind != PlaybackEventKind::ViewInit
        {
            info!(idle_ms = idle, event = %playback.kind, "Resuming after a long pause; starting a new view");
            ctx.request_new_view(NewViewRequest {
                resume_playback: self.heartbeat_active && playback.kind != PlaybackEventKind::Play,
                emit_playing: playback.kind != PlaybackEventKind::Playing,
            });
        }
        self.last_event_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::testing::{Harness, playback};

    const HOUR: i64 = 3_600_000;

    #[test]
    fn quiet_hour_requests_a_new_view() {
        let mut harness = Harness::new();
        let mut monitor = DelayedResumeMonitor::default();
        harness.attach(&mut monitor);

        harness.run(&mut monitor, &playback(PlaybackEventKind::InternalHeartbeat));
        harness.clock.advance(HOUR);
        let (_, request) = harness.run(&mut monitor, &playback(PlaybackEventKind::TimeUpdate));
        assert_eq!(
            request,
            Some(NewViewRequest {
                resume_playback: true,
                emit_playing: true,
            })
        );
    }

    #[test]
    fn short_gaps_and_view_init_are_ignored() {
        let mut harness = Harness::new();
        let mut monitor = DelayedResumeMonitor::default();
        harness.attach(&mut monitor);

        harness.clock.advance(HOUR - 1);
        let (_, request) = harness.run(&mut monitor, &playback(PlaybackEventKind::Pause));
        assert!(request.is_none());

        harness.clock.advance(HOUR);
        let (_, request) = harness.run(&mut monitor, &playback(PlaybackEventKind::ViewInit));
        assert!(request.is_none());
    }

    #[test]
    fn heartbeats_do_not_reset_the_idle_timer() {
        let mut harness = Harness::new();
        let mut monitor = DelayedResumeMonitor::default();
        harness.attach(&mut monitor);

        harness.clock.advance(HOUR / 2);
        harness.run(&mut monitor, &playback(PlaybackEventKind::InternalHeartbeat));
        harness.run(&mut monitor, &playback(PlaybackEventKind::InternalHeartbeatEnd));
        harness.clock.advance(HOUR / 2);
        let (_, request) = harness.run(&mut monitor, &playback(PlaybackEventKind::Play));
        assert_eq!(
            request,
            Some(NewViewRequest {
                resume_playback: false,
                emit_playing: true,
            })
        );
    }
}
