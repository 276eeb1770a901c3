use playback_model::{Event, PlaybackEventKind, ViewFields, keys};

use super::{Monitor, MonitorContext, metric};
use crate::Result;

/// Wall-clock time the viewer spent with playback active.
#[derive(Debug, Default)]
pub struct WatchTimeMonitor {
    last_viewer_time: i64,
    total: i64,
}

impl WatchTimeMonitor {
    fn accumulate(&mut self, ctx: &mut MonitorContext<'_>) -> Result<()> {
        let now = ctx.view().viewer_time().unwrap_or(0);
        if self.last_viewer_time > 0 && now > self.last_viewer_time {
            self.total += now - self.last_viewer_time;
            let mut delta = metric();
            delta.put(keys::VIEW_WATCH_TIME, self.total)?;
            ctx.emit_metric(delta);
        }
        self.last_viewer_time = self.last_viewer_time.max(now);
        Ok(())
    }
}

impl Monitor for WatchTimeMonitor {
    fn name(&self) -> &'static str {
        "watch_time"
    }

    fn attach(&mut self, ctx: &mut MonitorContext<'_>) -> Result<()> {
        let mut delta = metric();
        delta.put(keys::VIEW_WATCH_TIME, 0)?;
        ctx.emit_metric(delta);
        Ok(())
    }

    fn handle(&mut self, event: &Event, ctx: &mut MonitorContext<'_>) -> Result<()> {
        let Some(playback) = event.as_playback() else {
            return Ok(());
        };
        match playback.kind {
            PlaybackEventKind::InternalHeartbeat => self.accumulate(ctx)?,
            PlaybackEventKind::InternalHeartbeatEnd => {
                self.accumulate(ctx)?;
                self.last_viewer_time = 0;
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::testing::{Harness, playback};

    fn heartbeat_at(harness: &mut Harness, monitor: &mut WatchTimeMonitor, kind: PlaybackEventKind, time: i64) {
        harness.view.put(keys::VIEWER_TIME, time).unwrap();
        harness.run(monitor, &playback(kind));
    }

    #[test]
    fn accumulates_between_heartbeats_only() {
        let mut harness = Harness::new();
        let mut monitor = WatchTimeMonitor::default();
        harness.attach(&mut monitor);
        assert_eq!(harness.view.watch_time(), Some(0));

        heartbeat_at(&mut harness, &mut monitor, PlaybackEventKind::InternalHeartbeat, 1_000);
        heartbeat_at(&mut harness, &mut monitor, PlaybackEventKind::InternalHeartbeat, 1_400);
        heartbeat_at(&mut harness, &mut monitor, PlaybackEventKind::InternalHeartbeatEnd, 2_000);
        assert_eq!(harness.view.watch_time(), Some(1_000));

        // paused for a minute
        heartbeat_at(&mut harness, &mut monitor, PlaybackEventKind::InternalHeartbeat, 62_000);
        heartbeat_at(&mut harness, &mut monitor, PlaybackEventKind::InternalHeartbeat, 62_500);
        assert_eq!(harness.view.watch_time(), Some(1_500));
    }

    #[test]
    fn viewer_time_going_backwards_adds_nothing() {
        let mut harness = Harness::new();
        let mut monitor = WatchTimeMonitor::default();
        harness.attach(&mut monitor);

        heartbeat_at(&mut harness, &mut monitor, PlaybackEventKind::InternalHeartbeat, 5_000);
        heartbeat_at(&mut harness, &mut monitor, PlaybackEventKind::InternalHeartbeat, 4_000);
        heartbeat_at(&mut harness, &mut monitor, PlaybackEventKind::InternalHeartbeat, 5_500);
        assert_eq!(harness.view.watch_time(), Some(500));
    }
}
