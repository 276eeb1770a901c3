use playback_model::{Event, keys};

use super::{Monitor, MonitorContext, metric};
use crate::Result;

/// Stamps the wall-clock time of every playback event onto the view.
#[derive(Debug, Default)]
pub struct ViewerTimeMonitor;

impl Monitor for ViewerTimeMonitor {
    fn name(&self) -> &'static str {
        "viewer_time"
    }

    fn handle(&mut self, event: &Event, ctx: &mut MonitorContext<'_>) -> Result<()> {
        let Some(playback) = event.as_playback() else {
            return Ok(());
        };
        if playback.kind.is_heartbeat() {
            return Ok(());
        }
        let mut delta = metric();
        delta.put(keys::VIEWER_TIME, ctx.now())?;
        ctx.emit_metric(delta);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::testing::{Harness, playback};
    use playback_model::{PlaybackEventKind, ViewFields};

    #[test]
    fn stamps_now_except_on_heartbeats() {
        let mut harness = Harness::new();
        let mut monitor = ViewerTimeMonitor;

        harness.run(&mut monitor, &playback(PlaybackEventKind::Play));
        assert_eq!(harness.view.viewer_time(), Some(1_000_000));

        harness.clock.advance(250);
        harness.run(&mut monitor, &playback(PlaybackEventKind::InternalHeartbeat));
        assert_eq!(harness.view.viewer_time(), Some(1_000_000));

        harness.run(&mut monitor, &playback(PlaybackEventKind::TimeUpdate));
        assert_eq!(harness.view.viewer_time(), Some(1_000_250));
    }
}
