use playback_model::{Event, PlaybackEventKind, ViewFields, keys};

use super::{Monitor, MonitorContext, metric};
use crate::Result;

/// Time to first frame, read off the watch time at the first `playing`.
#[derive(Debug, Default)]
pub struct StartupFrameMonitor {
    reported: bool,
}

impl Monitor for StartupFrameMonitor {
    fn name(&self) -> &'static str {
        "startup_frame"
    }

    fn handle(&mut self, event: &Event, ctx: &mut MonitorContext<'_>) -> Result<()> {
        let Some(playback) = event.as_playback() else {
            return Ok(());
        };
        if self.reported
            || playback.kind != PlaybackEventKind::Playing
            || ctx.view().program_changed()
        {
            return Ok(());
        }
        self.reported = true;
        let mut delta = metric();
        delta.put(keys::VIEW_TIME_TO_FIRST_FRAME, ctx.view().watch_time().unwrap_or(0))?;
        ctx.emit_metric(delta);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::testing::{Harness, playback};

    #[test]
    fn reports_once() {
        let mut harness = Harness::new();
        let mut monitor = StartupFrameMonitor::default();

        harness.view.put(keys::VIEW_WATCH_TIME, 1_000).unwrap();
        harness.run(&mut monitor, &playback(PlaybackEventKind::Playing));
        harness.view.put(keys::VIEW_WATCH_TIME, 9_000).unwrap();
        harness.run(&mut monitor, &playback(PlaybackEventKind::Playing));

        assert_eq!(harness.view.get_i64(keys::VIEW_TIME_TO_FIRST_FRAME), Some(1_000));
    }

    #[test]
    fn program_change_views_are_skipped() {
        let mut harness = Harness::new();
        let mut monitor = StartupFrameMonitor::default();
        harness.view.put(keys::VIEW_PROGRAM_CHANGED, true).unwrap();
        harness.run(&mut monitor, &playback(PlaybackEventKind::Playing));
        assert!(harness.view.get(keys::VIEW_TIME_TO_FIRST_FRAME).is_none());
    }
}
