use playback_model::{Event, PlaybackEventKind, ViewFields, keys};

use super::{Monitor, MonitorContext, metric};
use crate::Result;

/// Rebuffering count, duration, frequency and share of watch time.
#[derive(Debug, Default)]
pub struct RebufferMonitor {
    buffering: bool,
    count: i64,
    duration: i64,
    anchor: i64,
    watch_time: i64,
}

impl RebufferMonitor {
    fn report(&mut self, ctx: &mut MonitorContext<'_>) -> Result<()> {
        if self.buffering {
            let now = ctx.view().viewer_time().unwrap_or(0);
            if now - self.anchor > 0 {
                self.duration += now - self.anchor;
                self.anchor = now;
            }
        }

        let mut delta = metric();
        delta.put(keys::VIEW_REBUFFER_COUNT, self.count)?;
        delta.put(keys::VIEW_REBUFFER_DURATION, self.duration)?;
        if self.watch_time > 0 {
            let watch = self.watch_time as f64;
            delta.put_f64(keys::VIEW_REBUFFER_FREQUENCY, self.count as f64 / watch)?;
            delta.put_f64(keys::VIEW_REBUFFER_PERCENTAGE, self.duration as f64 / watch)?;
        }
        ctx.emit_metric(delta);
        Ok(())
    }
}

impl Monitor for RebufferMonitor {
    fn name(&self) -> &'static str {
        "rebuffer"
    }

    fn handle(&mut self, event: &Event, ctx: &mut MonitorContext<'_>) -> Result<()> {
        let Some(playback) = event.as_playback() else {
            return Ok(());
        };
        if let Some(watch_time) = ctx.view().watch_time() {
            self.watch_time = watch_time;
        }

        match playback.kind {
            PlaybackEventKind::Buffering => {
                if !self.buffering {
                    self.buffering = true;
                    self.count += 1;
                    self.anchor = ctx.view().viewer_time().unwrap_or(0);
                    self.report(ctx)?;
                }
            }
            PlaybackEventKind::Buffered => {
                self.report(ctx)?;
                self.buffering = false;
            }
            PlaybackEventKind::InternalHeartbeat | PlaybackEventKind::InternalHeartbeatEnd => {
                self.report(ctx)?;
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

    fn at(harness: &mut Harness, viewer_time: i64, watch_time: i64) {
        harness.view.put(keys::VIEWER_TIME, viewer_time).unwrap();
        harness.view.put(keys::VIEW_WATCH_TIME, watch_time).unwrap();
    }

    #[test]
    fn single_stall() {
        let mut harness = Harness::new();
        let mut monitor = RebufferMonitor::default();

        at(&mut harness, 10_000, 4_000);
        harness.run(&mut monitor, &playback(PlaybackEventKind::Buffering));
        assert_eq!(harness.view.get_i64(keys::VIEW_REBUFFER_COUNT), Some(1));
        assert_eq!(harness.view.get_i64(keys::VIEW_REBUFFER_DURATION), Some(0));

        at(&mut harness, 11_000, 4_000);
        harness.run(&mut monitor, &playback(PlaybackEventKind::Buffered));
        assert_eq!(harness.view.get_i64(keys::VIEW_REBUFFER_DURATION), Some(1_000));
        assert_eq!(harness.view.get_f64(keys::VIEW_REBUFFER_PERCENTAGE), Some(0.25));
        assert_eq!(harness.view.get_f64(keys::VIEW_REBUFFER_FREQUENCY), Some(0.00025));

        at(&mut harness, 15_000, 8_000);
        harness.run(&mut monitor, &playback(PlaybackEventKind::InternalHeartbeat));
        assert_eq!(harness.view.get_i64(keys::VIEW_REBUFFER_DURATION), Some(1_000));
        assert_eq!(harness.view.get_f64(keys::VIEW_REBUFFER_PERCENTAGE), Some(0.125));
    }

    #[test]
    fn heartbeats_during_a_stall_extend_it() {
        let mut harness = Harness::new();
        let mut monitor = RebufferMonitor::default();

        at(&mut harness, 1_000, 0);
        harness.run(&mut monitor, &playback(PlaybackEventKind::Buffering));
        harness.run(&mut monitor, &playback(PlaybackEventKind::Buffering));
        at(&mut harness, 1_500, 0);
        harness.run(&mut monitor, &playback(PlaybackEventKind::InternalHeartbeat));
        at(&mut harness, 2_000, 0);
        harness.run(&mut monitor, &playback(PlaybackEventKind::Buffered));

        assert_eq!(harness.view.get_i64(keys::VIEW_REBUFFER_COUNT), Some(1));
        assert_eq!(harness.view.get_i64(keys::VIEW_REBUFFER_DURATION), Some(1_000));
        assert!(harness.view.get(keys::VIEW_REBUFFER_PERCENTAGE).is_none());
    }
}
