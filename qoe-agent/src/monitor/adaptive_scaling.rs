use playback_model::{Event, PlaybackEventKind, PlayerFields, VideoFields, keys};

use super::{Monitor, MonitorContext, metric};
use crate::Result;

/// Tracks how far the rendered size strays from the source resolution,
/// weighted by the playback time spent at each size.
#[derive(Debug, Default)]
pub struct AdaptiveScalingMonitor {
    last_playhead: Option<i64>,
    player_width: i64,
    player_height: i64,
    source_width: i64,
    source_height: i64,
    max_upscale: f64,
    max_downscale: f64,
    total_playback: i64,
    total_upscale: f64,
    total_downscale: f64,
}

impl AdaptiveScalingMonitor {
    fn dimensions_known(&self) -> bool {
        self.player_width > 0
            && self.player_height > 0
            && self.source_width > 0
            && self.source_height > 0
    }

    fn accumulate(&mut self, playhead: i64, ctx: &mut MonitorContext<'_>) -> Result<()> {
        let Some(last) = self.last_playhead.take() else {
            return Ok(());
        };
        let elapsed = playhead - last;
        if elapsed < 0 || !self.dimensions_known() {
            return Ok(());
        }

        let ratio = f64::min(
            self.player_width as f64 / self.source_width as f64,
            self.player_height as f64 / self.source_height as f64,
        );
        let upscale = (ratio - 1.0).max(0.0);
        let downscale = (1.0 - ratio).max(0.0);

        self.max_upscale = self.max_upscale.max(upscale);
        self.max_downscale = self.max_downscale.max(downscale);
        self.total_playback += elapsed;
        self.total_upscale += upscale * elapsed as f64;
        self.total_downscale += downscale * elapsed as f64;

        let mut delta = metric();
        delta.put_f64(keys::VIEW_MAX_UPSCALE_PERCENTAGE, self.max_upscale)?;
        delta.put_f64(keys::VIEW_MAX_DOWNSCALE_PERCENTAGE, self.max_downscale)?;
        delta.put(keys::VIEW_TOTAL_CONTENT_PLAYBACK_TIME, self.total_playback)?;
        delta.put_f64(keys::VIEW_TOTAL_UPSCALING, self.total_upscale)?;
        delta.put_f64(keys::VIEW_TOTAL_DOWNSCALING, self.total_downscale)?;
        ctx.emit_metric(delta);
        Ok(())
    }
}

impl Monitor for AdaptiveScalingMonitor {
    fn name(&self) -> &'static str {
        "adaptive_scaling"
    }

    fn handle(&mut self, event: &Event, ctx: &mut MonitorContext<'_>) -> Result<()> {
        let Some(playback) = event.as_playback() else {
            return Ok(());
        };
        let playhead = playback.player.playhead_time();

        if matches!(
            playback.kind,
            PlaybackEventKind::Pause
                | PlaybackEventKind::Buffering
                | PlaybackEventKind::Seeking
                | PlaybackEventKind::TimeUpdate
                | PlaybackEventKind::ViewCompleted
                | PlaybackEventKind::Error
        ) {
            if let Some(playhead) = playhead {
                self.accumulate(playhead, ctx)?;
            }
        }

        if matches!(
            playback.kind,
            PlaybackEventKind::Playing | PlaybackEventKind::TimeUpdate
        ) {
            self.last_playhead = playhead;
            self.player_width = playback.player.player_width().unwrap_or(0);
            self.player_height = playback.player.player_height().unwrap_or(0);
            self.source_width = ctx.video().source_width().unwrap_or(0);
            self.source_height = ctx.video().source_height().unwrap_or(0);
        }
        Ok(())
    }
}
