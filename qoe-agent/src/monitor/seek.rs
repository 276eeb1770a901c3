use playback_model::{Event, PlaybackEventKind, ViewFields, keys};

use super::{Monitor, MonitorContext, metric};
use crate::Result;

/// Counts seeks and the viewer time spent in them.
#[derive(Debug, Default)]
pub struct SeekMonitor {
    seeking: bool,
    started_at: i64,
    count: i64,
    total_duration: i64,
    max_duration: i64,
}

impl Monitor for SeekMonitor {
    fn name(&self) -> &'static str {
        "seek"
    }

    fn handle(&mut self, event: &Event, ctx: &mut MonitorContext<'_>) -> Result<()> {
        let Some(playback) = event.as_playback() else {
            return Ok(());
        };
        match playback.kind {
            PlaybackEventKind::Seeking => {
                if !self.seeking {
                    self.seeking = true;
                    ctx.emit(
                        playback
                            .derive(PlaybackEventKind::Seeking)
                            .with_suppressed(false),
                    );
                }
                self.started_at = ctx.view().viewer_time().unwrap_or(0);
            }
            PlaybackEventKind::Seeked => {
                if self.started_at > 0 {
                    let duration = ctx.view().viewer_time().unwrap_or(0) - self.started_at;
                    self.count += 1;
                    self.total_duration += duration;
                    self.max_duration = self.max_duration.max(duration);

                    let mut delta = metric();
                    delta.put(keys::VIEW_SEEK_COUNT, self.count)?;
                    delta.put(keys::VIEW_SEEK_DURATION, self.total_duration)?;
                    delta.put(keys::VIEW_MAX_SEEK_TIME, self.max_duration)?;
                    ctx.emit_metric(delta);
                }
                self.seeking = false;
                self.started_at = 0;
            }
            PlaybackEventKind::ViewCompleted => self.seeking = false,
            _ => {}
        }
        Ok(())
    }
}
