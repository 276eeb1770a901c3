use playback_model::{Event, PlaybackEventKind, PlayerFields, keys};
use tracing::debug;

use super::{Monitor, MonitorContext, metric};
use crate::{Error, Result};

/// Content playback time, accumulated from playhead progress between
/// heartbeats. Jumps larger than the configured limit are treated as
/// discontinuities and not counted.
#[derive(Debug)]
pub struct PlaybackTimeMonitor {
    last_playhead: i64,
    max_playhead: i64,
    total: i64,
}

impl Default for PlaybackTimeMonitor {
    fn default() -> Self {
        Self {
            last_playhead: -1,
            max_playhead: 0,
            total: 0,
        }
    }
}

impl PlaybackTimeMonitor {
    fn advance(&mut self, playhead: Option<i64>, ctx: &mut MonitorContext<'_>) -> Result<()> {
        let Some(playhead) = playhead else {
            return Ok(());
        };
        if self.last_playhead >= 0 && playhead > self.last_playhead {
            let progress = playhead - self.last_playhead;
            if progress <= ctx.timing().playhead_jump_limit_ms {
                self.total += progress;
                let mut delta = metric();
                delta.put(keys::VIEW_CONTENT_PLAYBACK_TIME, self.total)?;
                delta.put(keys::VIEW_MAX_PLAYHEAD_POSITION, self.max_playhead)?;
                ctx.emit_metric(delta);
            } else {
                let skipped = Error::Discontinuity { jump_ms: progress };
                debug!(error = %skipped, "Playhead progress not counted");
            }
        }
        self.last_playhead = playhead;
        Ok(())
    }
}

impl Monitor for PlaybackTimeMonitor {
    fn name(&self) -> &'static str {
        "playback_time"
    }

    fn handle(&mut self, event: &Event, ctx: &mut MonitorContext<'_>) -> Result<()> {
        let Some(playback) = event.as_playback() else {
            return Ok(());
        };
        let playhead = playback.player.playhead_time();
        if let Some(playhead) = playhead {
            self.max_playhead = self.max_playhead.max(playhead);
        }

        match playback.kind {
            PlaybackEventKind::InternalHeartbeat => self.advance(playhead, ctx)?,
            PlaybackEventKind::InternalHeartbeatEnd | PlaybackEventKind::Seeking => {
                self.advance(playhead, ctx)?;
                self.last_playhead = -1;
            }
            PlaybackEventKind::Seeked => {
                if let Some(playhead) = playhead {
                    self.last_playhead = playhead;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::testing::{Harness, playback_at};

    #[test]
    fn counts_steady_progress() {
        let mut harness = Harness::new();
        let mut monitor = PlaybackTimeMonitor::default();

        for playhead in [0, 250, 500, 750, 1_000] {
            harness.run(&mut monitor, &playback_at(PlaybackEventKind::InternalHeartbeat, playhead));
        }
        assert_eq!(harness.view.get_i64(keys::VIEW_CONTENT_PLAYBACK_TIME), Some(1_000));
        assert_eq!(harness.view.get_i64(keys::VIEW_MAX_PLAYHEAD_POSITION), Some(1_000));
    }

    #[test]
    fn large_jumps_are_discontinuities() {
        let mut harness = Harness::new();
        let mut monitor = PlaybackTimeMonitor::default();

        harness.run(&mut monitor, &playback_at(PlaybackEventKind::InternalHeartbeat, 0));
        harness.run(&mut monitor, &playback_at(PlaybackEventKind::InternalHeartbeat, 5_000));
        assert!(harness.view.get(keys::VIEW_CONTENT_PLAYBACK_TIME).is_none());

        harness.run(&mut monitor, &playback_at(PlaybackEventKind::InternalHeartbeat, 5_500));
        assert_eq!(harness.view.get_i64(keys::VIEW_CONTENT_PLAYBACK_TIME), Some(500));
    }

    #[test]
    fn seek_restarts_from_the_new_position() {
        let mut harness = Harness::new();
        let mut monitor = PlaybackTimeMonitor::default();

        harness.run(&mut monitor, &playback_at(PlaybackEventKind::InternalHeartbeat, 1_000));
        harness.run(&mut monitor, &playback_at(PlaybackEventKind::Seeking, 1_200));
        harness.run(&mut monitor, &playback_at(PlaybackEventKind::InternalHeartbeat, 60_000));
        assert_eq!(harness.view.get_i64(keys::VIEW_CONTENT_PLAYBACK_TIME), Some(200));

        harness.run(&mut monitor, &playback_at(PlaybackEventKind::Seeked, 90_000));
        harness.run(&mut monitor, &playback_at(PlaybackEventKind::InternalHeartbeat, 90_300));
        assert_eq!(harness.view.get_i64(keys::VIEW_CONTENT_PLAYBACK_TIME), Some(500));
        assert_eq!(harness.view.get_i64(keys::VIEW_MAX_PLAYHEAD_POSITION), Some(90_300));
    }
}
