use playback_model::{Event, PlaybackEventKind};
use tracing::debug;

use super::{Monitor, MonitorContext};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Idle,
    Ready,
    Playing,
}

/// Announces the view to the collector on the first `play` after `viewInit`.
#[derive(Debug, Default)]
pub struct PlaybackStateMonitor {
    phase: Phase,
}

impl Monitor for PlaybackStateMonitor {
    fn name(&self) -> &'static str {
        "playback_state"
    }

    fn handle(&mut self, event: &Event, ctx: &mut MonitorContext<'_>) -> Result<()> {
        let Some(playback) = event.as_playback() else {
            return Ok(());
        };
        match playback.kind {
            PlaybackEventKind::ViewInit => self.phase = Phase::Ready,
            PlaybackEventKind::Play if self.phase == Phase::Ready => {
                self.phase = Phase::Playing;
                debug!("View begins");
                ctx.emit(playback.derive(PlaybackEventKind::ViewBegin));
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::testing::{Harness, kinds, playback};

    #[test]
    fn first_play_after_init_begins_the_view() {
        let mut harness = Harness::new();
        let mut monitor = PlaybackStateMonitor::default();

        let (emitted, _) = harness.run(&mut monitor, &playback(PlaybackEventKind::Play));
        assert!(emitted.is_empty());

        harness.run(&mut monitor, &playback(PlaybackEventKind::ViewInit));
        let (emitted, _) = harness.run(&mut monitor, &playback(PlaybackEventKind::Play));
        assert_eq!(kinds(&emitted), ["viewBegin"]);

        let (emitted, _) = harness.run(&mut monitor, &playback(PlaybackEventKind::Play));
        assert!(emitted.is_empty());
    }
}
