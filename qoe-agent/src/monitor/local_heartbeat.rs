use playback_model::{Event, PlaybackEventKind, PlayerFields};

use super::{Monitor, MonitorContext};
use crate::Result;

/// Turns host playback activity into internal heartbeats that drive the
/// time-based monitors further down the pipeline.
#[derive(Debug, Default)]
pub struct LocalHeartbeatMonitor {
    active: bool,
}

impl Monitor for LocalHeartbeatMonitor {
    fn name(&self) -> &'static str {
        "local_heartbeat"
    }

    fn handle(&mut self, event: &Event, ctx: &mut MonitorContext<'_>) -> Result<()> {
        let Some(playback) = event.as_playback() else {
            return Ok(());
        };
        match playback.kind {
            PlaybackEventKind::TimeUpdate
            | PlaybackEventKind::Buffering
            | PlaybackEventKind::Buffered => {
                if self.active {
                    ctx.emit(playback.derive(PlaybackEventKind::InternalHeartbeat));
                }
            }
            PlaybackEventKind::Playing => {
                self.active = true;
                ctx.emit(playback.derive(PlaybackEventKind::InternalHeartbeat));
            }
            PlaybackEventKind::Play | PlaybackEventKind::Seeking => {
                if !self.active {
                    self.active = true;
                    ctx.emit(playback.derive(PlaybackEventKind::InternalHeartbeat));
                }
            }
            PlaybackEventKind::Pause
            | PlaybackEventKind::Ended
            | PlaybackEventKind::ViewCompleted
            | PlaybackEventKind::Error => self.stop(playback, ctx),
            PlaybackEventKind::Seeked if playback.player.is_paused().unwrap_or(false) => {
                self.stop(playback, ctx)
            }
            _ => {}
        }
        Ok(())
    }
}

impl LocalHeartbeatMonitor {
    fn stop(&mut self, playback: &playback_model::PlaybackEvent, ctx: &mut MonitorContext<'_>) {
        if self.active {
            ctx.emit(playback.derive(PlaybackEventKind::InternalHeartbeatEnd));
        }
        self.active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::testing::{Harness, kinds, playback};
    use playback_model::{AttributeBag, EntityKind, PlaybackEvent, keys};

    #[test]
    fn heartbeats_follow_activity() {
        let mut harness = Harness::new();
        let mut monitor = LocalHeartbeatMonitor::default();

        let (emitted, _) = harness.run(&mut monitor, &playback(PlaybackEventKind::TimeUpdate));
        assert!(emitted.is_empty());

        let (emitted, _) = harness.run(&mut monitor, &playback(PlaybackEventKind::Play));
        assert_eq!(kinds(&emitted), ["internalHeartbeat"]);
        let (emitted, _) = harness.run(&mut monitor, &playback(PlaybackEventKind::Playing));
        assert_eq!(kinds(&emitted), ["internalHeartbeat"]);
        let (emitted, _) = harness.run(&mut monitor, &playback(PlaybackEventKind::TimeUpdate));
        assert_eq!(kinds(&emitted), ["internalHeartbeat"]);

        let (emitted, _) = harness.run(&mut monitor, &playback(PlaybackEventKind::Pause));
        assert_eq!(kinds(&emitted), ["internalHeartbeatEnd"]);
        let (emitted, _) = harness.run(&mut monitor, &playback(PlaybackEventKind::Pause));
        assert!(emitted.is_empty());
    }

    #[test]
    fn seeked_ends_heartbeat_only_while_paused() {
        let mut harness = Harness::new();
        let mut monitor = LocalHeartbeatMonitor::default();
        harness.run(&mut monitor, &playback(PlaybackEventKind::Playing));

        let (emitted, _) = harness.run(&mut monitor, &playback(PlaybackEventKind::Seeked));
        assert!(emitted.is_empty());

        let mut paused = AttributeBag::new(EntityKind::Player);
        paused.put(keys::PLAYER_IS_PAUSED, true).unwrap();
        let seeked = Event::Playback(PlaybackEvent::new(PlaybackEventKind::Seeked).with_player(paused));
        let (emitted, _) = harness.run(&mut monitor, &seeked);
        assert_eq!(kinds(&emitted), ["internalHeartbeatEnd"]);
    }
}
