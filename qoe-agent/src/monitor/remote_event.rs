use playback_model::{Event, TrackableEvent};

use super::{Monitor, MonitorContext};
use crate::Result;

/// Converts reportable playback events into collector-bound trackable events.
#[derive(Debug, Default)]
pub struct RemoteEventMonitor;

impl Monitor for RemoteEventMonitor {
    fn name(&self) -> &'static str {
        "remote_event"
    }

    fn handle(&mut self, event: &Event, ctx: &mut MonitorContext<'_>) -> Result<()> {
        let Some(playback) = event.as_playback() else {
            return Ok(());
        };
        if playback.suppressed || !playback.kind.is_reportable() {
            return Ok(());
        }
        let mut trackable = TrackableEvent::new(playback.type_name());
        if let Some(bandwidth) = &playback.bandwidth {
            trackable.stamp(bandwidth);
        }
        ctx.emit(trackable);
        Ok(())
    }
}
