//! Drives a tracker through a script.

use std::sync::Arc;
use std::time::Duration;

use qoe_agent::clock::Clock;
use qoe_agent::transport::{BeaconRequest, HttpTransport, MemoryTransport, Transport};
use qoe_agent::{
    AgentConfig, DeliveryStats, ManualClock, PlayerStateProvider, Registry, SharedPlayerState,
    SystemClock, Tracker,
};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::Result;
use crate::script::{Script, Step, patch_snapshot};

/// Polls made while waiting for in-flight batches at the end of a run.
const DRAIN_POLL: Duration = Duration::from_millis(20);

pub struct ReplayOptions {
    pub endpoint: Option<Url>,
    pub realtime: bool,
    pub verbose: bool,
}

/// What a finished replay leaves behind.
pub struct ReplayOutcome {
    /// Captured batches, when no endpoint was given.
    pub requests: Option<Vec<BeaconRequest>>,
    pub stats: DeliveryStats,
    pub session_id: Option<String>,
}

enum Sink {
    Memory(Arc<MemoryTransport>),
    Http,
}

pub async fn run(config: AgentConfig, script: Script, options: ReplayOptions) -> Result<ReplayOutcome> {
    let (transport, sink): (Arc<dyn Transport>, Sink) = match &options.endpoint {
        Some(endpoint) => {
            info!(%endpoint, "Replaying against collector");
            let http = HttpTransport::new(&config.transport)?.with_endpoint(endpoint.clone());
            (Arc::new(http), Sink::Http)
        }
        None => {
            let memory = Arc::new(MemoryTransport::new());
            (memory.clone(), Sink::Memory(memory))
        }
    };

    let manual = (!options.realtime).then(|| Arc::new(ManualClock::new(SystemClock::new().now_ms())));
    let clock: Arc<dyn Clock> = match &manual {
        Some(manual) => manual.clone(),
        None => Arc::new(SystemClock::new()),
    };

    let drain_timeout = Duration::from_secs(config.transport.timeout_secs.max(1));
    let registry = Registry::builder(config)
        .device(script.device.clone())
        .transport(transport)
        .clock(clock)
        .build()?;

    let state = Arc::new(SharedPlayerState::new(script.state.clone()));
    let customer = script.customer.to_customer_data()?;
    let mut tracker = Tracker::new(
        registry.clone(),
        &script.player,
        state.clone(),
        customer,
        &script.options,
    )?;
    tracker.set_verbose(options.verbose)?;

    for (index, step) in script.steps.iter().enumerate() {
        debug!(index, ?step, "Applying step");
        apply(&mut tracker, &state, manual.as_deref(), step).await?;
        tokio::task::yield_now().await;
    }

    tracker.flush()?;
    let stats = drain(&tracker, drain_timeout).await?;
    let session_id = registry.session_id();
    tracker.release();
    registry.shutdown();

    let requests = match sink {
        Sink::Memory(memory) => Some(memory.requests()),
        Sink::Http => None,
    };
    Ok(ReplayOutcome {
        requests,
        stats,
        session_id,
    })
}

async fn apply(
    tracker: &mut Tracker,
    state: &SharedPlayerState,
    manual: Option<&ManualClock>,
    step: &Step,
) -> Result<()> {
    match step {
        Step::Event(kind) => tracker.handle(*kind)?,
        Step::Request(request) => tracker.handle_request(request.kind, &request.sample)?,
        Step::State(patch) => {
            let snapshot = patch_snapshot(&state.snapshot(), patch)?;
            state.update(|current| *current = snapshot);
        }
        Step::Wait(ms) => {
            let delta = i64::try_from(*ms).unwrap_or(i64::MAX);
            state.update(|current| {
                if !current.is_paused && !current.is_buffering {
                    current.position_ms = current.position_ms.saturating_add(delta);
                }
            });
            match manual {
                Some(clock) => {
                    clock.advance(delta);
                }
                None => tokio::time::sleep(Duration::from_millis(*ms)).await,
            }
        }
        Step::Error(error) => {
            tracker.error(error.code, &error.message, error.context.as_deref())?
        }
        Step::VideoChange(section) => tracker.video_change(section.to_customer_data()?)?,
        Step::ProgramChange(section) => tracker.program_change(section.to_customer_data()?)?,
        Step::UpdateCustomerData(section) => {
            tracker.update_customer_data(&section.to_customer_data()?)?
        }
        Step::SessionTags(tags) => tracker.set_session_data(tags)?,
        Step::PlayerSize(size) => tracker.set_player_size(size.width, size.height),
        Step::ScreenSize(size) => tracker.set_screen_size(size.width, size.height),
        Step::Presentation(presentation) => tracker.presentation_change(*presentation),
        Step::Orientation(orientation) => tracker.orientation_change(*orientation)?,
        Step::DroppedFrames(count) => tracker.set_dropped_frames(*count),
        Step::AutomaticErrorTracking(enabled) => tracker.set_automatic_error_tracking(*enabled),
        Step::Flush => tracker.flush()?,
    }
    Ok(())
}

/// Waits for in-flight batches to settle, giving up after `timeout`.
async fn drain(tracker: &Tracker, timeout: Duration) -> Result<DeliveryStats> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let stats = tracker.stats()?;
        if stats.in_flight == 0 {
            return Ok(stats);
        }
        if tokio::time::Instant::now() >= deadline {
            warn!(in_flight = stats.in_flight, "Gave up waiting for in-flight batches");
            return Ok(stats);
        }
        tokio::time::sleep(DRAIN_POLL).await;
    }
}
