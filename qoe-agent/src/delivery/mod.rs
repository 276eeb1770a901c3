//! Batching, delta-encoding delivery of trackable events.
//!
//! Each player owns one [`DeliveryEngine`]. Events are delta-encoded as they
//! are queued, then shipped in batches on a tick, or immediately for the few
//! event types that mark view boundaries and failures. A failed batch goes
//! back to the front of the queue and the flush interval backs off.

pub mod backoff;
pub mod delta;

use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use playback_model::event::OVERFLOW_EVENT;
use playback_model::{PlaybackEventKind, TrackableEvent, keys};
use serde::Serialize;
use serde_json::{Value, json};
use tokio::runtime::Handle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::clock::Clock;
use crate::config::DeliveryConfig;
use crate::transport::{BeaconRequest, BeaconResponse, Transport};
use crate::{Error, Result};

pub use backoff::{Cadence, FixedJitter, JitterSource, RandomJitter, SequenceJitter, next_interval};
pub use delta::{ALWAYS_SENT, DeltaEncoder};

/// Event types that trigger a forced flush as soon as they are queued.
pub const IMMEDIATE_FLUSH: &[PlaybackEventKind] = &[
    PlaybackEventKind::ViewBegin,
    PlaybackEventKind::Error,
    PlaybackEventKind::Ended,
    PlaybackEventKind::ViewCompleted,
];

fn flushes_immediately(event_type: &str) -> bool {
    IMMEDIATE_FLUSH.iter().any(|kind| kind.as_ref() == event_type)
}

/// Counters exposed for diagnostics and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryStats {
    pub enqueued: u64,
    pub dropped: u64,
    pub overflow_markers: u64,
    pub batches_sent: u64,
    pub events_sent: u64,
    pub batches_failed: u64,
    pub queued: usize,
    pub in_flight: usize,
    pub failures: u32,
    pub rate_limited: bool,
    pub interval_ms: u64,
    pub batch_size: usize,
    pub last_rtt_ms: Option<i64>,
}

struct DeliveryState {
    queue: VecDeque<TrackableEvent>,
    encoder: DeltaEncoder,
    in_flight: usize,
    failures: u32,
    rate_limited: bool,
    interval_ms: u64,
    batch_size: usize,
    last_sent_at: i64,
    last_rtt_ms: Option<i64>,
    workspace_id: Option<String>,
    verbose: bool,
    stats: DeliveryStats,
}

/// Everything the engine needs from its owner.
pub struct DeliveryOptions {
    pub config: DeliveryConfig,
    pub domain: String,
    pub long_dispatch: bool,
    pub transport: Arc<dyn Transport>,
    pub clock: Arc<dyn Clock>,
    pub jitter: Arc<dyn JitterSource>,
    pub runtime: Handle,
}

struct EngineInner {
    state: Mutex<DeliveryState>,
    config: DeliveryConfig,
    domain: String,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    jitter: Arc<dyn JitterSource>,
    runtime: Handle,
    cancel: CancellationToken,
}

/// Cheaply cloneable handle to one player's delivery pipeline.
#[derive(Clone)]
pub struct DeliveryEngine {
    inner: Arc<EngineInner>,
}

impl DeliveryEngine {
    pub fn new(options: DeliveryOptions) -> Self {
        let tier = options.config.tier(options.long_dispatch);
        let now = options.clock.now_ms();
        let state = DeliveryState {
            queue: VecDeque::new(),
            encoder: DeltaEncoder::new(options.config.delta_staleness_ms),
            in_flight: 0,
            failures: 0,
            rate_limited: false,
            interval_ms: tier.interval_ms,
            batch_size: tier.batch_size,
            last_sent_at: now,
            last_rtt_ms: None,
            workspace_id: None,
            verbose: false,
            stats: DeliveryStats::default(),
        };
        Self {
            inner: Arc::new(EngineInner {
                state: Mutex::new(state),
                config: options.config,
                domain: options.domain,
                transport: options.transport,
                clock: options.clock,
                jitter: options.jitter,
                runtime: options.runtime,
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Spawns the periodic flush task.
    pub fn start(&self) {
        let weak: Weak<EngineInner> = Arc::downgrade(&self.inner);
        let cancel = self.inner.cancel.clone();
        let period = Duration::from_millis(self.inner.config.tick_interval_ms);
        self.inner.runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Delivery ticker stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let Some(inner) = weak.upgrade() else {
                            break;
                        };
                        EngineInner::try_flush(&inner, false);
                    }
                }
            }
        });
    }

    pub fn domain(&self) -> &str {
        &self.inner.domain
    }

    /// Queues a trackable event, dropping it if the queue is saturated.
    pub fn enqueue(&self, event: TrackableEvent) {
        EngineInner::enqueue(&self.inner, event);
    }

    /// One scheduling step: sends a batch if the interval has elapsed.
    pub fn tick(&self) {
        EngineInner::try_flush(&self.inner, false);
    }

    /// Sends everything queued right away.
    pub fn flush(&self) {
        EngineInner::try_flush(&self.inner, true);
    }

    /// Stops the tick task after one last forced flush.
    pub fn release(&self) {
        self.flush();
        self.inner.cancel.cancel();
    }

    pub fn set_verbose(&self, verbose: bool) {
        self.inner.state.lock().verbose = verbose;
    }

    /// Interval the next non-forced send waits for, sampling the jitter source.
    pub fn next_interval_ms(&self) -> u64 {
        let state = self.inner.state.lock();
        next_interval(state.interval_ms, state.failures, self.inner.jitter.sample())
    }

    pub fn stats(&self) -> DeliveryStats {
        let state = self.inner.state.lock();
        DeliveryStats {
            queued: state.queue.len(),
            in_flight: state.in_flight,
            failures: state.failures,
            rate_limited: state.rate_limited,
            interval_ms: state.interval_ms,
            batch_size: state.batch_size,
            last_rtt_ms: state.last_rtt_ms,
            ..state.stats.clone()
        }
    }
}

impl EngineInner {
    fn enqueue(this: &Arc<Self>, mut event: TrackableEvent) {
        let now = this.clock.now_ms();
        let event_type = event.event_type().to_string();
        let force = {
            let mut state = this.state.lock();
            if state.rate_limited {
                state.stats.dropped += 1;
                trace!(event = %event_type, "Rate limited; event dropped");
                return;
            }

            if state.queue.len() >= this.config.queue_capacity {
                state.stats.dropped += 1;
                state.stats.overflow_markers += 1;
                state.rate_limited = true;
                let overflow = Error::Overflow { dropped: 1 };
                warn!(error = %overflow, capacity = this.config.queue_capacity, "Delivery queue full; rate limiting until the next successful send");

                let mut marker = TrackableEvent::new(OVERFLOW_EVENT);
                for key in ALWAYS_SENT {
                    if let Some(value) = event.query.get(key) {
                        marker.query.insert_scalar(key, value.clone());
                    }
                }
                state.queue.push_back(marker);
                true
            } else {
                state.encoder.encode(&mut event, now);
                if state.verbose {
                    debug!(event = %event_type, payload = %event.query.to_json(), "Queued event");
                } else {
                    trace!(event = %event_type, fields = event.query.len(), "Queued event");
                }
                state.queue.push_back(event);
                state.stats.enqueued += 1;
                flushes_immediately(&event_type)
            }
        };

        if force {
            Self::try_flush(this, true);
        } else {
            Self::try_flush(this, false);
        }
    }

    fn try_flush(this: &Arc<Self>, forced: bool) {
        let prepared = {
            let mut state = this.state.lock();
            let now = this.clock.now_ms();
            if !forced {
                let due = next_interval(state.interval_ms, state.failures, this.jitter.sample());
                if now - state.last_sent_at <= i64::try_from(due).unwrap_or(i64::MAX) {
                    return;
                }
                state.last_sent_at = now;
            }
            this.prepare_batch(&mut state, forced, now)
        };

        if let Some((request, batch, started_at)) = prepared {
            let inner = Arc::clone(this);
            this.runtime.spawn(async move {
                let result = inner.transport.post(request).await;
                inner.on_complete(batch, started_at, result);
            });
        }
    }

    fn prepare_batch(
        &self,
        state: &mut DeliveryState,
        forced: bool,
        now: i64,
    ) -> Option<(BeaconRequest, Vec<TrackableEvent>, i64)> {
        let count = if forced {
            state.queue.len()
        } else {
            state.queue.len().min(state.batch_size)
        };
        if count == 0 {
            return None;
        }
        if state.in_flight > 0 && !forced {
            trace!(queued = state.queue.len(), "Request in flight; waiting");
            return None;
        }

        let batch: Vec<TrackableEvent> = state.queue.drain(..count).collect();
        let bare_domain = self.domain.trim_start_matches('.');
        let mut events = Vec::with_capacity(batch.len());
        for event in &batch {
            if let Some(workspace) = event.query.get_string(keys::WORKSPACE_ID) {
                state.workspace_id = Some(workspace);
            }
            let mut fields = event.query.as_map().clone();
            fields.insert(keys::EVENT_NAME.into(), Value::from(event.event_type()));
            fields.insert(keys::BEACON_DOMAIN.into(), Value::from(bare_domain));
            events.push(Value::Object(fields));
        }

        let mut metadata = serde_json::Map::new();
        if let Some(rtt) = state.last_rtt_ms {
            metadata.insert("rtt_ms".into(), Value::from(rtt));
        }
        metadata.insert("transmission_timestamp".into(), Value::from(now));

        state.in_flight += 1;
        debug!(events = batch.len(), forced, "Sending beacon batch");
        let request = BeaconRequest {
            domain: self.domain.clone(),
            workspace_id: state.workspace_id.clone(),
            body: json!({ "events": events, "metadata": metadata }),
            headers: Vec::new(),
        };
        Some((request, batch, now))
    }

    fn on_complete(
        &self,
        batch: Vec<TrackableEvent>,
        started_at: i64,
        result: Result<BeaconResponse>,
    ) {
        let now = self.clock.now_ms();
        let mut state = self.state.lock();
        state.in_flight = state.in_flight.saturating_sub(1);

        let failure = match result {
            Ok(response) if response.success => {
                state.last_rtt_ms = Some(now - started_at);
                state.failures = 0;
                state.rate_limited = false;
                state.stats.batches_sent += 1;
                state.stats.events_sent += batch.len() as u64;
                if let Some(cadence) = response
                    .header(&self.config.cadence_header)
                    .and_then(|raw| Cadence::from_header(raw, &self.config))
                {
                    if cadence.interval_ms != state.interval_ms {
                        info!(interval_ms = cadence.interval_ms, batch_size = cadence.batch_size, "Collector changed flush cadence");
                    }
                    state.interval_ms = cadence.interval_ms;
                    state.batch_size = cadence.batch_size;
                }
                return;
            }
            Ok(_) => Error::transmission("collector rejected the batch"),
            Err(e) => e,
        };

        state.last_rtt_ms = None;
        state.stats.batches_failed += 1;
        if state.queue.len() + batch.len() < self.config.queue_capacity {
            for event in batch.into_iter().rev() {
                state.queue.push_front(event);
            }
            state.failures = state.failures.saturating_add(1);
            warn!(error = %failure, failures = state.failures, "Beacon batch failed; events requeued");
        } else {
            state.stats.dropped += batch.len() as u64;
            state.failures = 0;
            warn!(error = %failure, dropped = batch.len(), "Beacon batch failed with a full queue; events dropped");
        }
    }
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
