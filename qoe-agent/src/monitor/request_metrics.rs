use playback_model::{AttributeBag, BandwidthFields, Event, PlaybackEventKind, ViewFields, keys};

use super::{Monitor, MonitorContext, metric};
use crate::Result;

/// Per-view request tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestCounts {
    pub total: i64,
    pub completed: i64,
    pub failed: i64,
    pub canceled: i64,
}

/// Aggregates the network requests the host reports into throughput and
/// latency statistics on the view.
#[derive(Debug, Default)]
pub struct RequestMetricsMonitor {
    counts: RequestCounts,
    total_bytes: i64,
    total_load_time: i64,
    total_latency: i64,
    latency_samples: i64,
}

impl RequestMetricsMonitor {
    pub fn counts(&self) -> RequestCounts {
        self.counts
    }

    fn record_completed(
        &mut self,
        bandwidth: &AttributeBag,
        delta: &mut AttributeBag,
        view: &AttributeBag,
    ) -> Result<()> {
        let start = bandwidth.request_start();
        let first_byte = bandwidth.response_start();
        let end = bandwidth.response_end();
        let bytes = bandwidth.bytes_loaded().unwrap_or(0);

        if let (Some(first_byte), Some(end)) = (first_byte, end) {
            let load_time = end - first_byte;
            if load_time > 0 && bytes > 0 {
                let throughput = bytes * 8000 / load_time;
                let min = view
                    .min_request_throughput()
                    .map_or(throughput, |current| current.min(throughput));
                self.total_bytes += bytes;
                self.total_load_time += load_time;
                delta.put(keys::VIEW_MIN_REQUEST_THROUGHPUT, min)?;
                delta.put(
                    keys::VIEW_AVERAGE_REQUEST_THROUGHPUT,
                    self.total_bytes * 8000 / self.total_load_time,
                )?;
            }
        }

        if let (Some(start), Some(first_byte)) = (start, first_byte) {
            let latency = first_byte - start;
            if latency > 0 {
                let max = view
                    .max_request_latency()
                    .map_or(latency as f64, |current| current.max(latency as f64));
                self.total_latency += latency;
                self.latency_samples += 1;
                delta.put_f64(keys::VIEW_MAX_REQUEST_LATENCY, max)?;
                delta.put_f64(
                    keys::VIEW_AVERAGE_REQUEST_LATENCY,
                    self.total_latency as f64 / self.latency_samples as f64,
                )?;
            }
        }
        Ok(())
    }
}

impl Monitor for RequestMetricsMonitor {
    fn name(&self) -> &'static str {
        "request_metrics"
    }

    fn handle(&mut self, event: &Event, ctx: &mut MonitorContext<'_>) -> Result<()> {
        let Some(playback) = event.as_playback() else {
            return Ok(());
        };
        if !playback.kind.is_request() {
            return Ok(());
        }

        self.counts.total += 1;
        let mut delta = metric();
        match playback.kind {
            PlaybackEventKind::RequestCompleted => {
                self.counts.completed += 1;
                if let Some(bandwidth) = &playback.bandwidth {
                    self.record_completed(bandwidth, &mut delta, ctx.view())?;
                }
            }
            PlaybackEventKind::RequestFailed => self.counts.failed += 1,
            PlaybackEventKind::RequestCanceled => self.counts.canceled += 1,
            _ => {}
        }

        delta.put(keys::VIEW_REQUEST_COUNT, self.counts.total)?;
        delta.put(keys::VIEW_REQUEST_FAILED_COUNT, self.counts.failed)?;
        delta.put(keys::VIEW_REQUEST_CANCELED_COUNT, self.counts.canceled)?;
        ctx.emit_metric(delta);
        Ok(())
    }
}
