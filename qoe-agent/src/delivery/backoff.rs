//! Flush interval under failure and server-driven cadence.

use std::collections::VecDeque;
use std::fmt::Debug;

use parking_lot::Mutex;

use crate::config::DeliveryConfig;

/// Uniform samples in `[0, 1)` used to spread retries.
pub trait JitterSource: Send + Sync + Debug {
    fn sample(&self) -> f64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RandomJitter;

impl JitterSource for RandomJitter {
    fn sample(&self) -> f64 {
        rand::random::<f64>()
    }
}

/// Always returns the same sample.
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(pub f64);

impl JitterSource for FixedJitter {
    fn sample(&self) -> f64 {
        self.0
    }
}

/// Replays samples in order, repeating the last one when exhausted.
#[derive(Debug, Default)]
pub struct SequenceJitter {
    samples: Mutex<VecDeque<f64>>,
    last: Mutex<f64>,
}

impl SequenceJitter {
    pub fn new(samples: impl IntoIterator<Item = f64>) -> Self {
        Self {
            samples: Mutex::new(samples.into_iter().collect()),
            last: Mutex::new(0.0),
        }
    }
}

impl JitterSource for SequenceJitter {
    fn sample(&self) -> f64 {
        let mut last = self.last.lock();
        if let Some(next) = self.samples.lock().pop_front() {
            *last = next;
        }
        *last
    }
}

/// Interval to wait before the next non-forced send.
///
/// With no failures this is `base_ms`; otherwise it grows as
/// `base_ms * (1 + jitter * 2^(failures - 1))`.
pub fn next_interval(base_ms: u64, failures: u32, jitter: f64) -> u64 {
    if failures == 0 {
        return base_ms;
    }
    let exponent = failures.saturating_sub(1).min(30) as i32;
    let factor = 1.0 + jitter.clamp(0.0, 1.0) * 2f64.powi(exponent);
    (base_ms as f64 * factor) as u64
}

/// Flush interval and batch size requested by the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    pub interval_ms: u64,
    pub batch_size: usize,
}

impl Cadence {
    /// Parses the cadence header value, clamping it to the configured bounds.
    pub fn from_header(value: &str, config: &DeliveryConfig) -> Option<Self> {
        let requested = value.trim().parse::<u64>().ok()?;
        let interval_ms = requested.clamp(config.min_cadence_ms, config.max_cadence_ms);
        let batch_size = (interval_ms as usize / 1000 * config.events_per_second)
            .clamp(config.min_batch_size, config.max_batch_size);
        Some(Self {
            interval_ms,
            batch_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn no_failures_means_base_interval() {
        assert_eq!(next_interval(10_000, 0, 0.9), 10_000);
    }

    #[test]
    fn interval_is_monotone_for_a_fixed_sample() {
        let mut previous = next_interval(10_000, 0, 0.5);
        for failures in 1..=12 {
            let current = next_interval(10_000, failures, 0.5);
            assert!(current >= previous, "{failures}: {current} < {previous}");
            previous = current;
        }
        assert_eq!(next_interval(10_000, 1, 0.5), 15_000);
        assert_eq!(next_interval(10_000, 3, 0.5), 30_000);
    }

    #[test]
    fn huge_failure_counts_do_not_overflow() {
        assert!(next_interval(10_000, u32::MAX, 1.0) > 10_000);
    }

    #[rstest]
    #[case("5000", 10_000, 300)]
    #[case("20000", 20_000, 600)]
    #[case("45000", 45_000, 1000)]
    #[case("999999", 60_000, 1000)]
    fn cadence_header_is_clamped(#[case] raw: &str, #[case] interval: u64, #[case] batch: usize) {
        let cadence = Cadence::from_header(raw, &DeliveryConfig::default()).unwrap();
        assert_eq!(cadence.interval_ms, interval);
        assert_eq!(cadence.batch_size, batch);
    }

    #[test]
    fn garbage_header_is_ignored() {
        assert!(Cadence::from_header("soon", &DeliveryConfig::default()).is_none());
    }

    #[test]
    fn sequence_jitter_repeats_last_sample() {
        let jitter = SequenceJitter::new([0.1, 0.7]);
        assert_eq!(jitter.sample(), 0.1);
        assert_eq!(jitter.sample(), 0.7);
        assert_eq!(jitter.sample(), 0.7);
        assert!((0.0..1.0).contains(&RandomJitter.sample()));
    }
}
