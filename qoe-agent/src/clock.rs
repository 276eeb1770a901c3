use std::fmt::Debug;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

/// Millisecond wall-clock source.
pub trait Clock: Send + Sync + Debug {
    fn now_ms(&self) -> i64;
}

/// Wall clock anchored once and advanced by a monotonic timer, so readings
/// never go backwards when the system clock is adjusted.
#[derive(Debug)]
pub struct SystemClock {
    anchor_wall_ms: i64,
    anchor: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            anchor_wall_ms: chrono::Utc::now().timestamp_millis(),
            anchor: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        let elapsed = i64::try_from(self.anchor.elapsed().as_millis()).unwrap_or(i64::MAX);
        self.anchor_wall_ms.saturating_add(elapsed)
    }
}

/// Clock driven by hand, for tests and replays.
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: i64) -> i64 {
        self.now.fetch_add(delta_ms, Ordering::SeqCst) + delta_ms
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(b >= a);
        assert!(a > 1_600_000_000_000);
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.advance(500), 1_500);
        clock.set(10);
        assert_eq!(clock.now_ms(), 10);
    }
}
