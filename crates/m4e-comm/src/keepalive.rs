//! Keepalive bookkeeping: liveness and smoothed round-trip latency.
//!
//! Each ping carries a sequence number as payload. Only the pong echoing the
//! outstanding sequence produces a latency sample; any pong at all counts as
//! a sign of life.

use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::trace;

/// Weight of a new sample in the moving average.
const SMOOTHING: f64 = 0.1;

/// Rolling keepalive statistics for one connection.
#[derive(Debug, Default, Clone)]
pub struct Keepalive {
    last_life_sign: Option<DateTime<Utc>>,
    ping_average_ms: f64,
    next_sequence: u64,
    outstanding: Option<(u64, Instant)>,
}

impl Keepalive {
    /// Creates empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Time of the last pong.
    pub fn last_life_sign(&self) -> Option<DateTime<Utc>> {
        self.last_life_sign
    }

    /// Smoothed round-trip time in milliseconds, zero before the first sample.
    pub fn ping_average_ms(&self) -> f64 {
        self.ping_average_ms
    }

    /// Returns true while a ping awaits its pong.
    pub fn is_awaiting_pong(&self) -> bool {
        self.outstanding.is_some()
    }

    /// Registers a ping sent at `now` and returns its payload.
    ///
    /// A still-outstanding ping is superseded.
    pub fn begin_ping(&mut self, now: Instant) -> Vec<u8> {
        self.next_sequence = self.next_sequence.wrapping_add(1);
        self.outstanding = Some((self.next_sequence, now));
        self.next_sequence.to_be_bytes().to_vec()
    }

    /// Records a pong received at `now` (monotonic) / `wall` (wall clock).
    ///
    /// Returns the new average when the pong answered the outstanding ping.
    pub fn record_pong(&mut self, payload: &[u8], now: Instant, wall: DateTime<Utc>) -> Option<f64> {
        self.last_life_sign = Some(wall);

        let (sequence, sent_at) = self.outstanding?;
        if payload != sequence.to_be_bytes() {
            trace!(sequence, "pong does not match outstanding ping");
            return None;
        }
        self.outstanding = None;

        let latency_ms = now.saturating_duration_since(sent_at).as_secs_f64() * 1000.0;
        Some(self.record_sample(latency_ms))
    }

    /// Folds a latency sample into the exponential moving average.
    ///
    /// The first sample seeds the average.
    pub fn record_sample(&mut self, latency_ms: f64) -> f64 {
        self.ping_average_ms = if self.ping_average_ms == 0.0 {
            latency_ms
        } else {
            SMOOTHING * latency_ms + (1.0 - SMOOTHING) * self.ping_average_ms
        };
        self.ping_average_ms
    }

    /// Forgets the outstanding ping; statistics are kept.
    pub fn stop(&mut self) {
        self.outstanding = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn first_sample_seeds_average() {
        let mut keepalive = Keepalive::new();
        assert_eq!(keepalive.ping_average_ms(), 0.0);
        assert_eq!(keepalive.record_sample(40.0), 40.0);
    }

    #[test]
    fn later_samples_are_smoothed() {
        let mut keepalive = Keepalive::new();
        keepalive.record_sample(40.0);
        let average = keepalive.record_sample(140.0);
        assert!((average - (0.1 * 140.0 + 0.9 * 40.0)).abs() < 1e-9);
        assert!((average - 50.0).abs() < 1e-9);
    }

    #[test]
    fn matching_pong_yields_latency() {
        let mut keepalive = Keepalive::new();
        let sent = Instant::now();
        let payload = keepalive.begin_ping(sent);
        assert!(keepalive.is_awaiting_pong());

        let average = keepalive
            .record_pong(&payload, sent + Duration::from_millis(25), Utc::now())
            .unwrap();
        assert!((average - 25.0).abs() < 1e-6);
        assert!(!keepalive.is_awaiting_pong());
        assert!(keepalive.last_life_sign().is_some());
    }

    #[test]
    fn stale_pong_only_refreshes_life_sign() {
        let mut keepalive = Keepalive::new();
        let now = Instant::now();
        let first = keepalive.begin_ping(now);
        let _second = keepalive.begin_ping(now);

        assert!(keepalive.record_pong(&first, now, Utc::now()).is_none());
        assert!(keepalive.last_life_sign().is_some());
        assert!(keepalive.is_awaiting_pong());
        assert_eq!(keepalive.ping_average_ms(), 0.0);
    }

    #[test]
    fn unsolicited_pong_refreshes_life_sign() {
        let mut keepalive = Keepalive::new();
        assert!(keepalive.record_pong(b"", Instant::now(), Utc::now()).is_none());
        assert!(keepalive.last_life_sign().is_some());
    }

    #[test]
    fn stop_clears_outstanding_ping() {
        let mut keepalive = Keepalive::new();
        keepalive.record_sample(10.0);
        keepalive.begin_ping(Instant::now());
        keepalive.stop();
        assert!(!keepalive.is_awaiting_pong());
        assert_eq!(keepalive.ping_average_ms(), 10.0);
    }
}
