//! Live-view state: the rolling chart window, the numeric readout and the
//! sample-rate tracker.
//!
//! Nothing here touches the terminal; the `tui` binary reads these values
//! every frame.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::protocol::SAMPLE_CHANNELS;
use crate::types::ImuSample;

/// Number of samples kept for the live chart.
pub const WINDOW_LEN: usize = 100;

/// Arrival times older than this are dropped from the rate estimate.
const RATE_WINDOW: Duration = Duration::from_secs(2);

// ── Chart window ──────────────────────────────────────────────────────────────

/// Fixed-capacity FIFO of the most recent samples.
///
/// Each point carries its chart label, a sequence number that keeps
/// increasing across evictions so the x axis scrolls.
#[derive(Debug)]
pub struct SampleWindow {
    capacity: usize,
    points: VecDeque<(u64, ImuSample)>,
    next_seq: u64,
}

impl SampleWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            points: VecDeque::with_capacity(capacity.max(1)),
            next_seq: 0,
        }
    }

    /// Append `sample`, evicting the oldest point first when full.
    pub fn push(&mut self, sample: ImuSample) {
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back((self.next_seq, sample));
        self.next_seq += 1;
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Samples in arrival order, oldest first.
    pub fn samples(&self) -> impl Iterator<Item = &ImuSample> + '_ {
        self.points.iter().map(|(_, s)| s)
    }

    /// `(label, value)` pairs for one channel (0 = ax … 5 = gz), ready for a
    /// line chart.
    pub fn series(&self, channel: usize) -> Vec<(f64, f64)> {
        self.points
            .iter()
            .map(|(seq, s)| (*seq as f64, s.channels()[channel] as f64))
            .collect()
    }

    /// Label range of the points currently held, for the x-axis bounds.
    ///
    /// Always spans `capacity` labels so the chart does not stretch while
    /// the window is still filling.
    pub fn x_bounds(&self) -> [f64; 2] {
        let first = self.points.front().map(|(seq, _)| *seq).unwrap_or(0);
        [first as f64, (first + self.capacity as u64 - 1) as f64]
    }

    /// Min/max over the given channels, padded so a flat line stays visible.
    pub fn y_bounds(&self, channels: &[usize]) -> [f64; 2] {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for s in self.samples() {
            let c = s.channels();
            for &ch in channels {
                let v = c[ch] as f64;
                lo = lo.min(v);
                hi = hi.max(v);
            }
        }
        if !lo.is_finite() || !hi.is_finite() {
            return [-1.0, 1.0];
        }
        let pad = ((hi - lo) * 0.1).max(0.05);
        [lo - pad, hi + pad]
    }
}

impl Default for SampleWindow {
    fn default() -> Self {
        Self::new(WINDOW_LEN)
    }
}

// ── Readout ───────────────────────────────────────────────────────────────────

/// Fixed 4-decimal text for each channel, in wire order.
///
/// ```
/// # use imu_collect::{display::format_readout, types::ImuSample};
/// let s = ImuSample::from_channels([1.0, -0.5, 0.123456, 0.0, 10.0, -2.00005]);
/// assert_eq!(format_readout(&s)[2], "0.1235");
/// ```
pub fn format_readout(sample: &ImuSample) -> [String; SAMPLE_CHANNELS] {
    sample.channels().map(|v| format!("{v:.4}"))
}

// ── Rate tracking ─────────────────────────────────────────────────────────────

/// Notification arrival rate over a short sliding window.
#[derive(Debug, Default)]
pub struct RateTracker {
    arrivals: VecDeque<Instant>,
    total: u64,
}

impl RateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, now: Instant) {
        self.total += 1;
        self.arrivals.push_back(now);
        while self
            .arrivals
            .front()
            .map(|t| now.duration_since(*t) > RATE_WINDOW)
            .unwrap_or(false)
        {
            self.arrivals.pop_front();
        }
    }

    /// Samples received since the last [`clear`](Self::clear).
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Samples per second; `0.0` until two arrivals are known.
    pub fn rate(&self) -> f64 {
        let (Some(first), Some(last)) = (self.arrivals.front(), self.arrivals.back()) else {
            return 0.0;
        };
        let span = last.duration_since(*first).as_secs_f64();
        if self.arrivals.len() < 2 || span < 1e-9 {
            0.0
        } else {
            (self.arrivals.len() as f64 - 1.0) / span
        }
    }

    pub fn clear(&mut self) {
        self.arrivals.clear();
        self.total = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: f32) -> ImuSample {
        ImuSample::from_channels([v; 6])
    }

    #[test]
    fn window_keeps_latest_hundred_in_order() {
        let mut w = SampleWindow::default();
        for i in 0..150 {
            w.push(s(i as f32));
            assert!(w.len() <= WINDOW_LEN);
        }
        assert_eq!(w.len(), 100);
        let kept: Vec<f32> = w.samples().map(|x| x.ax).collect();
        let expected: Vec<f32> = (50..150).map(|i| i as f32).collect();
        assert_eq!(kept, expected);
    }

    #[test]
    fn labels_evicted_with_their_samples() {
        let mut w = SampleWindow::new(3);
        for i in 0..5 {
            w.push(s(i as f32));
        }
        let xs: Vec<f64> = w.series(0).iter().map(|p| p.0).collect();
        assert_eq!(xs, vec![2.0, 3.0, 4.0]);
        assert_eq!(w.x_bounds(), [2.0, 4.0]);
    }

    #[test]
    fn series_picks_channel() {
        let mut w = SampleWindow::new(4);
        w.push(ImuSample::from_channels([1.0, 2.0, 3.0, 4.0, 5.0, 6.0]));
        assert_eq!(w.series(4), vec![(0.0, 5.0)]);
    }

    #[test]
    fn y_bounds_default_and_padding() {
        let mut w = SampleWindow::new(4);
        assert_eq!(w.y_bounds(&[0, 1, 2]), [-1.0, 1.0]);
        w.push(ImuSample::from_channels([0.0, 1.0, 2.0, 0.0, 0.0, 0.0]));
        let [lo, hi] = w.y_bounds(&[0, 1, 2]);
        assert!(lo < 0.0 && hi > 2.0);
    }

    #[test]
    fn readout_is_fixed_four_decimals() {
        let r = format_readout(&ImuSample::from_channels([0.0, 1.0, -1.5, 0.00004, 123.45678, -0.1]));
        assert_eq!(r, ["0.0000", "1.0000", "-1.5000", "0.0000", "123.4568", "-0.1000"]);
    }

    #[test]
    fn rate_over_window() {
        let mut r = RateTracker::new();
        assert_eq!(r.rate(), 0.0);
        let t0 = Instant::now();
        for i in 0..11 {
            r.record(t0 + Duration::from_millis(i * 100));
        }
        assert!((r.rate() - 10.0).abs() < 1e-6);
        assert_eq!(r.total(), 11);

        // Arrivals older than the window fall out of the estimate.
        r.record(t0 + Duration::from_millis(5_000));
        assert_eq!(r.rate(), 0.0);
        assert_eq!(r.total(), 12);
    }
}
