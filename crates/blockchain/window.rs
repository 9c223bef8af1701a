use std::collections::VecDeque;

use biochain_common::{ChannelStats, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowEntry {
    pub timestamp: Timestamp,
    pub value: f64,
}

/// Time-bounded window over one channel's values.
///
/// "Now" is the timestamp of the most recently pushed entry, never the host clock, so
/// the window contents depend only on the sequence of logical timestamps.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    duration: u64,
    entries: VecDeque<WindowEntry>,
}

impl SlidingWindow {
    pub fn new(duration: u64) -> Self {
        Self {
            duration,
            entries: VecDeque::new(),
        }
    }

    /// Appends an entry and evicts everything older than `duration` relative to it.
    pub fn push(&mut self, timestamp: Timestamp, value: f64) {
        self.entries.push_back(WindowEntry { timestamp, value });
        self.evict(timestamp);
    }

    fn evict(&mut self, now: Timestamp) {
        while let Some(oldest) = self.entries.front() {
            if now.saturating_sub(oldest.timestamp) <= self.duration {
                break;
            }
            self.entries.pop_front();
        }
    }

    /// Mean and sample standard deviation (`n - 1` divisor) of the current entries.
    pub fn stats(&self) -> ChannelStats {
        let n = self.entries.len();
        if n == 0 {
            return ChannelStats::default();
        }

        let count = n as f64;
        let mean = self.entries.iter().map(|entry| entry.value).sum::<f64>() / count;
        let stddev = if n > 1 {
            let squares: f64 = self
                .entries
                .iter()
                .map(|entry| (entry.value - mean).powi(2))
                .sum();
            (squares / (count - 1.0)).sqrt()
        } else {
            0.0
        };

        ChannelStats { mean, stddev }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &WindowEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_window_yields_zeroes() {
        let window = SlidingWindow::new(30);
        assert!(window.is_empty());
        assert_eq!(window.stats(), ChannelStats::default());
    }

    #[test]
    fn single_entry_has_zero_stddev() {
        let mut window = SlidingWindow::new(30);
        window.push(4, 88.0);
        assert_eq!(
            window.stats(),
            ChannelStats {
                mean: 88.0,
                stddev: 0.0
            }
        );
    }

    #[test]
    fn keeps_exactly_the_entries_within_duration() {
        let mut window = SlidingWindow::new(30);
        for timestamp in 0..=40 {
            window.push(timestamp, timestamp as f64);
        }

        let kept: Vec<Timestamp> = window.entries().map(|entry| entry.timestamp).collect();
        assert_eq!(kept, (10..=40).collect::<Vec<_>>());

        let stats = window.stats();
        assert_eq!(stats.mean, 25.0);
        // Sample variance of 31 consecutive integers is 31 * 32 / 12.
        assert!((stats.stddev - (31.0_f64 * 32.0 / 12.0).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn boundary_entry_at_exact_duration_is_kept() {
        let mut window = SlidingWindow::new(30);
        window.push(0, 1.0);
        window.push(30, 3.0);
        assert_eq!(window.len(), 2);

        window.push(31, 5.0);
        let kept: Vec<Timestamp> = window.entries().map(|entry| entry.timestamp).collect();
        assert_eq!(kept, vec![30, 31]);
    }

    #[test]
    fn sparse_timestamps_evict_several_entries_at_once() {
        let mut window = SlidingWindow::new(30);
        for timestamp in [0, 5, 10, 15] {
            window.push(timestamp, 1.0);
        }
        window.push(100, 9.0);
        assert_eq!(window.len(), 1);
        assert_eq!(window.stats().mean, 9.0);
    }

    #[test]
    fn sample_stddev_uses_n_minus_one() {
        let mut window = SlidingWindow::new(30);
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        for (timestamp, value) in (0..).zip(values) {
            window.push(timestamp, value);
        }
        let stats = window.stats();
        assert_eq!(stats.mean, 5.0);
        assert!((stats.stddev - (32.0_f64 / 7.0).sqrt()).abs() < 1e-12);
    }
}
