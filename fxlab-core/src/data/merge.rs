//! K-way merge of per-instrument candle series into one chronological stream.
//!
//! Ordering: non-decreasing timestamp; same-timestamp events in ascending
//! series index. Callers sort series by symbol first, so ties break
//! lexicographically by symbol and every run replays identically.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use chrono::{DateTime, Utc};

use crate::domain::Candle;

/// One bar of one instrument in the merged stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarEvent {
    pub timestamp: DateTime<Utc>,
    /// Index of the series in the merge input.
    pub symbol_index: usize,
    /// Index of the candle within its series.
    pub candle_index: usize,
}

impl Ord for BarEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then(self.symbol_index.cmp(&other.symbol_index))
            .then(self.candle_index.cmp(&other.candle_index))
    }
}

impl PartialOrd for BarEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Lazy merge iterator over validated series.
pub struct MergedEvents<'a> {
    series: Vec<&'a [Candle]>,
    heap: BinaryHeap<Reverse<BarEvent>>,
}

impl<'a> MergedEvents<'a> {
    pub fn new(series: Vec<&'a [Candle]>) -> Self {
        let mut heap = BinaryHeap::with_capacity(series.len());
        for (symbol_index, candles) in series.iter().enumerate() {
            if let Some(first) = candles.first() {
                heap.push(Reverse(BarEvent {
                    timestamp: first.timestamp,
                    symbol_index,
                    candle_index: 0,
                }));
            }
        }
        Self { series, heap }
    }

    /// Total number of events the iterator will yield.
    pub fn total_events(&self) -> usize {
        self.series.iter().map(|s| s.len()).sum()
    }
}

impl Iterator for MergedEvents<'_> {
    type Item = BarEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let Reverse(event) = self.heap.pop()?;
        let next_index = event.candle_index + 1;
        if let Some(next) = self.series[event.symbol_index].get(next_index) {
            self.heap.push(Reverse(BarEvent {
                timestamp: next.timestamp,
                symbol_index: event.symbol_index,
                candle_index: next_index,
            }));
        }
        Some(event)
    }
}

/// Merge series into a fully materialized event list.
pub fn merge_series(series: &[&[Candle]]) -> Vec<BarEvent> {
    let merged = MergedEvents::new(series.to_vec());
    let mut events = Vec::with_capacity(merged.total_events());
    events.extend(merged);
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn series(start_hour: u32, count: usize) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, start_hour, 0, 0).unwrap();
        (0..count)
            .map(|i| {
                Candle::new(start + Duration::hours(i as i64), 1.0, 1.1, 0.9, 1.0, 0.0)
            })
            .collect()
    }

    #[test]
    fn merge_is_chronological_with_symbol_tiebreak() {
        let a = series(0, 3); // 00, 01, 02
        let b = series(1, 3); // 01, 02, 03
        let events = merge_series(&[&a, &b]);

        assert_eq!(events.len(), 6);
        let order: Vec<(u32, usize)> = events
            .iter()
            .map(|e| (chrono::Timelike::hour(&e.timestamp), e.symbol_index))
            .collect();
        assert_eq!(order, vec![(0, 0), (1, 0), (1, 1), (2, 0), (2, 1), (3, 1)]);
    }

    #[test]
    fn merge_single_series_is_identity() {
        let a = series(5, 4);
        let events = merge_series(&[&a]);
        let indices: Vec<usize> = events.iter().map(|e| e.candle_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn merge_handles_empty_input() {
        let empty: Vec<Candle> = Vec::new();
        assert!(merge_series(&[]).is_empty());
        assert!(merge_series(&[&empty]).is_empty());
    }

    #[test]
    fn merge_is_deterministic() {
        let a = series(0, 50);
        let b = series(3, 50);
        let c = series(1, 50);
        let first = merge_series(&[&a, &b, &c]);
        let second = merge_series(&[&a, &b, &c]);
        assert_eq!(first, second);
        assert!(first.windows(2).all(|w| w[0] <= w[1]));
    }
}
