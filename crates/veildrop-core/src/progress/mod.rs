//! Startup progress aggregation for a share session.
//!
//! While the onion service spins up it reports per-file byte counts. This
//! module folds that stream into the two bounded percentages carried by the
//! starting state:
//!
//! - `files_progress` - share of files fully prepared
//! - `total_progress` - share of bytes prepared across all files
//!
//! The aggregator keeps only running totals per file; samples are not
//! retained. One aggregator lives for exactly one starting episode.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A per-file progress report from the onion service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSample {
    /// Opaque identifier of the file being prepared
    pub file_id: String,
    /// Bytes prepared so far
    pub bytes_done: u64,
    /// Total bytes for this file
    pub bytes_total: u64,
}

/// The aggregate progress pair consumed by the session state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    /// Percentage of files fully prepared, 0-100
    pub files_progress: u8,
    /// Percentage of bytes prepared across all files, 0-100
    pub total_progress: u8,
}

#[derive(Debug, Clone, Copy)]
struct FileTotals {
    done: u64,
    total: u64,
}

/// Accumulates per-file progress into a session-wide summary.
#[derive(Debug, Default)]
pub struct ProgressAggregator {
    files: HashMap<String, FileTotals>,
    /// Highest total percentage reported this episode. Total progress is
    /// monotonically non-decreasing within an episode.
    high_water: u8,
}

impl ProgressAggregator {
    /// Create an empty aggregator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sample and return the updated summary.
    ///
    /// Byte counters are cumulative, so a sample can only move a file's
    /// `bytes_done` forward.
    pub fn record(&mut self, sample: &ProgressSample) -> ProgressSummary {
        let entry = self
            .files
            .entry(sample.file_id.clone())
            .or_insert(FileTotals { done: 0, total: 0 });
        entry.done = entry.done.max(sample.bytes_done);
        entry.total = sample.bytes_total;

        let summary = self.compute();
        self.high_water = summary.total_progress;
        summary
    }

    /// The current summary.
    #[must_use]
    pub fn summary(&self) -> ProgressSummary {
        self.compute()
    }

    /// Whether nothing has been recorded this episode.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Clear all running totals. Called once per transition into the
    /// starting state.
    pub fn reset(&mut self) {
        self.files.clear();
        self.high_water = 0;
    }

    fn compute(&self) -> ProgressSummary {
        if self.files.is_empty() {
            return ProgressSummary::default();
        }

        let file_count = self.files.len() as u64;
        let complete = self.files.values().filter(|f| f.done >= f.total).count() as u64;

        let sum_done: u64 = self.files.values().map(|f| f.done).sum();
        let sum_total: u64 = self.files.values().map(|f| f.total).sum();

        #[allow(clippy::cast_possible_truncation)]
        let files_progress = (complete * 100 / file_count) as u8;

        #[allow(clippy::cast_possible_truncation)]
        let total_progress = if sum_total == 0 {
            0
        } else {
            (sum_done.min(sum_total) * 100 / sum_total) as u8
        };

        ProgressSummary {
            files_progress,
            total_progress: total_progress.max(self.high_water),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(file_id: &str, done: u64, total: u64) -> ProgressSample {
        ProgressSample {
            file_id: file_id.to_string(),
            bytes_done: done,
            bytes_total: total,
        }
    }

    #[test]
    fn test_empty_summary_is_zero() {
        let agg = ProgressAggregator::new();
        assert_eq!(agg.summary(), ProgressSummary::default());
        assert!(agg.is_empty());
    }

    #[test]
    fn test_two_half_files_total_fifty() {
        let mut agg = ProgressAggregator::new();
        agg.record(&sample("a", 50, 100));
        let summary = agg.record(&sample("b", 50, 100));

        assert_eq!(summary.total_progress, 50);
        assert_eq!(summary.files_progress, 0);
    }

    #[test]
    fn test_all_files_complete_is_hundred() {
        let mut agg = ProgressAggregator::new();
        agg.reset();
        for i in 0..5 {
            agg.record(&sample(&format!("f{i}"), 1000, 1000));
        }

        let summary = agg.summary();
        assert_eq!(summary.total_progress, 100);
        assert_eq!(summary.files_progress, 100);
    }

    #[test]
    fn test_percentages_round_down() {
        let mut agg = ProgressAggregator::new();
        agg.record(&sample("b", 0, 3));
        let summary = agg.record(&sample("a", 1, 3));

        // 1/6 bytes, 0/2 files
        assert_eq!(summary.total_progress, 16);
        assert_eq!(summary.files_progress, 0);
    }

    #[test]
    fn test_zero_length_files_count_as_complete() {
        let mut agg = ProgressAggregator::new();
        let summary = agg.record(&sample("empty", 0, 0));

        assert_eq!(summary.files_progress, 100);
        assert_eq!(summary.total_progress, 0);
    }

    #[test]
    fn test_done_never_regresses() {
        let mut agg = ProgressAggregator::new();
        agg.record(&sample("a", 80, 100));
        let summary = agg.record(&sample("a", 30, 100));

        assert_eq!(summary.total_progress, 80);
    }

    #[test]
    fn test_total_progress_monotonic_when_total_grows() {
        let mut agg = ProgressAggregator::new();
        agg.record(&sample("a", 100, 100));
        // A second file appearing halves the raw figure; the episode figure
        // must not move backwards.
        let summary = agg.record(&sample("b", 0, 100));

        assert_eq!(summary.total_progress, 100);
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut agg = ProgressAggregator::new();
        agg.record(&sample("never-seen-before", 10, 20));
        agg.reset();

        assert!(agg.is_empty());
        assert_eq!(agg.summary(), ProgressSummary::default());
    }

    #[test]
    fn test_clamped_when_done_exceeds_total() {
        let mut agg = ProgressAggregator::new();
        let summary = agg.record(&sample("a", 150, 100));

        assert_eq!(summary.total_progress, 100);
        assert_eq!(summary.files_progress, 100);
    }
}
