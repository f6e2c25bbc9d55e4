//! Bounded per-submitter submission history.
//!
//! Feeds the fraud heuristic's duplicate-GPS and frequency checks. The
//! log is bounded per submitter so a prolific agent cannot grow memory
//! without limit; eviction drops the oldest entries, which are also the
//! ones that age out of the heuristic's 24-hour window first.

use std::collections::{HashMap, VecDeque};
use tidemark_evidence::SubmissionRecord;
use tidemark_types::SubmitterId;

pub struct SubmissionLog {
    entries: HashMap<SubmitterId, VecDeque<SubmissionRecord>>,
    max_per_submitter: usize,
}

impl SubmissionLog {
    pub fn new(max_per_submitter: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_per_submitter: max_per_submitter.max(1),
        }
    }

    /// Record a submission, evicting the oldest entry when full.
    pub fn record(&mut self, record: SubmissionRecord) {
        let queue = self.entries.entry(record.submitter.clone()).or_default();
        if queue.len() >= self.max_per_submitter {
            queue.pop_front();
        }
        queue.push_back(record);
    }

    /// The submitter's history, oldest first.
    pub fn history(&self, submitter: &SubmitterId) -> Vec<SubmissionRecord> {
        self.entries
            .get(submitter)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn submitter_count(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_types::{GeoPoint, Timestamp};

    fn record(submitter: &str, lat: f64, at: u64) -> SubmissionRecord {
        SubmissionRecord {
            submitter: SubmitterId::new(submitter),
            point: GeoPoint::new(lat, 77.0).unwrap(),
            submitted_at: Timestamp::new(at),
        }
    }

    #[test]
    fn history_is_oldest_first() {
        let mut log = SubmissionLog::new(8);
        log.record(record("a", 10.0, 100));
        log.record(record("a", 11.0, 200));

        let history = log.history(&SubmitterId::new("a"));
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].submitted_at, Timestamp::new(100));
    }

    #[test]
    fn eviction_drops_the_oldest() {
        let mut log = SubmissionLog::new(2);
        log.record(record("a", 10.0, 100));
        log.record(record("a", 11.0, 200));
        log.record(record("a", 12.0, 300));

        let history = log.history(&SubmitterId::new("a"));
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].submitted_at, Timestamp::new(200));
    }

    #[test]
    fn submitters_are_isolated() {
        let mut log = SubmissionLog::new(8);
        log.record(record("a", 10.0, 100));
        log.record(record("b", 20.0, 100));
        assert_eq!(log.history(&SubmitterId::new("a")).len(), 1);
        assert_eq!(log.submitter_count(), 2);
    }
}
