//! Prediction statistics

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::ensemble::{EnsembleVerdict, ModelId};

/// Lock-free counters updated by every prediction
pub struct PipelineStats {
    started_at: DateTime<Utc>,
    requests: AtomicU64,
    spam_detected: AtomicU64,
    ham_detected: AtomicU64,
    rejected: AtomicU64,
    failed: AtomicU64,
    /// One counter per configured member, in configuration order
    member_unavailable: Vec<(ModelId, AtomicU64)>,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub started_at: DateTime<Utc>,
    /// Predictions requested
    pub requests: u64,
    /// Verdicts that came out spam
    pub spam_detected: u64,
    /// Verdicts that came out ham
    pub ham_detected: u64,
    /// Requests refused as invalid input
    pub rejected: u64,
    /// Requests where no verdict could be produced
    pub failed: u64,
    /// Times each member was unavailable
    pub member_unavailable: Vec<MemberUnavailableCount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberUnavailableCount {
    pub model_id: ModelId,
    pub count: u64,
}

impl PipelineStats {
    pub fn new<'a>(members: impl IntoIterator<Item = &'a ModelId>) -> Self {
        Self {
            started_at: Utc::now(),
            requests: AtomicU64::new(0),
            spam_detected: AtomicU64::new(0),
            ham_detected: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            member_unavailable: members
                .into_iter()
                .map(|id| (id.clone(), AtomicU64::new(0)))
                .collect(),
        }
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_verdict(&self, verdict: &EnsembleVerdict) {
        if verdict.is_spam {
            self.spam_detected.fetch_add(1, Ordering::Relaxed);
        } else {
            self.ham_detected.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_unavailable(&self, member_index: usize) {
        if let Some((_, counter)) = self.member_unavailable.get(member_index) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            started_at: self.started_at,
            requests: self.requests.load(Ordering::Relaxed),
            spam_detected: self.spam_detected.load(Ordering::Relaxed),
            ham_detected: self.ham_detected.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            member_unavailable: self
                .member_unavailable
                .iter()
                .map(|(id, count)| MemberUnavailableCount {
                    model_id: id.clone(),
                    count: count.load(Ordering::Relaxed),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let ids = [ModelId::from("svm"), ModelId::from("naive_bayes")];
        let stats = PipelineStats::new(&ids);

        stats.record_request();
        stats.record_request();
        stats.record_rejected();
        stats.record_unavailable(1);
        stats.record_unavailable(1);
        stats.record_unavailable(7);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.requests, 2);
        assert_eq!(snapshot.rejected, 1);
        assert_eq!(snapshot.member_unavailable[0].count, 0);
        assert_eq!(snapshot.member_unavailable[1].count, 2);
    }
}
