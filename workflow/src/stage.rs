//! The eight lifecycle stages, in declaration order.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One discrete, ordered phase of a project's lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Upload,
    AdminReview,
    MrvCollection,
    Verification,
    Tokenization,
    Purchase,
    PaymentDistribution,
    Reporting,
}

impl Stage {
    /// All stages in declaration order.
    pub const ALL: [Stage; 8] = [
        Stage::Upload,
        Stage::AdminReview,
        Stage::MrvCollection,
        Stage::Verification,
        Stage::Tokenization,
        Stage::Purchase,
        Stage::PaymentDistribution,
        Stage::Reporting,
    ];

    /// Zero-based position in the declared order.
    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|s| s == self).expect("stage in ALL")
    }

    /// The stage that follows this one, if any.
    pub fn next(&self) -> Option<Stage> {
        Self::ALL.get(self.index() + 1).copied()
    }

    /// Stable name used for persistence keys and notification payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Upload => "upload",
            Stage::AdminReview => "admin_review",
            Stage::MrvCollection => "mrv_collection",
            Stage::Verification => "verification",
            Stage::Tokenization => "tokenization",
            Stage::Purchase => "purchase",
            Stage::PaymentDistribution => "payment_distribution",
            Stage::Reporting => "reporting",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_are_strictly_ordered() {
        for pair in Stage::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
            assert_eq!(pair[0].next(), Some(pair[1]));
        }
    }

    #[test]
    fn reporting_is_last() {
        assert_eq!(Stage::Reporting.next(), None);
        assert_eq!(Stage::Reporting.index(), 7);
    }

    #[test]
    fn names_are_unique() {
        let mut names: Vec<_> = Stage::ALL.iter().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Stage::ALL.len());
    }
}
