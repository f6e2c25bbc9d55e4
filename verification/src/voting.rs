//! Community voting window for borderline verifications.
//!
//! A COMMUNITY_REVIEW recommendation opens a bounded window during which
//! community members vote on the submission. The window itself is plain
//! state; opening it, collecting ballots, and acting on the tally are the
//! orchestrator's responsibility.

use serde::{Deserialize, Serialize};
use tidemark_types::{ProjectId, SubmitterId, Timestamp};

/// One community member's vote.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VoteBallot {
    pub voter: SubmitterId,
    pub approve: bool,
    pub cast_at: Timestamp,
}

/// A bounded community-review voting window for one project.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VotingWindow {
    pub project_id: ProjectId,
    pub opened_at: Timestamp,
    pub duration_secs: u64,
    pub ballots: Vec<VoteBallot>,
}

impl VotingWindow {
    pub fn open(project_id: ProjectId, opened_at: Timestamp, duration_secs: u64) -> Self {
        Self {
            project_id,
            opened_at,
            duration_secs,
            ballots: Vec::new(),
        }
    }

    pub fn closes_at(&self) -> Timestamp {
        Timestamp::new(self.opened_at.as_secs().saturating_add(self.duration_secs))
    }

    pub fn is_open(&self, now: Timestamp) -> bool {
        !self.opened_at.has_expired(self.duration_secs, now)
    }

    /// Record a ballot. Ballots after the window closes, or repeat ballots
    /// from the same voter, are ignored and reported as `false`.
    pub fn record(&mut self, ballot: VoteBallot, now: Timestamp) -> bool {
        if !self.is_open(now) {
            return false;
        }
        if self.ballots.iter().any(|b| b.voter == ballot.voter) {
            return false;
        }
        self.ballots.push(ballot);
        true
    }

    /// Simple-majority tally: `Some(true)` to approve, `Some(false)` to
    /// reject, `None` while no ballots have been cast.
    pub fn tally(&self) -> Option<bool> {
        if self.ballots.is_empty() {
            return None;
        }
        let approvals = self.ballots.iter().filter(|b| b.approve).count();
        Some(approvals * 2 > self.ballots.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> VotingWindow {
        VotingWindow::open(ProjectId::new("p1"), Timestamp::new(1_000), 3_600)
    }

    fn ballot(voter: &str, approve: bool, at: u64) -> VoteBallot {
        VoteBallot {
            voter: SubmitterId::new(voter),
            approve,
            cast_at: Timestamp::new(at),
        }
    }

    #[test]
    fn ballots_inside_the_window_are_recorded() {
        let mut w = window();
        assert!(w.record(ballot("a", true, 1_100), Timestamp::new(1_100)));
        assert_eq!(w.ballots.len(), 1);
    }

    #[test]
    fn ballots_after_close_are_ignored() {
        let mut w = window();
        assert!(!w.record(ballot("a", true, 5_000), Timestamp::new(5_000)));
        assert!(w.ballots.is_empty());
    }

    #[test]
    fn repeat_voters_are_ignored() {
        let mut w = window();
        assert!(w.record(ballot("a", true, 1_100), Timestamp::new(1_100)));
        assert!(!w.record(ballot("a", false, 1_200), Timestamp::new(1_200)));
        assert_eq!(w.ballots.len(), 1);
    }

    #[test]
    fn majority_tally() {
        let mut w = window();
        w.record(ballot("a", true, 1_100), Timestamp::new(1_100));
        w.record(ballot("b", true, 1_200), Timestamp::new(1_200));
        w.record(ballot("c", false, 1_300), Timestamp::new(1_300));
        assert_eq!(w.tally(), Some(true));
    }

    #[test]
    fn tie_does_not_approve() {
        let mut w = window();
        w.record(ballot("a", true, 1_100), Timestamp::new(1_100));
        w.record(ballot("b", false, 1_200), Timestamp::new(1_200));
        assert_eq!(w.tally(), Some(false));
    }

    #[test]
    fn empty_window_has_no_tally() {
        assert_eq!(window().tally(), None);
    }
}
