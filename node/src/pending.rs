//! Parking area for stage events that arrived before their predecessor
//! resolved.
//!
//! Within one project, stage events are processed strictly in declared
//! order: an early arrival is parked here, not dropped, and replayed once
//! the step that was in flight commits.

use crate::events::StageCommand;
use std::collections::{HashMap, VecDeque};
use tidemark_types::ProjectId;

#[derive(Default)]
pub struct PendingEvents {
    parked: HashMap<ProjectId, VecDeque<StageCommand>>,
}

impl PendingEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a command that cannot run yet.
    pub fn park(&mut self, command: StageCommand) {
        self.parked
            .entry(command.project_id().clone())
            .or_default()
            .push_back(command);
    }

    /// Take the next parked command for a project, if any.
    pub fn take_next(&mut self, project: &ProjectId) -> Option<StageCommand> {
        let queue = self.parked.get_mut(project)?;
        let command = queue.pop_front();
        if queue.is_empty() {
            self.parked.remove(project);
        }
        command
    }

    /// Drop everything parked for a project (it reached a terminal state).
    pub fn discard(&mut self, project: &ProjectId) -> usize {
        self.parked.remove(project).map_or(0, |q| q.len())
    }

    pub fn len(&self) -> usize {
        self.parked.values().map(|q| q.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.parked.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_workflow::ImpactMetrics;

    fn reporting(project: &str) -> StageCommand {
        StageCommand::Reporting {
            project_id: ProjectId::new(project),
            metrics: ImpactMetrics {
                co2_sequestered_t: 1.0,
                area_restored_ha: 1.0,
                community_beneficiaries: 1,
            },
        }
    }

    fn retry(project: &str) -> StageCommand {
        StageCommand::Retry {
            project_id: ProjectId::new(project),
        }
    }

    #[test]
    fn parked_commands_replay_in_arrival_order() {
        let mut pending = PendingEvents::new();
        pending.park(reporting("p1"));
        pending.park(retry("p1"));

        let project = ProjectId::new("p1");
        assert!(matches!(
            pending.take_next(&project),
            Some(StageCommand::Reporting { .. })
        ));
        assert!(matches!(
            pending.take_next(&project),
            Some(StageCommand::Retry { .. })
        ));
        assert!(pending.take_next(&project).is_none());
        assert!(pending.is_empty());
    }

    #[test]
    fn projects_are_isolated() {
        let mut pending = PendingEvents::new();
        pending.park(reporting("p1"));
        pending.park(reporting("p2"));

        assert!(pending.take_next(&ProjectId::new("p1")).is_some());
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn discard_empties_a_project_queue() {
        let mut pending = PendingEvents::new();
        pending.park(reporting("p1"));
        pending.park(retry("p1"));
        assert_eq!(pending.discard(&ProjectId::new("p1")), 2);
        assert!(pending.is_empty());
    }
}
