//! Per-project mutual exclusion.
//!
//! One async mutex per project id: handlers for the same project
//! serialize, handlers for different projects run fully in parallel.
//! Guards are owned so they can be dropped before a long collaborator
//! call and re-acquired to commit.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tidemark_types::ProjectId;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Default)]
pub struct ProjectLocks {
    locks: Mutex<HashMap<ProjectId, Arc<AsyncMutex<()>>>>,
}

impl ProjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for a project, creating it on first use.
    pub async fn acquire(&self, project: &ProjectId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap();
            Arc::clone(locks.entry(project.clone()).or_default())
        };
        lock.lock_owned().await
    }

    /// Drop the lock entry for a project whose workflow reached a terminal
    /// state. A concurrent holder keeps its guard; only the registry entry
    /// is removed.
    pub fn release(&self, project: &ProjectId) {
        self.locks.lock().unwrap().remove(project);
    }

    pub fn len(&self) -> usize {
        self.locks.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.lock().unwrap().is_empty()
    }
}
