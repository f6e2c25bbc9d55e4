//! Nullable persistence store.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tidemark_gateways::{GatewayError, ProjectStore};
use tidemark_types::ProjectId;

/// Deterministic in-memory persistence double.
///
/// Records every upsert key so tests can assert the idempotent-write
/// property: retried commits for the same (project, stage) overwrite, they
/// never accumulate.
#[derive(Default)]
pub struct NullProjectStore {
    instances: Mutex<HashMap<ProjectId, Vec<u8>>>,
    upsert_keys: Mutex<Vec<(ProjectId, String)>>,
    failures: Mutex<VecDeque<GatewayError>>,
}

impl NullProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, error: GatewayError) {
        self.failures.lock().unwrap().push_back(error);
    }

    /// Every (project, stage) upsert observed, in order.
    pub fn upsert_keys(&self) -> Vec<(ProjectId, String)> {
        self.upsert_keys.lock().unwrap().clone()
    }

    fn take_failure(&self) -> Option<GatewayError> {
        self.failures.lock().unwrap().pop_front()
    }
}

#[async_trait]
impl ProjectStore for NullProjectStore {
    async fn upsert(
        &self,
        project: &ProjectId,
        stage: &str,
        instance: &[u8],
    ) -> Result<(), GatewayError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        self.upsert_keys
            .lock()
            .unwrap()
            .push((project.clone(), stage.to_string()));
        self.instances
            .lock()
            .unwrap()
            .insert(project.clone(), instance.to_vec());
        Ok(())
    }

    async fn load(&self, project: &ProjectId) -> Result<Option<Vec<u8>>, GatewayError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        Ok(self.instances.lock().unwrap().get(project).cloned())
    }

    async fn list(&self) -> Result<Vec<ProjectId>, GatewayError> {
        let mut projects: Vec<ProjectId> =
            self.instances.lock().unwrap().keys().cloned().collect();
        projects.sort();
        Ok(projects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_overwrites_rather_than_duplicating() {
        let store = NullProjectStore::new();
        let project = ProjectId::new("p1");
        store.upsert(&project, "upload", b"v1").await.unwrap();
        store.upsert(&project, "upload", b"v2").await.unwrap();

        assert_eq!(store.load(&project).await.unwrap().unwrap(), b"v2");
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_projects_load_none() {
        let store = NullProjectStore::new();
        assert!(store.load(&ProjectId::new("ghost")).await.unwrap().is_none());
    }
}
