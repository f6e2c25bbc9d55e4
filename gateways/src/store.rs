//! Persistence-store gateway for durable workflow records.
//!
//! The in-memory instance map is authoritative for concurrency control;
//! the persisted copy is authoritative for recovery after restart. Writes
//! are idempotent upserts keyed by project id plus stage name, so retries
//! and crash-recovery replays cannot duplicate records.

use crate::error::GatewayError;
use async_trait::async_trait;
use tidemark_types::ProjectId;

#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Upsert the serialized workflow instance, keyed by project and the
    /// stage whose commit produced this snapshot.
    async fn upsert(
        &self,
        project: &ProjectId,
        stage: &str,
        instance: &[u8],
    ) -> Result<(), GatewayError>;

    /// Load the latest serialized instance for a project, or `None` if the
    /// project is unknown.
    async fn load(&self, project: &ProjectId) -> Result<Option<Vec<u8>>, GatewayError>;

    /// List every project with a persisted instance, for restart recovery.
    async fn list(&self) -> Result<Vec<ProjectId>, GatewayError>;
}
