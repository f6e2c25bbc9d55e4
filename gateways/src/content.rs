//! Content-addressed store gateway.
//!
//! Content ids are opaque immutable handles; the orchestrator never
//! interprets their internal structure.

use crate::error::GatewayError;
use async_trait::async_trait;
use tidemark_types::ContentId;

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store a blob and return its content id.
    async fn put(&self, bytes: &[u8]) -> Result<ContentId, GatewayError>;

    /// Fetch a blob by content id.
    async fn get(&self, id: &ContentId) -> Result<Vec<u8>, GatewayError>;

    /// Pin a blob so the store retains it.
    async fn pin(&self, id: &ContentId) -> Result<(), GatewayError>;
}
