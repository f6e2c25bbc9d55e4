//! Ledger gateway: the registry / credit-minting backend.
//!
//! The on-chain logic and wire format live behind this boundary. Calls
//! return opaque transaction identifiers; confirmation waiting happens
//! inside the implementation, bounded by the orchestrator's timeout.

use crate::error::GatewayError;
use async_trait::async_trait;
use tidemark_types::{BatchId, ContentId, RegistryProjectId, TxId};

#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Register a new project with the registry.
    ///
    /// Returns the registration transaction id and the registry's own
    /// project identifier, which later calls must use.
    async fn register(
        &self,
        name: &str,
        location: &str,
        area_sq_m: f64,
        content_id: &ContentId,
    ) -> Result<(TxId, RegistryProjectId), GatewayError>;

    /// Update a registered project's status on the ledger.
    async fn update_status(
        &self,
        registry_id: &RegistryProjectId,
        status: &str,
    ) -> Result<TxId, GatewayError>;

    /// Mint `amount` credits for a verified project.
    async fn mint(
        &self,
        to: &str,
        amount: f64,
        registry_id: &RegistryProjectId,
        batch_id: &BatchId,
    ) -> Result<TxId, GatewayError>;
}
