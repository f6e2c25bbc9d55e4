//! Payment-rails gateway.
//!
//! The actual conversion and transfer machinery (bank transfers, UPI,
//! on/off-ramps) is out of scope; the orchestrator only requests transfers
//! and records the returned references.

use crate::error::GatewayError;
use async_trait::async_trait;

#[async_trait]
pub trait PaymentRails: Send + Sync {
    /// Transfer `amount` to `recipient`, returning an opaque payout
    /// reference.
    async fn transfer(&self, recipient: &str, amount: f64) -> Result<String, GatewayError>;
}
