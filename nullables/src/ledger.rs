//! Nullable ledger gateway with deterministic transaction ids and
//! scriptable failures.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tidemark_gateways::{GatewayError, LedgerGateway};
use tidemark_types::{BatchId, ContentId, RegistryProjectId, TxId};

/// A call observed by the nullable ledger, recorded for assertions.
#[derive(Clone, Debug, PartialEq)]
pub enum LedgerCall {
    Register { name: String, area_sq_m: f64 },
    UpdateStatus { registry_id: RegistryProjectId, status: String },
    Mint { to: String, amount: f64, batch_id: BatchId },
}

/// Deterministic in-memory ledger double.
///
/// Transaction ids are sequential (`tx-1`, `tx-2`, ...). Failures queued
/// with [`NullLedger::fail_next`] are consumed one per call before any
/// call succeeds again.
#[derive(Default)]
pub struct NullLedger {
    seq: AtomicU64,
    failures: Mutex<VecDeque<GatewayError>>,
    calls: Mutex<Vec<LedgerCall>>,
}

impl NullLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a failure to be returned by the next call.
    pub fn fail_next(&self, error: GatewayError) {
        self.failures.lock().unwrap().push_back(error);
    }

    /// Queue `n` consecutive timeouts.
    pub fn fail_with_timeouts(&self, n: usize) {
        let mut failures = self.failures.lock().unwrap();
        for _ in 0..n {
            failures.push_back(GatewayError::Timeout(30));
        }
    }

    /// All calls observed so far, including failed ones.
    pub fn calls(&self) -> Vec<LedgerCall> {
        self.calls.lock().unwrap().clone()
    }

    fn next_tx(&self) -> TxId {
        let n = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        TxId::new(format!("tx-{n}"))
    }

    fn take_failure(&self) -> Option<GatewayError> {
        self.failures.lock().unwrap().pop_front()
    }
}

#[async_trait]
impl LedgerGateway for NullLedger {
    async fn register(
        &self,
        name: &str,
        _location: &str,
        area_sq_m: f64,
        _content_id: &ContentId,
    ) -> Result<(TxId, RegistryProjectId), GatewayError> {
        self.calls.lock().unwrap().push(LedgerCall::Register {
            name: name.to_string(),
            area_sq_m,
        });
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        let tx = self.next_tx();
        let registry_id = RegistryProjectId::new(format!("reg-{}", tx.as_str()));
        Ok((tx, registry_id))
    }

    async fn update_status(
        &self,
        registry_id: &RegistryProjectId,
        status: &str,
    ) -> Result<TxId, GatewayError> {
        self.calls.lock().unwrap().push(LedgerCall::UpdateStatus {
            registry_id: registry_id.clone(),
            status: status.to_string(),
        });
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        Ok(self.next_tx())
    }

    async fn mint(
        &self,
        to: &str,
        amount: f64,
        _registry_id: &RegistryProjectId,
        batch_id: &BatchId,
    ) -> Result<TxId, GatewayError> {
        self.calls.lock().unwrap().push(LedgerCall::Mint {
            to: to.to_string(),
            amount,
            batch_id: batch_id.clone(),
        });
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        Ok(self.next_tx())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn transaction_ids_are_sequential() {
        let ledger = NullLedger::new();
        let (tx1, reg) = ledger
            .register("p", "loc", 1.0, &ContentId::new("c"))
            .await
            .unwrap();
        let tx2 = ledger.update_status(&reg, "approved").await.unwrap();
        assert_eq!(tx1.as_str(), "tx-1");
        assert_eq!(tx2.as_str(), "tx-2");
    }

    #[tokio::test]
    async fn queued_failures_are_consumed_in_order() {
        let ledger = NullLedger::new();
        ledger.fail_with_timeouts(2);

        let reg = RegistryProjectId::new("reg-1");
        let batch = BatchId::new("b-1");
        assert!(ledger.mint("op", 1.0, &reg, &batch).await.is_err());
        assert!(ledger.mint("op", 1.0, &reg, &batch).await.is_err());
        assert!(ledger.mint("op", 1.0, &reg, &batch).await.is_ok());
        assert_eq!(ledger.calls().len(), 3);
    }
}
