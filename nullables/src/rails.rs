//! Nullable payment rails.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tidemark_gateways::{GatewayError, PaymentRails};

/// Records requested transfers and returns sequential payout references.
#[derive(Default)]
pub struct NullRails {
    seq: AtomicU64,
    transfers: Mutex<Vec<(String, f64)>>,
    failures: Mutex<VecDeque<GatewayError>>,
}

impl NullRails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, error: GatewayError) {
        self.failures.lock().unwrap().push_back(error);
    }

    /// All (recipient, amount) transfers observed, in order.
    pub fn transfers(&self) -> Vec<(String, f64)> {
        self.transfers.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentRails for NullRails {
    async fn transfer(&self, recipient: &str, amount: f64) -> Result<String, GatewayError> {
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.transfers
            .lock()
            .unwrap()
            .push((recipient.to_string(), amount));
        let n = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("payout-{n}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn transfers_are_recorded_with_references() {
        let rails = NullRails::new();
        let reference = rails.transfer("operator-1", 700.0).await.unwrap();
        assert_eq!(reference, "payout-1");
        assert_eq!(rails.transfers(), vec![("operator-1".to_string(), 700.0)]);
    }
}
