//! Nullable notification bus.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use tidemark_gateways::{GatewayError, NotificationBus, NotificationEvent};

/// Records every published event for assertions.
#[derive(Default)]
pub struct NullBus {
    events: Mutex<Vec<NotificationEvent>>,
    failures: Mutex<VecDeque<GatewayError>>,
}

impl NullBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, error: GatewayError) {
        self.failures.lock().unwrap().push_back(error);
    }

    /// All events published so far, in order.
    pub fn published(&self) -> Vec<NotificationEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Kinds of all published events, in order.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.kind()).collect()
    }
}

#[async_trait]
impl NotificationBus for NullBus {
    async fn publish(&self, event: NotificationEvent) -> Result<(), GatewayError> {
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidemark_types::{ProjectId, TxId};

    #[tokio::test]
    async fn published_events_are_recorded_in_order() {
        let bus = NullBus::new();
        bus.publish(NotificationEvent::ProjectUploaded {
            project_id: ProjectId::new("p1"),
            name: "test".to_string(),
            registration_tx: TxId::new("tx-1"),
        })
        .await
        .unwrap();
        bus.publish(NotificationEvent::MrvCollected {
            project_id: ProjectId::new("p1"),
            evidence_count: 3,
        })
        .await
        .unwrap();

        assert_eq!(bus.kinds(), vec!["project_uploaded", "mrv_collected"]);
    }
}
