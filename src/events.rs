use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Events emitted after a mutating transaction commits. Consumers are
/// fire-and-forget; a dropped event never affects the committed state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Inventory events
    BatchReceived {
        batch_id: i64,
        product_id: i64,
        quantity: i64,
    },
    StockDistributed {
        distribution_id: i64,
        reseller_id: i64,
        product_id: i64,
        quantity: i64,
    },

    // Reseller events
    SaleRecorded {
        sale_id: i64,
        reseller_id: i64,
        product_id: i64,
        quantity: i64,
    },
    PaymentRecorded {
        payment_id: i64,
        reseller_id: i64,
        amount: Decimal,
    },

    // Goods request lifecycle
    GoodsRequestCreated(i64),
    GoodsRequestUpdated(i64),
    GoodsRequestCancelled(i64),
    GoodsRequestApproved(i64),
    GoodsRequestRejected(i64),

    // User events
    UserCreated(i64),
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("failed to send event: {e}"))
    }
}

/// Event processing loop, spawned once at startup.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    info!("event processor started");

    while let Some(event) = receiver.recv().await {
        match &event {
            Event::BatchReceived {
                batch_id,
                product_id,
                quantity,
            } => {
                info!(batch_id, product_id, quantity, "batch received");
            }
            Event::StockDistributed {
                distribution_id,
                reseller_id,
                product_id,
                quantity,
            } => {
                info!(
                    distribution_id,
                    reseller_id, product_id, quantity, "stock distributed"
                );
            }
            Event::SaleRecorded {
                sale_id,
                reseller_id,
                product_id,
                quantity,
            } => {
                info!(sale_id, reseller_id, product_id, quantity, "sale recorded");
            }
            Event::PaymentRecorded {
                payment_id,
                reseller_id,
                amount,
            } => {
                info!(payment_id, reseller_id, %amount, "payment recorded");
            }
            other => {
                info!(event = ?other, "event processed");
            }
        }
    }

    warn!("event channel closed, processor exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sender_delivers_events() {
        let (tx, mut rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);

        sender
            .send(Event::GoodsRequestCreated(7))
            .await
            .expect("send should succeed");

        match rx.recv().await {
            Some(Event::GoodsRequestCreated(id)) => assert_eq!(id, 7),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn send_fails_after_receiver_drops() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let sender = EventSender::new(tx);
        assert!(sender.send(Event::UserCreated(1)).await.is_err());
    }
}
