use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::OrderStatus;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the channel is closed.
    /// Events are emitted after commit, so a lost event never undoes a write.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("{}", e);
        }
    }
}

/// Domain events raised by the storefront core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // Cart events
    CartCreated {
        cart_id: Uuid,
        user_id: Uuid,
    },
    CartItemAdded {
        cart_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    },
    CartItemUpdated {
        cart_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    },
    CartItemRemoved {
        cart_id: Uuid,
        item_id: Uuid,
    },
    CartCleared(Uuid),

    // Inventory events
    StockDecremented {
        product_id: Uuid,
        quantity: i32,
    },
    ProductRetired {
        product_id: Uuid,
        deleted: bool,
    },

    // Order events
    OrderCreated(Uuid),
    CheckoutCompleted {
        order_id: Uuid,
        user_id: Uuid,
        total: Decimal,
    },
    OrderStatusChanged {
        order_id: Uuid,
        old_status: OrderStatus,
        new_status: OrderStatus,
        changed_by: Uuid,
        at: DateTime<Utc>,
    },
    OrderCompleted(Uuid),
    OrderCancelled(Uuid),
}

/// Drains the event channel, logging every event. Ends when all senders drop.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::CheckoutCompleted {
                order_id,
                user_id,
                total,
            } => {
                info!(order_id = %order_id, user_id = %user_id, total = %total, "checkout completed");
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
                changed_by,
                ..
            } => {
                info!(
                    order_id = %order_id,
                    from = %old_status,
                    to = %new_status,
                    changed_by = %changed_by,
                    "order status changed"
                );
            }
            Event::ProductRetired {
                product_id,
                deleted,
            } => {
                info!(product_id = %product_id, deleted, "product retired");
            }
            other => info!("Received event: {:?}", other),
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_to_receiver() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        let id = Uuid::new_v4();

        sender.send(Event::OrderCreated(id)).await.unwrap();
        assert_eq!(rx.recv().await, Some(Event::OrderCreated(id)));
    }

    #[tokio::test]
    async fn send_or_log_survives_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        assert!(sender.send(Event::CartCleared(Uuid::new_v4())).await.is_err());
        sender.send_or_log(Event::CartCleared(Uuid::new_v4())).await;
    }

    #[tokio::test]
    async fn process_events_stops_when_senders_drop() {
        let (tx, rx) = mpsc::channel(4);
        let handle = tokio::spawn(process_events(rx));
        tx.send(Event::OrderCompleted(Uuid::new_v4())).await.unwrap();
        drop(tx);
        handle.await.unwrap();
    }
}
