use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Events emitted by the checkout and settlement paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated(Uuid),
    CheckoutSessionOpened {
        order_id: Uuid,
        session_id: String,
    },
    OrderPaid {
        order_id: Uuid,
        payment_intent_id: Option<String>,
    },
    OrderPaymentFailed {
        session_id: String,
    },
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    InventoryDecremented {
        variant_id: Uuid,
        quantity: i32,
    },
    OversellRecorded {
        order_id: Uuid,
        variant_id: Uuid,
        quantity: i32,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, logging instead of failing when the consumer is gone.
    /// Event delivery is observability plumbing and must never abort the
    /// money path that emitted it.
    pub async fn send(&self, event: Event) {
        if let Err(e) = self.sender.send(event).await {
            warn!(error = %e, "event receiver dropped, discarding event");
        }
    }
}

/// Creates an event channel plus a consumer task that logs everything it
/// receives. Returns the sender half and the consumer handle.
pub fn spawn_event_logger(buffer: usize) -> (EventSender, tokio::task::JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel(buffer);
    let handle = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match &event {
                Event::OversellRecorded {
                    order_id,
                    variant_id,
                    quantity,
                } => {
                    warn!(%order_id, %variant_id, quantity, "oversell recorded, needs manual reconciliation");
                }
                other => info!(event = ?other, "event"),
            }
        }
    });
    (EventSender::new(tx), handle)
}
