use crate::{
    errors::ServiceError,
    payments::webhook::WebhookEvent,
    services::{
        inventory::{DecrementOutcome, InventoryService},
        orders::{OrderService, SettlementOutcome},
    },
};
use metrics::counter;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Applies verified provider events to local order and inventory state.
///
/// Delivery is at-least-once and possibly out of order, so every handler
/// here must be idempotent per session id. The conditional writes in the
/// order and inventory services carry that guarantee; this processor only
/// sequences them.
pub struct PaymentWebhookProcessor {
    orders: Arc<OrderService>,
    inventory: Arc<InventoryService>,
}

impl PaymentWebhookProcessor {
    pub fn new(orders: Arc<OrderService>, inventory: Arc<InventoryService>) -> Self {
        Self { orders, inventory }
    }

    #[instrument(skip(self, event))]
    pub async fn process(&self, event: WebhookEvent) -> Result<(), ServiceError> {
        match event {
            WebhookEvent::PaymentCompleted {
                session_id,
                payment_intent_id,
                shipping_name,
                shipping_address,
            } => {
                self.handle_completed(
                    &session_id,
                    payment_intent_id,
                    shipping_name,
                    shipping_address.map(|a| a.to_json_string()),
                )
                .await
            }
            WebhookEvent::PaymentFailed { session_id } => self.handle_failed(&session_id).await,
            WebhookEvent::Ignored { kind } => {
                info!(kind, "ignoring unhandled webhook event type");
                Ok(())
            }
        }
    }

    async fn handle_completed(
        &self,
        session_id: &str,
        payment_intent_id: Option<String>,
        shipping_name: Option<String>,
        shipping_address: Option<String>,
    ) -> Result<(), ServiceError> {
        counter!("payment_completed_events_total", 1);

        let outcome = self
            .orders
            .attach_payment_details(session_id, payment_intent_id, shipping_name, shipping_address)
            .await?;

        let (order, items) = match outcome {
            SettlementOutcome::Settled { order, items } => (order, items),
            SettlementOutcome::AlreadySettled => {
                // Duplicate delivery. Acknowledge without re-decrementing.
                info!(session_id, "order already paid, duplicate event acknowledged");
                return Ok(());
            }
            SettlementOutcome::NotFound => {
                // Stale or foreign event. Acknowledging keeps the provider
                // from retrying a delivery we can never act on.
                info!(session_id, "no order for session, event acknowledged");
                counter!("webhook_unmatched_total", 1);
                return Ok(());
            }
            SettlementOutcome::Superseded { status } => {
                warn!(session_id, %status, "completed event for non-pending order ignored");
                return Ok(());
            }
        };

        for item in items {
            let Some(variant_id) = item.variant_id else {
                continue;
            };
            match self
                .inventory
                .decrement_stock(variant_id, item.quantity)
                .await?
            {
                DecrementOutcome::Decremented => {}
                DecrementOutcome::Insufficient => {
                    self.inventory
                        .record_oversell(order.id, variant_id, item.quantity)
                        .await?;
                }
            }
        }

        Ok(())
    }

    async fn handle_failed(&self, session_id: &str) -> Result<(), ServiceError> {
        counter!("payment_failed_events_total", 1);
        let affected = self.orders.mark_failed_by_session(session_id).await?;
        if affected == 0 {
            info!(session_id, "failure event matched no pending order");
        }
        Ok(())
    }
}
