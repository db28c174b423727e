use crate::{
    entities::{
        order::{self, provisional_session_id, OrderStatus},
        order_item,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Fields of an order known before persistence.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub email: String,
    pub user_id: Option<Uuid>,
    pub currency: String,
    pub total_cents: i64,
    pub shipping_name: Option<String>,
    pub shipping_address: Option<String>,
}

/// Snapshotted order line captured at checkout time.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: i32,
    pub unit_price_cents: i64,
}

/// Result of applying a payment-completed event against the store.
#[derive(Debug)]
pub enum SettlementOutcome {
    /// This call won the pending-to-paid transition.
    Settled {
        order: order::Model,
        items: Vec<order_item::Model>,
    },
    /// The order was already paid; nothing changed.
    AlreadySettled,
    /// No order carries this session id.
    NotFound,
    /// The order is in a non-pending, non-paid state (failed/cancelled);
    /// the event is acknowledged without touching it.
    Superseded { status: OrderStatus },
}

/// Persistence boundary for orders, enforcing the status state machine.
///
/// Every mutation that settles money is a conditional write so that
/// concurrent webhook deliveries and multiple service instances cannot
/// double-apply a transition.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Creates a pending order and its item snapshots in one transaction.
    ///
    /// The order is written with a provisional session id before the
    /// provider session exists, so a failure later in checkout leaves a
    /// recoverable pending row instead of losing the price snapshot.
    #[instrument(skip(self, new_order, items), fields(email = %new_order.email, items = items.len()))]
    pub async fn create_with_items(
        &self,
        new_order: NewOrder,
        items: Vec<NewOrderItem>,
    ) -> Result<order::Model, ServiceError> {
        let order_id = Uuid::new_v4();
        let now = Utc::now();

        let txn = self.db.begin().await?;

        let order = order::ActiveModel {
            id: Set(order_id),
            checkout_session_id: Set(provisional_session_id()),
            payment_intent_id: Set(None),
            email: Set(new_order.email),
            user_id: Set(new_order.user_id),
            currency: Set(new_order.currency),
            total_cents: Set(new_order.total_cents),
            status: Set(OrderStatus::Pending),
            shipping_name: Set(new_order.shipping_name),
            shipping_address: Set(new_order.shipping_address),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        for item in items {
            order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(item.product_id),
                variant_id: Set(item.variant_id),
                quantity: Set(item.quantity),
                unit_price_cents: Set(item.unit_price_cents),
                created_at: Set(now),
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;

        info!(%order_id, total_cents = order.total_cents, "pending order created");
        self.event_sender.send(Event::OrderCreated(order_id)).await;
        Ok(order)
    }

    pub async fn find_by_id(&self, order_id: Uuid) -> Result<Option<order::Model>, ServiceError> {
        Ok(order::Entity::find_by_id(order_id).one(&*self.db).await?)
    }

    pub async fn find_by_session_id(
        &self,
        session_id: &str,
    ) -> Result<Option<order::Model>, ServiceError> {
        Ok(order::Entity::find()
            .filter(order::Column::CheckoutSessionId.eq(session_id))
            .one(&*self.db)
            .await?)
    }

    pub async fn items_for(&self, order: &order::Model) -> Result<Vec<order_item::Model>, ServiceError> {
        Ok(order.find_related(order_item::Entity).all(&*self.db).await?)
    }

    /// Replaces the provisional session id with the provider-issued one.
    #[instrument(skip(self))]
    pub async fn link_session(
        &self,
        order_id: Uuid,
        session_id: &str,
    ) -> Result<(), ServiceError> {
        let order = self
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let mut active: order::ActiveModel = order.into();
        active.checkout_session_id = Set(session_id.to_string());
        active.update(&*self.db).await?;
        Ok(())
    }

    /// Explicit status change (the administrative override path). Guarded by
    /// the transition table: moves out of `paid` are rejected.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        next: OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        let order = self
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let current = order.status;
        if current == next {
            return Ok(order);
        }
        if !current.can_transition_to(next) {
            return Err(ServiceError::TransitionRejected(format!(
                "order {} cannot move from {} to {}",
                order_id, current, next
            )));
        }

        let mut active: order::ActiveModel = order.into();
        active.status = Set(next);
        let updated = active.update(&*self.db).await?;

        info!(%order_id, from = %current, to = %next, "order status changed");
        self.event_sender
            .send(Event::OrderStatusChanged {
                order_id,
                old_status: current.to_string(),
                new_status: next.to_string(),
            })
            .await;
        Ok(updated)
    }

    /// Applies a payment-completed event: a single conditional UPDATE flips
    /// the order from `pending` to `paid` and records the provider's payment
    /// intent and authoritative shipping details. Exactly one caller can win
    /// this write per order; everyone else observes an already-settled row.
    #[instrument(skip(self, payment_intent_id, shipping_name, shipping_address))]
    pub async fn attach_payment_details(
        &self,
        session_id: &str,
        payment_intent_id: Option<String>,
        shipping_name: Option<String>,
        shipping_address: Option<String>,
    ) -> Result<SettlementOutcome, ServiceError> {
        let result = order::Entity::update_many()
            .col_expr(order::Column::Status, Expr::value(OrderStatus::Paid))
            .col_expr(
                order::Column::PaymentIntentId,
                Expr::value(payment_intent_id.clone()),
            )
            .col_expr(order::Column::ShippingName, Expr::value(shipping_name))
            .col_expr(
                order::Column::ShippingAddress,
                Expr::value(shipping_address),
            )
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(order::Column::CheckoutSessionId.eq(session_id))
            .filter(order::Column::Status.eq(OrderStatus::Pending))
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 0 {
            // Lost the race, duplicate delivery, or an unknown session.
            return match self.find_by_session_id(session_id).await? {
                None => Ok(SettlementOutcome::NotFound),
                Some(order) if order.status == OrderStatus::Paid => {
                    Ok(SettlementOutcome::AlreadySettled)
                }
                Some(order) => Ok(SettlementOutcome::Superseded {
                    status: order.status,
                }),
            };
        }

        let order = self
            .find_by_session_id(session_id)
            .await?
            .ok_or_else(|| ServiceError::InternalError("settled order vanished".into()))?;
        let items = self.items_for(&order).await?;

        info!(order_id = %order.id, "order settled as paid");
        self.event_sender
            .send(Event::OrderPaid {
                order_id: order.id,
                payment_intent_id,
            })
            .await;

        Ok(SettlementOutcome::Settled { order, items })
    }

    /// Marks every pending order under this session id as failed. Tolerant
    /// of zero matches, and never touches settled orders: a failure event
    /// arriving after a completion is a no-op.
    #[instrument(skip(self))]
    pub async fn mark_failed_by_session(&self, session_id: &str) -> Result<u64, ServiceError> {
        let result = order::Entity::update_many()
            .col_expr(order::Column::Status, Expr::value(OrderStatus::Failed))
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(order::Column::CheckoutSessionId.eq(session_id))
            .filter(order::Column::Status.eq(OrderStatus::Pending))
            .exec(&*self.db)
            .await?;

        if result.rows_affected > 0 {
            warn!(session_id, "payment failed for pending order");
            self.event_sender
                .send(Event::OrderPaymentFailed {
                    session_id: session_id.to_string(),
                })
                .await;
        }
        Ok(result.rows_affected)
    }
}
