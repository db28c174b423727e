use crate::{
    entities::{oversell_incident, product_variant},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use metrics::counter;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set,
};
use std::sync::Arc;
use tracing::{instrument, warn};
use uuid::Uuid;

/// Result of a conditional stock decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecrementOutcome {
    Decremented,
    /// The variant had fewer units left than requested. Stock is untouched.
    Insufficient,
}

/// Race-safe stock accounting.
///
/// Correctness rests entirely on the conditional UPDATE below; the service
/// runs as many concurrent instances and never holds an in-process lock.
#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl InventoryService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Decrements a variant's stock only when enough units remain:
    /// `UPDATE product_variants SET stock = stock - q WHERE id = ? AND stock >= q`.
    ///
    /// Zero affected rows means another order drained the stock first; the
    /// counter is left untouched rather than driven negative.
    #[instrument(skip(self))]
    pub async fn decrement_stock(
        &self,
        variant_id: Uuid,
        quantity: i32,
    ) -> Result<DecrementOutcome, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::ValidationError(format!(
                "decrement quantity must be positive, got {}",
                quantity
            )));
        }

        let result = product_variant::Entity::update_many()
            .col_expr(
                product_variant::Column::Stock,
                Expr::col(product_variant::Column::Stock).sub(quantity),
            )
            .col_expr(product_variant::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(product_variant::Column::Id.eq(variant_id))
            .filter(product_variant::Column::Stock.gte(quantity))
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 0 {
            counter!("inventory_decrement_refused_total", 1);
            return Ok(DecrementOutcome::Insufficient);
        }

        counter!("inventory_decrements_total", 1);
        self.event_sender
            .send(Event::InventoryDecremented {
                variant_id,
                quantity,
            })
            .await;
        Ok(DecrementOutcome::Decremented)
    }

    /// Records a refused decrement for manual reconciliation. The order
    /// stays paid; the money was already captured by the provider.
    #[instrument(skip(self))]
    pub async fn record_oversell(
        &self,
        order_id: Uuid,
        variant_id: Uuid,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        warn!(%order_id, %variant_id, quantity, "stock exhausted for paid order, recording oversell");

        let incident = oversell_incident::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            variant_id: Set(variant_id),
            quantity: Set(quantity),
            resolved: Set(false),
            created_at: Set(Utc::now()),
        };
        incident.insert(&*self.db).await?;

        counter!("oversell_incidents_total", 1);
        self.event_sender
            .send(Event::OversellRecorded {
                order_id,
                variant_id,
                quantity,
            })
            .await;
        Ok(())
    }

    /// Current stock level, mostly for tests and support tooling.
    pub async fn stock_level(&self, variant_id: Uuid) -> Result<Option<i32>, ServiceError> {
        Ok(product_variant::Entity::find_by_id(variant_id)
            .one(&*self.db)
            .await?
            .map(|v| v.stock))
    }
}
