use crate::{
    entities::{
        order::{self, OrderStatus},
        order_item,
    },
    errors::ServiceError,
    AppState,
};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusPayload {
    pub status: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: Uuid,
    pub checkout_session_id: String,
    pub payment_intent_id: Option<String>,
    pub email: String,
    pub user_id: Option<Uuid>,
    pub currency: String,
    pub total_cents: i64,
    pub status: OrderStatus,
    pub shipping_name: Option<String>,
    pub shipping_address: Option<order::Address>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<OrderItemResponse>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemResponse {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: i32,
    pub unit_price_cents: i64,
}

impl OrderResponse {
    fn from_model(order: order::Model, items: Option<Vec<order_item::Model>>) -> Self {
        Self {
            shipping_address: order.shipping_address(),
            id: order.id,
            checkout_session_id: order.checkout_session_id,
            payment_intent_id: order.payment_intent_id,
            email: order.email,
            user_id: order.user_id,
            currency: order.currency,
            total_cents: order.total_cents,
            status: order.status,
            shipping_name: order.shipping_name,
            created_at: order.created_at,
            items: items.map(|items| {
                items
                    .into_iter()
                    .map(|item| OrderItemResponse {
                        product_id: item.product_id,
                        variant_id: item.variant_id,
                        quantity: item.quantity,
                        unit_price_cents: item.unit_price_cents,
                    })
                    .collect()
            }),
        }
    }
}

// GET /orders/:id
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .services
        .orders
        .find_by_id(order_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
    let items = state.services.orders.items_for(&order).await?;

    Ok(Json(OrderResponse::from_model(order, Some(items))))
}

// PUT /orders/:id: administrative status override. Bypasses provider
// confirmation, so the accepted vocabulary is deliberately narrower than
// the full status set: a human cannot push an order to `failed`.
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusPayload>,
) -> Result<impl IntoResponse, ServiceError> {
    let status = match payload.status.as_str() {
        "pending" => OrderStatus::Pending,
        "paid" => OrderStatus::Paid,
        "cancelled" => OrderStatus::Cancelled,
        other => {
            return Err(ServiceError::ValidationError(format!(
                "Invalid status: {}",
                other
            )))
        }
    };

    let order = state.services.orders.update_status(order_id, status).await?;
    Ok(Json(OrderResponse::from_model(order, None)))
}
