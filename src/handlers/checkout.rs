use crate::{
    entities::order::Address,
    errors::ServiceError,
    services::checkout::{CheckoutItemInput, CheckoutRequest, ShippingInput},
    AppState,
};
use axum::{extract::State, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutPayload {
    #[validate(length(min = 1, message = "Cart is empty"))]
    pub items: Vec<CheckoutItemPayload>,
    #[validate(email)]
    pub email: String,
    #[serde(default)]
    pub shipping: Option<ShippingPayload>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutItemPayload {
    pub product_id: Uuid,
    #[serde(default)]
    pub variant_id: Option<Uuid>,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct ShippingPayload {
    pub name: String,
    pub address: Address,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponsePayload {
    pub session_id: String,
    pub url: String,
    pub order_id: Uuid,
}

// POST /checkout
pub async fn create_checkout(
    State(state): State<AppState>,
    Json(payload): Json<CheckoutPayload>,
) -> Result<impl IntoResponse, ServiceError> {
    payload.validate()?;

    let request = CheckoutRequest {
        items: payload
            .items
            .into_iter()
            .map(|item| CheckoutItemInput {
                product_id: item.product_id,
                variant_id: item.variant_id,
                quantity: item.quantity,
            })
            .collect(),
        email: payload.email,
        user_id: None,
        shipping: payload.shipping.map(|s| ShippingInput {
            name: s.name,
            address: s.address,
        }),
    };

    let response = state.services.checkout.initiate(request).await?;

    Ok(Json(CheckoutResponsePayload {
        session_id: response.session_id,
        url: response.checkout_url,
        order_id: response.order_id,
    }))
}
