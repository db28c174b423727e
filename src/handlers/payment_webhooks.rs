use crate::{errors::ServiceError, payments::webhook, AppState};
use axum::{extract::State, http::HeaderMap, response::IntoResponse, Json};
use bytes::Bytes;
use metrics::counter;
use serde_json::json;

// POST /webhooks/payment
//
// Acknowledges with `{"received": true}` once the payload verifies and
// parses. Unknown sessions, duplicates and unhandled event kinds are all
// acknowledged; only signature/parse failures (400) and storage failures
// (500, so the provider redelivers) are surfaced as errors.
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    counter!("payment_webhooks_received_total", 1);

    let event = webhook::verify_and_parse(
        &body,
        &headers,
        state.config.payment_webhook_secret.as_deref(),
        state.config.payment_webhook_tolerance_secs,
    )?;

    state.services.payment_webhooks.process(event).await?;

    Ok(Json(json!({ "received": true })))
}
