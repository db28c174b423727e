//! Checkout initiation: server-side pricing, order snapshots, the
//! two-phase session linkage and its failure modes.

mod common;

use axum::http::Method;
use common::{checkout_variant, response_json, TestApp};
use sea_orm::EntityTrait;
use serde_json::json;
use std::sync::atomic::Ordering;
use storefront_checkout::entities::{order, order::OrderStatus};

#[tokio::test]
async fn checkout_prices_cart_server_side() {
    let app = TestApp::new().await;
    let product = app.seed_product("Enamel Mug", 1000, true).await;
    let variant = app.seed_variant(product.id, "Large", 1500, 5, true).await;

    let (order_id, session_id) = checkout_variant(&app, product.id, variant.id, 2).await;
    assert_eq!(session_id, "cs_test_1");

    let response = app
        .request(Method::GET, &format!("/orders/{}", order_id), None)
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;

    // 2 x 1500 + 500 flat shipping, from stored prices only.
    assert_eq!(body["totalCents"], 3500);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["checkoutSessionId"], "cs_test_1");
    assert_eq!(body["items"][0]["unitPriceCents"], 1500);
    assert_eq!(body["items"][0]["quantity"], 2);

    // The provider was asked to collect the same amounts.
    let input = app.gateway.last_input.lock().unwrap().take().unwrap();
    assert_eq!(input.line_items.len(), 2);
    assert_eq!(input.line_items[0].name, "Enamel Mug - Large");
    assert_eq!(input.line_items[0].unit_amount_cents, 1500);
    assert_eq!(input.line_items[0].quantity, 2);
    assert_eq!(input.line_items[1].name, "Standard Shipping");
    assert_eq!(input.line_items[1].unit_amount_cents, 500);
    assert_eq!(input.client_reference_id.as_deref(), Some(order_id.as_str()));
}

#[tokio::test]
async fn product_without_variant_uses_base_price() {
    let app = TestApp::with_config(|cfg| cfg.shipping_flat_rate_cents = 0).await;
    let product = app.seed_product("Gift Card", 2500, true).await;

    let response = app
        .request(
            Method::POST,
            "/checkout",
            Some(json!({
                "items": [{"productId": product.id, "quantity": 3}],
                "email": "buyer@example.com"
            })),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;

    let order_id = body["orderId"].as_str().unwrap();
    let detail = response_json(
        app.request(Method::GET, &format!("/orders/{}", order_id), None)
            .await,
    )
    .await;
    assert_eq!(detail["totalCents"], 7500);
    assert!(detail["items"][0]["variantId"].is_null());

    // Free shipping: no shipping line goes to the provider.
    let input = app.gateway.last_input.lock().unwrap().take().unwrap();
    assert_eq!(input.line_items.len(), 1);
}

#[tokio::test]
async fn empty_cart_is_rejected() {
    let app = TestApp::new().await;
    let response = app
        .request(
            Method::POST,
            "/checkout",
            Some(json!({"items": [], "email": "buyer@example.com"})),
        )
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn invalid_email_is_rejected() {
    let app = TestApp::new().await;
    let product = app.seed_product("Mug", 1000, true).await;
    let response = app
        .request(
            Method::POST,
            "/checkout",
            Some(json!({
                "items": [{"productId": product.id, "quantity": 1}],
                "email": "not-an-email"
            })),
        )
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn unknown_product_creates_no_order() {
    let app = TestApp::new().await;
    let response = app
        .request(
            Method::POST,
            "/checkout",
            Some(json!({
                "items": [{"productId": uuid::Uuid::new_v4(), "quantity": 1}],
                "email": "buyer@example.com"
            })),
        )
        .await;
    assert_eq!(response.status(), 400);

    let orders = order::Entity::find().all(&*app.state.db).await.unwrap();
    assert!(orders.is_empty());
}

#[tokio::test]
async fn inactive_variant_creates_no_order() {
    let app = TestApp::new().await;
    let product = app.seed_product("Mug", 1000, true).await;
    let variant = app.seed_variant(product.id, "Retired", 1500, 5, false).await;

    let response = app
        .request(
            Method::POST,
            "/checkout",
            Some(json!({
                "items": [{"productId": product.id, "variantId": variant.id, "quantity": 1}],
                "email": "buyer@example.com"
            })),
        )
        .await;
    assert_eq!(response.status(), 400);

    let orders = order::Entity::find().all(&*app.state.db).await.unwrap();
    assert!(orders.is_empty());
}

#[tokio::test]
async fn out_of_stock_variant_fails_advisory_check() {
    let app = TestApp::new().await;
    let product = app.seed_product("Mug", 1000, true).await;
    let variant = app.seed_variant(product.id, "Large", 1500, 1, true).await;

    let response = app
        .request(
            Method::POST,
            "/checkout",
            Some(json!({
                "items": [{"productId": product.id, "variantId": variant.id, "quantity": 2}],
                "email": "buyer@example.com"
            })),
        )
        .await;
    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    assert!(body["message"].as_str().unwrap().contains("stock"));

    let orders = order::Entity::find().all(&*app.state.db).await.unwrap();
    assert!(orders.is_empty());
}

#[tokio::test]
async fn gateway_failure_leaves_recoverable_pending_order() {
    let app = TestApp::new().await;
    let product = app.seed_product("Mug", 1000, true).await;
    let variant = app.seed_variant(product.id, "Large", 1500, 5, true).await;

    app.gateway.fail.store(true, Ordering::SeqCst);
    let response = app
        .request(
            Method::POST,
            "/checkout",
            Some(json!({
                "items": [{"productId": product.id, "variantId": variant.id, "quantity": 1}],
                "email": "buyer@example.com"
            })),
        )
        .await;
    assert_eq!(response.status(), 502);

    // The priced snapshot survives with its provisional session id; it can
    // never settle and is left for cleanup tooling.
    let orders = order::Entity::find().all(&*app.state.db).await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].status, OrderStatus::Pending);
    assert!(orders[0].has_provisional_session());
    assert_eq!(orders[0].total_cents, 2000);
}
