//! Administrative status overrides and order reads.

mod common;

use axum::http::Method;
use common::{checkout_variant, completed_event, response_json, TestApp};
use serde_json::json;

async fn seeded_order(app: &TestApp) -> (String, String) {
    let product = app.seed_product("Enamel Mug", 1000, true).await;
    let variant = app.seed_variant(product.id, "Large", 1500, 5, true).await;
    checkout_variant(app, product.id, variant.id, 1).await
}

#[tokio::test]
async fn admin_can_cancel_a_pending_order() {
    let app = TestApp::new().await;
    let (order_id, _) = seeded_order(&app).await;

    let response = app
        .request(
            Method::PUT,
            &format!("/orders/{}", order_id),
            Some(json!({"status": "cancelled"})),
        )
        .await;
    assert_eq!(response.status(), 200);
    assert_eq!(response_json(response).await["status"], "cancelled");
}

#[tokio::test]
async fn admin_can_force_paid_without_provider_confirmation() {
    let app = TestApp::new().await;
    let (order_id, _) = seeded_order(&app).await;

    let response = app
        .request(
            Method::PUT,
            &format!("/orders/{}", order_id),
            Some(json!({"status": "paid"})),
        )
        .await;
    assert_eq!(response.status(), 200);
    assert_eq!(response_json(response).await["status"], "paid");
}

#[tokio::test]
async fn status_outside_admin_vocabulary_is_rejected() {
    let app = TestApp::new().await;
    let (order_id, _) = seeded_order(&app).await;

    for status in ["failed", "shipped", ""] {
        let response = app
            .request(
                Method::PUT,
                &format!("/orders/{}", order_id),
                Some(json!({"status": status})),
            )
            .await;
        assert_eq!(response.status(), 400, "status {:?} must be rejected", status);
    }
}

#[tokio::test]
async fn paid_orders_cannot_be_overridden() {
    let app = TestApp::new().await;
    let (order_id, session_id) = seeded_order(&app).await;
    assert_eq!(
        app.post_webhook(&completed_event(&session_id), None)
            .await
            .status(),
        200
    );

    let response = app
        .request(
            Method::PUT,
            &format!("/orders/{}", order_id),
            Some(json!({"status": "cancelled"})),
        )
        .await;
    assert_eq!(response.status(), 409);

    // Re-applying the settled status is an accepted no-op.
    let response = app
        .request(
            Method::PUT,
            &format!("/orders/{}", order_id),
            Some(json!({"status": "paid"})),
        )
        .await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn unknown_order_is_404() {
    let app = TestApp::new().await;
    let missing = uuid::Uuid::new_v4();

    let get = app
        .request(Method::GET, &format!("/orders/{}", missing), None)
        .await;
    assert_eq!(get.status(), 404);

    let put = app
        .request(
            Method::PUT,
            &format!("/orders/{}", missing),
            Some(json!({"status": "cancelled"})),
        )
        .await;
    assert_eq!(put.status(), 404);
}

#[tokio::test]
async fn get_order_includes_item_snapshots() {
    let app = TestApp::new().await;
    let (order_id, _) = seeded_order(&app).await;

    let detail = response_json(
        app.request(Method::GET, &format!("/orders/{}", order_id), None)
            .await,
    )
    .await;
    let items = detail["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["unitPriceCents"], 1500);
    assert_eq!(items[0]["quantity"], 1);
}
