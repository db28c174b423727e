use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex,
};
use storefront_checkout::{
    config::AppConfig,
    db,
    entities::{product, product_variant},
    errors::ServiceError,
    events,
    handlers,
    payments::{CreateSessionInput, GatewaySession, PaymentGateway},
    services::AppServices,
    AppState,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

/// Deterministic in-process stand-in for the payment provider.
#[derive(Default)]
pub struct MockGateway {
    counter: AtomicU64,
    pub fail: AtomicBool,
    pub last_input: Mutex<Option<CreateSessionInput>>,
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_checkout_session(
        &self,
        input: CreateSessionInput,
    ) -> Result<GatewaySession, ServiceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ServiceError::PaymentGatewayError(
                "simulated provider outage".into(),
            ));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_input.lock().unwrap() = Some(input);
        Ok(GatewaySession {
            id: format!("cs_test_{}", n),
            url: format!("https://pay.example/session/{}", n),
        })
    }
}

/// Application harness backed by a throwaway SQLite database.
pub struct TestApp {
    pub state: AppState,
    pub gateway: Arc<MockGateway>,
    router: Router,
    _tmp: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(tweak: impl FnOnce(&mut AppConfig)) -> Self {
        let tmp = TempDir::new().expect("temp dir");
        let db_path = tmp.path().join("checkout_test.db");
        let mut cfg = AppConfig::new(format!("sqlite://{}?mode=rwc", db_path.display()), "test");
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        // Non-zero so totals exercise the shipping line by default.
        cfg.shipping_flat_rate_cents = 500;
        tweak(&mut cfg);

        let db = Arc::new(
            db::establish_connection(&cfg)
                .await
                .expect("test database"),
        );
        db::init_schema(&db).await.expect("schema bootstrap");

        let (event_sender, _event_task) = events::spawn_event_logger(64);
        let gateway = Arc::new(MockGateway::default());
        let services = AppServices::build(db.clone(), &cfg, gateway.clone(), event_sender.clone());

        let state = AppState {
            db,
            config: cfg,
            event_sender,
            services,
        };
        let router = handlers::router(state.clone());

        Self {
            state,
            gateway,
            router,
            _tmp: tmp,
        }
    }

    pub async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(path);
        let request = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                builder.body(Body::from(json.to_string())).unwrap()
            }
            None => builder.body(Body::empty()).unwrap(),
        };
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Posts a raw webhook payload, optionally signed with `secret`.
    pub async fn post_webhook(&self, payload: &Value, secret: Option<&str>) -> Response {
        let raw = payload.to_string();
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/webhooks/payment")
            .header("content-type", "application/json");
        if let Some(secret) = secret {
            builder = builder.header("stripe-signature", sign_payload(secret, raw.as_bytes()));
        }
        let request = builder.body(Body::from(raw)).unwrap();
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn seed_product(&self, name: &str, base_price_cents: i64, is_active: bool) -> product::Model {
        let now = Utc::now();
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            description: Set(None),
            base_price_cents: Set(base_price_cents),
            is_active: Set(is_active),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed product")
    }

    pub async fn seed_variant(
        &self,
        product_id: Uuid,
        name: &str,
        price_cents: i64,
        stock: i32,
        is_active: bool,
    ) -> product_variant::Model {
        let now = Utc::now();
        product_variant::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            sku: Set(format!("SKU-{}", name.to_uppercase().replace(' ', "-"))),
            name: Set(name.to_string()),
            price_cents: Set(price_cents),
            stock: Set(stock),
            is_active: Set(is_active),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed variant")
    }
}

/// Builds a `t=...,v1=...` signature header value for a payload.
pub fn sign_payload(secret: &str, payload: &[u8]) -> String {
    let ts = Utc::now().timestamp();
    let signed = format!("{}.{}", ts, std::str::from_utf8(payload).unwrap());
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(signed.as_bytes());
    format!("t={},v1={}", ts, hex::encode(mac.finalize().into_bytes()))
}

/// Provider event announcing a completed checkout session.
pub fn completed_event(session_id: &str) -> Value {
    json!({
        "id": format!("evt_{}", Uuid::new_v4().simple()),
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": session_id,
            "payment_intent": "pi_settled_1",
            "shipping_details": {
                "name": "Provider Confirmed",
                "address": {
                    "line1": "99 Fulfillment Rd",
                    "city": "Reno",
                    "state": "NV",
                    "postal_code": "89501",
                    "country": "US"
                }
            }
        }}
    })
}

/// Provider event announcing an asynchronous payment failure.
pub fn failed_event(session_id: &str) -> Value {
    json!({
        "id": format!("evt_{}", Uuid::new_v4().simple()),
        "type": "checkout.session.async_payment_failed",
        "data": { "object": { "id": session_id } }
    })
}

pub async fn response_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body");
    serde_json::from_slice(&bytes).expect("json body")
}

/// Drives a full checkout for `quantity` units of a variant and returns
/// `(order_id, session_id)`.
pub async fn checkout_variant(
    app: &TestApp,
    product_id: Uuid,
    variant_id: Uuid,
    quantity: i32,
) -> (String, String) {
    let response = app
        .request(
            Method::POST,
            "/checkout",
            Some(json!({
                "items": [{
                    "productId": product_id,
                    "variantId": variant_id,
                    "quantity": quantity,
                    // A client-supplied price must never influence totals.
                    "unitPriceCents": 1,
                }],
                "email": "buyer@example.com",
                "shipping": {
                    "name": "Buyer Submitted",
                    "address": {
                        "line1": "1 Cart Lane",
                        "city": "Portland",
                        "state": "OR",
                        "postal_code": "97201",
                        "country": "US"
                    }
                }
            })),
        )
        .await;
    assert_eq!(response.status(), 200, "checkout should succeed");
    let body = response_json(response).await;
    (
        body["orderId"].as_str().unwrap().to_string(),
        body["sessionId"].as_str().unwrap().to_string(),
    )
}
