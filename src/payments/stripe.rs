use super::{CreateSessionInput, GatewaySession, PaymentGateway};
use crate::errors::ServiceError;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{error, instrument};

/// Stripe Checkout client. Speaks the form-encoded sessions endpoint only;
/// the rest of the provider API is not this engine's business.
pub struct StripeGateway {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl StripeGateway {
    pub fn new(api_base: impl Into<String>, secret_key: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();
        Self {
            http,
            api_base: api_base.into(),
            secret_key: secret_key.into(),
        }
    }
}

#[derive(Deserialize)]
struct SessionResponse {
    id: String,
    #[serde(default)]
    url: Option<String>,
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[instrument(skip(self, input), fields(lines = input.line_items.len()))]
    async fn create_checkout_session(
        &self,
        input: CreateSessionInput,
    ) -> Result<GatewaySession, ServiceError> {
        let form = session_form(&input);
        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&form)
            .send()
            .await
            .map_err(|e| ServiceError::PaymentGatewayError(format!("session create: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, body, "payment session creation rejected");
            return Err(ServiceError::PaymentGatewayError(format!(
                "session create returned {}",
                status
            )));
        }

        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::PaymentGatewayError(format!("session decode: {}", e)))?;

        Ok(GatewaySession {
            url: session.url.unwrap_or_default(),
            id: session.id,
        })
    }
}

/// Builds the indexed form-encoded parameter list the sessions endpoint
/// expects.
fn session_form(input: &CreateSessionInput) -> Vec<(String, String)> {
    let mut form: Vec<(String, String)> = vec![
        ("mode".into(), "payment".into()),
        ("success_url".into(), input.success_url.clone()),
        ("cancel_url".into(), input.cancel_url.clone()),
        ("customer_email".into(), input.customer_email.clone()),
        ("payment_method_types[0]".into(), "card".into()),
    ];

    for (i, item) in input.line_items.iter().enumerate() {
        form.push((
            format!("line_items[{}][quantity]", i),
            item.quantity.to_string(),
        ));
        form.push((
            format!("line_items[{}][price_data][currency]", i),
            input.currency.clone(),
        ));
        form.push((
            format!("line_items[{}][price_data][unit_amount]", i),
            item.unit_amount_cents.to_string(),
        ));
        form.push((
            format!("line_items[{}][price_data][product_data][name]", i),
            item.name.clone(),
        ));
    }

    if let Some(reference) = &input.client_reference_id {
        form.push(("client_reference_id".into(), reference.clone()));
    }

    form
}
