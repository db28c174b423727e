//! Boundary with the external payment provider.
//!
//! Only two capabilities cross this boundary: opening a provider-hosted
//! checkout session and verifying/parsing the asynchronous events the
//! provider sends back. Everything else about the provider's API surface is
//! out of scope.

pub mod stripe;
pub mod webhook;

use crate::errors::ServiceError;
use async_trait::async_trait;

/// One display line of a provider-hosted payment page.
#[derive(Debug, Clone)]
pub struct SessionLineItem {
    pub name: String,
    pub unit_amount_cents: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone)]
pub struct CreateSessionInput {
    pub line_items: Vec<SessionLineItem>,
    pub currency: String,
    pub customer_email: String,
    pub success_url: String,
    pub cancel_url: String,
    /// Local order id, echoed back by the provider for reconciliation.
    pub client_reference_id: Option<String>,
}

/// Provider-issued session handle returned from session creation.
#[derive(Debug, Clone)]
pub struct GatewaySession {
    pub id: String,
    pub url: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        input: CreateSessionInput,
    ) -> Result<GatewaySession, ServiceError>;
}
