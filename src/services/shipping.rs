use crate::errors::ServiceError;
use async_trait::async_trait;

/// Amount and display label for the shipping line of an order.
#[derive(Debug, Clone)]
pub struct ShippingQuote {
    pub amount_cents: i64,
    pub label: String,
}

/// Opaque shipping-amount collaborator. The engine only needs an amount and
/// a label for a given subtotal; how carriers and zones are priced is
/// someone else's problem.
#[async_trait]
pub trait ShippingRates: Send + Sync {
    async fn quote(&self, subtotal_cents: i64) -> Result<ShippingQuote, ServiceError>;
}

/// Flat-rate shipping from store configuration. A configured rate of zero
/// means free shipping and suppresses the provider line item.
pub struct FlatRateShipping {
    amount_cents: i64,
    label: String,
}

impl FlatRateShipping {
    pub fn new(amount_cents: i64, label: impl Into<String>) -> Self {
        Self {
            amount_cents,
            label: label.into(),
        }
    }
}

#[async_trait]
impl ShippingRates for FlatRateShipping {
    async fn quote(&self, _subtotal_cents: i64) -> Result<ShippingQuote, ServiceError> {
        Ok(ShippingQuote {
            amount_cents: self.amount_cents,
            label: self.label.clone(),
        })
    }
}
