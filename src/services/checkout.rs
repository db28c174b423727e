use crate::{
    entities::order::Address,
    errors::ServiceError,
    events::{Event, EventSender},
    payments::{CreateSessionInput, PaymentGateway, SessionLineItem},
    services::{
        catalog::CatalogService,
        orders::{NewOrder, NewOrderItem, OrderService},
        shipping::ShippingRates,
    },
};
use metrics::counter;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// One requested cart line. Prices are never accepted from the caller.
#[derive(Debug, Clone)]
pub struct CheckoutItemInput {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub quantity: i32,
}

#[derive(Debug, Clone)]
pub struct ShippingInput {
    pub name: String,
    pub address: Address,
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub items: Vec<CheckoutItemInput>,
    pub email: String,
    pub user_id: Option<Uuid>,
    pub shipping: Option<ShippingInput>,
}

#[derive(Debug, Clone)]
pub struct CheckoutResponse {
    pub order_id: Uuid,
    pub session_id: String,
    pub checkout_url: String,
}

/// Opens a checkout: validates the cart against the catalog, prices it
/// server-side, persists a pending order, then opens the provider session
/// and links its id to the order.
pub struct CheckoutService {
    catalog: Arc<CatalogService>,
    orders: Arc<OrderService>,
    shipping: Arc<dyn ShippingRates>,
    gateway: Arc<dyn PaymentGateway>,
    currency: String,
    public_base_url: String,
    event_sender: EventSender,
}

impl CheckoutService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        catalog: Arc<CatalogService>,
        orders: Arc<OrderService>,
        shipping: Arc<dyn ShippingRates>,
        gateway: Arc<dyn PaymentGateway>,
        currency: String,
        public_base_url: String,
        event_sender: EventSender,
    ) -> Self {
        Self {
            catalog,
            orders,
            shipping,
            gateway,
            currency,
            public_base_url,
            event_sender,
        }
    }

    #[instrument(skip(self, request), fields(email = %request.email, items = request.items.len()))]
    pub async fn initiate(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutResponse, ServiceError> {
        if request.items.is_empty() {
            return Err(ServiceError::ValidationError("Cart is empty".into()));
        }
        if request.email.trim().is_empty() {
            return Err(ServiceError::ValidationError("Email is required".into()));
        }

        let (snapshots, line_items, subtotal_cents) = self.price_cart(&request.items).await?;

        let quote = self.shipping.quote(subtotal_cents).await?;
        let total_cents = subtotal_cents
            .checked_add(quote.amount_cents)
            .ok_or_else(|| ServiceError::ValidationError("order total overflows".into()))?;

        let mut provider_lines = line_items;
        if quote.amount_cents > 0 {
            provider_lines.push(SessionLineItem {
                name: quote.label,
                unit_amount_cents: quote.amount_cents,
                quantity: 1,
            });
        }

        // The pending row must exist before the provider call so a failure
        // past this point leaves a recoverable order, not a lost snapshot.
        let order = self
            .orders
            .create_with_items(
                NewOrder {
                    email: request.email.clone(),
                    user_id: request.user_id,
                    currency: self.currency.clone(),
                    total_cents,
                    shipping_name: request.shipping.as_ref().map(|s| s.name.clone()),
                    shipping_address: request
                        .shipping
                        .as_ref()
                        .map(|s| s.address.to_json_string()),
                },
                snapshots,
            )
            .await?;

        let session = match self
            .gateway
            .create_checkout_session(CreateSessionInput {
                line_items: provider_lines,
                currency: self.currency.clone(),
                customer_email: request.email,
                success_url: format!(
                    "{}/checkout/success?session_id={{CHECKOUT_SESSION_ID}}",
                    self.public_base_url
                ),
                cancel_url: format!("{}/checkout", self.public_base_url),
                client_reference_id: Some(order.id.to_string()),
            })
            .await
        {
            Ok(session) => session,
            Err(e) => {
                // The order keeps its provisional session id; it can never
                // reach `paid` and is picked up by cleanup tooling.
                warn!(order_id = %order.id, error = %e, "payment session creation failed, pending order orphaned");
                return Err(e);
            }
        };

        self.orders.link_session(order.id, &session.id).await?;

        counter!("checkouts_initiated_total", 1);
        info!(order_id = %order.id, session_id = %session.id, "checkout session opened");
        self.event_sender
            .send(Event::CheckoutSessionOpened {
                order_id: order.id,
                session_id: session.id.clone(),
            })
            .await;

        Ok(CheckoutResponse {
            order_id: order.id,
            session_id: session.id,
            checkout_url: session.url,
        })
    }

    /// Resolves every cart line against the catalog and computes the
    /// authoritative subtotal from stored prices.
    ///
    /// The stock comparison here is advisory only; nothing is reserved. The
    /// binding check is the conditional decrement at payment time.
    async fn price_cart(
        &self,
        items: &[CheckoutItemInput],
    ) -> Result<(Vec<NewOrderItem>, Vec<SessionLineItem>, i64), ServiceError> {
        let mut snapshots = Vec::with_capacity(items.len());
        let mut lines = Vec::with_capacity(items.len());
        let mut subtotal_cents: i64 = 0;

        for item in items {
            if item.quantity <= 0 {
                return Err(ServiceError::ValidationError(format!(
                    "Quantity must be positive for product {}",
                    item.product_id
                )));
            }

            let (product, variants) = self
                .catalog
                .product_with_variants(item.product_id)
                .await?
                .ok_or_else(|| {
                    ServiceError::CatalogMismatch(format!(
                        "Product {} not found or inactive",
                        item.product_id
                    ))
                })?;
            if !product.is_active {
                return Err(ServiceError::CatalogMismatch(format!(
                    "Product {} not found or inactive",
                    item.product_id
                )));
            }

            let variant = match item.variant_id {
                Some(variant_id) => {
                    let variant = variants
                        .into_iter()
                        .find(|v| v.id == variant_id)
                        .filter(|v| v.is_active)
                        .ok_or_else(|| {
                            ServiceError::CatalogMismatch(format!(
                                "Variant {} not found or inactive",
                                variant_id
                            ))
                        })?;
                    if variant.stock < item.quantity {
                        return Err(ServiceError::CatalogMismatch(format!(
                            "Insufficient stock for variant {}",
                            variant.name
                        )));
                    }
                    Some(variant)
                }
                None => None,
            };

            let unit_price_cents = variant
                .as_ref()
                .map(|v| v.price_cents)
                .unwrap_or(product.base_price_cents);

            let line_total = unit_price_cents
                .checked_mul(i64::from(item.quantity))
                .ok_or_else(|| ServiceError::ValidationError("line total overflows".into()))?;
            subtotal_cents = subtotal_cents
                .checked_add(line_total)
                .ok_or_else(|| ServiceError::ValidationError("order total overflows".into()))?;

            let display_name = match &variant {
                Some(v) => format!("{} - {}", product.name, v.name),
                None => product.name.clone(),
            };
            lines.push(SessionLineItem {
                name: display_name,
                unit_amount_cents: unit_price_cents,
                quantity: i64::from(item.quantity),
            });
            snapshots.push(NewOrderItem {
                product_id: item.product_id,
                variant_id: item.variant_id,
                quantity: item.quantity,
                unit_price_cents,
            });
        }

        Ok((snapshots, lines, subtotal_cents))
    }
}
