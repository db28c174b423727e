pub mod catalog;
pub mod checkout;
pub mod inventory;
pub mod orders;
pub mod payment_webhooks;
pub mod shipping;

use crate::{config::AppConfig, events::EventSender, payments::PaymentGateway};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// All service instances shared across request handlers.
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<catalog::CatalogService>,
    pub inventory: Arc<inventory::InventoryService>,
    pub orders: Arc<orders::OrderService>,
    pub checkout: Arc<checkout::CheckoutService>,
    pub payment_webhooks: Arc<payment_webhooks::PaymentWebhookProcessor>,
}

impl AppServices {
    pub fn build(
        db: Arc<DatabaseConnection>,
        config: &AppConfig,
        gateway: Arc<dyn PaymentGateway>,
        event_sender: EventSender,
    ) -> Self {
        let catalog = Arc::new(catalog::CatalogService::new(db.clone()));
        let inventory = Arc::new(inventory::InventoryService::new(
            db.clone(),
            event_sender.clone(),
        ));
        let orders = Arc::new(orders::OrderService::new(db, event_sender.clone()));
        let shipping: Arc<dyn shipping::ShippingRates> = Arc::new(
            shipping::FlatRateShipping::new(
                config.shipping_flat_rate_cents,
                config.shipping_label.clone(),
            ),
        );
        let checkout = Arc::new(checkout::CheckoutService::new(
            catalog.clone(),
            orders.clone(),
            shipping,
            gateway,
            config.currency.clone(),
            config.public_base_url.clone(),
            event_sender,
        ));
        let payment_webhooks = Arc::new(payment_webhooks::PaymentWebhookProcessor::new(
            orders.clone(),
            inventory.clone(),
        ));

        Self {
            catalog,
            inventory,
            orders,
            checkout,
            payment_webhooks,
        }
    }
}
