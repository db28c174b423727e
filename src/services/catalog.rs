use crate::{
    entities::{product, product_variant},
    errors::ServiceError,
};
use sea_orm::{DatabaseConnection, EntityTrait, ModelTrait};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Read-only catalog lookups. The checkout path uses these for price and
/// stock validation; nothing in this engine writes to the catalog except the
/// inventory ledger's stock counter.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Fetches a product together with all of its variants.
    #[instrument(skip(self))]
    pub async fn product_with_variants(
        &self,
        product_id: Uuid,
    ) -> Result<Option<(product::Model, Vec<product_variant::Model>)>, ServiceError> {
        let Some(product) = product::Entity::find_by_id(product_id).one(&*self.db).await? else {
            return Ok(None);
        };
        let variants = product
            .find_related(product_variant::Entity)
            .all(&*self.db)
            .await?;
        Ok(Some((product, variants)))
    }
}
