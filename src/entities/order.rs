use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix carried by the placeholder session id written between order
/// creation and provider-session linkage. Stuck placeholders are the signal
/// cleanup tooling scans for.
pub const PROVISIONAL_SESSION_PREFIX: &str = "prov_";

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "failed")]
    Failed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl OrderStatus {
    /// `paid` is terminal; every other transition inside the vocabulary is
    /// allowed, and re-applying the current status is a no-op.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        self == next || self != OrderStatus::Paid
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Provider-issued checkout session id. Unique at all times; holds a
    /// provisional placeholder until the provider session exists.
    #[sea_orm(unique)]
    pub checkout_session_id: String,

    #[sea_orm(nullable)]
    pub payment_intent_id: Option<String>,

    pub email: String,

    /// Owning account, when the buyer was signed in. Weak reference: orders
    /// outlive anonymous checkouts.
    #[sea_orm(nullable)]
    pub user_id: Option<Uuid>,

    pub currency: String,

    /// Authoritative total, computed server-side at creation and never
    /// recomputed afterward.
    pub total_cents: i64,

    pub status: OrderStatus,

    #[sea_orm(nullable)]
    pub shipping_name: Option<String>,

    /// JSON-serialized [`Address`]
    #[sea_orm(nullable)]
    pub shipping_address: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    Items,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();
        if insert {
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(now);
            }
        }
        active_model.updated_at = Set(now);
        Ok(active_model)
    }
}

impl Model {
    /// Deserializes the persisted shipping address, if any.
    pub fn shipping_address(&self) -> Option<Address> {
        self.shipping_address
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
    }

    pub fn has_provisional_session(&self) -> bool {
        self.checkout_session_id
            .starts_with(PROVISIONAL_SESSION_PREFIX)
    }
}

/// Generates a unique placeholder satisfying the session-id uniqueness
/// constraint before the provider session exists.
pub fn provisional_session_id() -> String {
    format!("{}{}", PROVISIONAL_SESSION_PREFIX, Uuid::new_v4().simple())
}

/// Structured shipping address, stored on the order as JSON and re-read
/// symmetrically.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

impl Address {
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paid_is_terminal() {
        assert!(!OrderStatus::Paid.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Paid.can_transition_to(OrderStatus::Failed));
        assert!(!OrderStatus::Paid.can_transition_to(OrderStatus::Cancelled));
        // Re-applying the settled status is a no-op, not a violation.
        assert!(OrderStatus::Paid.can_transition_to(OrderStatus::Paid));
    }

    #[test]
    fn pending_can_settle_or_fail() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Paid));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Failed));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn provisional_ids_are_unique_and_recognizable() {
        let a = provisional_session_id();
        let b = provisional_session_id();
        assert_ne!(a, b);
        assert!(a.starts_with(PROVISIONAL_SESSION_PREFIX));
    }

    #[test]
    fn address_round_trips_through_json() {
        let address = Address {
            line1: "500 Market St".into(),
            line2: Some("Suite 400".into()),
            city: "San Francisco".into(),
            state: "CA".into(),
            postal_code: "94105".into(),
            country: "US".into(),
        };
        let raw = address.to_json_string();
        let parsed: Address = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, address);
    }

    #[test]
    fn status_display_matches_wire_format() {
        assert_eq!(OrderStatus::Pending.to_string(), "pending");
        assert_eq!(OrderStatus::Paid.to_string(), "paid");
    }
}
