use crate::entities::order::Address;
use crate::errors::ServiceError;
use hmac::{Hmac, Mac};
use http::HeaderMap;
use serde::Deserialize;
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the provider signature: `t=<unix-ts>,v1=<hex-hmac>`.
const SIGNATURE_HEADER: &str = "stripe-signature";

/// A webhook event reduced to what the settlement path needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    PaymentCompleted {
        session_id: String,
        payment_intent_id: Option<String>,
        shipping_name: Option<String>,
        shipping_address: Option<Address>,
    },
    PaymentFailed {
        session_id: String,
    },
    /// Event kinds this engine does not react to. Still acknowledged so the
    /// provider stops redelivering them.
    Ignored {
        kind: String,
    },
}

/// Verifies the raw payload against the shared secret (when configured) and
/// parses it into a [`WebhookEvent`].
///
/// With no secret configured the payload is parsed without verification,
/// an intentionally weaker mode for bootstrap and development setups.
pub fn verify_and_parse(
    payload: &[u8],
    headers: &HeaderMap,
    secret: Option<&str>,
    tolerance_secs: u64,
) -> Result<WebhookEvent, ServiceError> {
    if let Some(secret) = secret {
        if !verify_signature(headers, payload, secret, tolerance_secs) {
            warn!("webhook signature verification failed");
            return Err(ServiceError::SignatureInvalid);
        }
    }
    parse_event(payload)
}

fn parse_event(payload: &[u8]) -> Result<WebhookEvent, ServiceError> {
    let envelope: EventEnvelope = serde_json::from_slice(payload)
        .map_err(|e| ServiceError::ValidationError(format!("invalid webhook payload: {}", e)))?;

    let event = match envelope.kind.as_str() {
        "checkout.session.completed" => {
            let session = envelope.require_session()?;
            let (shipping_name, shipping_address) = session
                .shipping_details
                .map(parse_shipping)
                .unwrap_or((None, None));
            WebhookEvent::PaymentCompleted {
                session_id: session.id,
                payment_intent_id: session.payment_intent,
                shipping_name,
                shipping_address,
            }
        }
        "checkout.session.async_payment_failed" => {
            let session = envelope.require_session()?;
            WebhookEvent::PaymentFailed {
                session_id: session.id,
            }
        }
        _ => WebhookEvent::Ignored {
            kind: envelope.kind,
        },
    };
    Ok(event)
}

fn verify_signature(
    headers: &HeaderMap,
    payload: &[u8],
    secret: &str,
    tolerance_secs: u64,
) -> bool {
    let Some(header) = headers.get(SIGNATURE_HEADER).and_then(|h| h.to_str().ok()) else {
        return false;
    };

    let mut ts = "";
    let mut v1 = "";
    for part in header.split(',') {
        let mut it = part.trim().splitn(2, '=');
        match (it.next(), it.next()) {
            (Some("t"), Some(val)) => ts = val,
            (Some("v1"), Some(val)) => v1 = val,
            _ => {}
        }
    }
    if ts.is_empty() || v1.is_empty() {
        return false;
    }

    // Reject replays outside the accepted clock window.
    match ts.parse::<i64>() {
        Ok(ts_i) => {
            let now = chrono::Utc::now().timestamp();
            if (now - ts_i).unsigned_abs() > tolerance_secs {
                return false;
            }
        }
        Err(_) => return false,
    }

    let Ok(payload_str) = std::str::from_utf8(payload) else {
        return false;
    };
    let signed = format!("{}.{}", ts, payload_str);
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(signed.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());
    constant_time_eq(&expected, v1)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

#[derive(Deserialize)]
struct EventEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Option<EventData>,
}

impl EventEnvelope {
    fn require_session(self) -> Result<SessionObject, ServiceError> {
        self.data
            .map(|d| d.object)
            .ok_or_else(|| ServiceError::ValidationError("webhook event missing session".into()))
    }
}

#[derive(Deserialize)]
struct EventData {
    object: SessionObject,
}

#[derive(Deserialize)]
struct SessionObject {
    id: String,
    #[serde(default)]
    payment_intent: Option<String>,
    /// Kept raw and parsed separately: a malformed shipping block must
    /// never block settlement of a session the provider already charged.
    #[serde(default)]
    shipping_details: Option<serde_json::Value>,
}

/// Best-effort extraction of provider shipping details. Anything that does
/// not fit degrades to "no shipping overwrite".
fn parse_shipping(raw: serde_json::Value) -> (Option<String>, Option<Address>) {
    let Ok(details) = serde_json::from_value::<ShippingDetails>(raw) else {
        return (None, None);
    };
    (
        details.name,
        details.address.and_then(ProviderAddress::into_address),
    )
}

#[derive(Deserialize)]
struct ShippingDetails {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    address: Option<ProviderAddress>,
}

/// Provider addresses routinely arrive with null or absent subfields
/// (`state`, `postal_code` for many countries), so every field is
/// tolerated here.
#[derive(Deserialize)]
struct ProviderAddress {
    #[serde(default)]
    line1: Option<String>,
    #[serde(default)]
    line2: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    postal_code: Option<String>,
    #[serde(default)]
    country: Option<String>,
}

impl ProviderAddress {
    /// Builds the persisted address shape. Without a street line, city and
    /// country there is nothing useful to store; missing region fields
    /// collapse to empty strings.
    fn into_address(self) -> Option<Address> {
        Some(Address {
            line1: self.line1?,
            line2: self.line2,
            city: self.city?,
            state: self.state.unwrap_or_default(),
            postal_code: self.postal_code.unwrap_or_default(),
            country: self.country?,
        })
    }
}
