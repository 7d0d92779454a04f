//! Webhook event types and payment failure payload parsing.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::Error;

/// Event types this service knows how to route.
///
/// `Other` carries the raw tag of anything unrecognized so the router can
/// log it without losing information.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventType {
    /// A charge attempt failed (the one monitored type)
    ChargeFailed,
    /// Any other provider event, kept verbatim
    Other(String),
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ChargeFailed => write!(f, "charge.failed"),
            Self::Other(tag) => write!(f, "{tag}"),
        }
    }
}

impl From<&str> for EventType {
    fn from(tag: &str) -> Self {
        match tag {
            "charge.failed" => Self::ChargeFailed,
            other => Self::Other(other.to_string()),
        }
    }
}

/// A verified provider event.
///
/// Only ever constructed by [`crate::webhooks::signing::construct_event`]
/// after the signature checks out; the payload is opaque until a handler
/// parses it.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    /// Event type tag (e.g., "charge.failed")
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event-specific data
    #[serde(default)]
    pub data: EventData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventData {
    /// The provider object the event describes (a charge, for failures)
    #[serde(default)]
    pub object: Value,
}

/// Everything the alert needs to know about a failed charge.
///
/// All optional fields stay optional here; the formatter substitutes
/// defaults at render time so parsing never fails on sparse payloads.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentFailureRecord {
    pub id: String,
    /// Amount in the currency's minor unit (e.g., cents)
    pub amount: i64,
    pub currency: String,
    /// Charge creation time as unix seconds
    pub created: Option<i64>,
    pub failure_message: Option<String>,
    pub failure_code: Option<String>,
    /// Provider customer reference, used for the out-of-band lookup
    pub customer: Option<String>,
    pub billing_email: Option<String>,
    pub card: Option<CardDetails>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CardDetails {
    pub brand: Option<String>,
    pub last4: Option<String>,
    pub decline_code: Option<String>,
}

// Wire-shape mirror of the provider's charge object. Kept private so the
// rest of the crate only sees the flattened record.
#[derive(Debug, Deserialize)]
struct ChargeObject {
    id: String,
    #[serde(default)]
    amount: i64,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    created: Option<i64>,
    #[serde(default)]
    failure_message: Option<String>,
    #[serde(default)]
    failure_code: Option<String>,
    #[serde(default)]
    customer: Option<String>,
    #[serde(default)]
    receipt_email: Option<String>,
    #[serde(default)]
    billing_details: BillingDetails,
    #[serde(default)]
    payment_method_details: PaymentMethodDetails,
    #[serde(default)]
    outcome: Option<Outcome>,
}

#[derive(Debug, Default, Deserialize)]
struct BillingDetails {
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PaymentMethodDetails {
    #[serde(default)]
    card: Option<CardObject>,
}

#[derive(Debug, Deserialize)]
struct CardObject {
    #[serde(default)]
    brand: Option<String>,
    #[serde(default)]
    last4: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Outcome {
    #[serde(default)]
    reason: Option<String>,
}

impl PaymentFailureRecord {
    /// Parse the charge out of a verified event.
    ///
    /// A monitored event whose object isn't a charge is a processing error
    /// (surfaced as 500 at the boundary), not a verification failure.
    pub fn from_event(event: &WebhookEvent) -> Result<Self, Error> {
        let charge: ChargeObject = serde_json::from_value(event.data.object.clone()).map_err(|e| Error::Internal {
            operation: format!("parse charge object from event data: {e}"),
        })?;

        let decline_code = charge.outcome.and_then(|o| o.reason);
        let card = charge.payment_method_details.card.map(|c| CardDetails {
            brand: c.brand,
            last4: c.last4,
            decline_code,
        });

        Ok(Self {
            id: charge.id,
            amount: charge.amount,
            currency: charge.currency.unwrap_or_else(|| "unknown".to_string()),
            created: charge.created,
            failure_message: charge.failure_message,
            failure_code: charge.failure_code,
            customer: charge.customer,
            billing_email: charge.billing_details.email.or(charge.receipt_email),
            card,
        })
    }

    /// Synthesize a record for the manual test trigger, shaped exactly like
    /// a webhook-sourced one.
    pub fn synthetic() -> Self {
        Self {
            id: format!("ch_test_{}", uuid::Uuid::new_v4().simple()),
            amount: 2999,
            currency: "usd".to_string(),
            created: Some(chrono::Utc::now().timestamp()),
            failure_message: Some("Your card was declined.".to_string()),
            failure_code: Some("card_declined".to_string()),
            customer: None,
            billing_email: Some("customer@example.com".to_string()),
            card: Some(CardDetails {
                brand: Some("visa".to_string()),
                last4: Some("4242".to_string()),
                decline_code: Some("generic_decline".to_string()),
            }),
        }
    }
}
