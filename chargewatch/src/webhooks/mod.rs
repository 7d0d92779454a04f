//! Webhook ingestion pipeline.
//!
//! - [`signing`]: HMAC-SHA256 signature verification for the provider's signed-header scheme
//! - [`events`]: Event types and payload parsing for payment events
//! - [`router`]: Registry-based dispatch from event type to handler

pub mod events;
pub mod router;
pub mod signing;

pub use events::{EventType, PaymentFailureRecord, WebhookEvent};
pub use router::{ChargeFailedHandler, EventHandler, EventRouter};
