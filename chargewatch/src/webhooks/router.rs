//! Registry-based event dispatch.
//!
//! The router maps event type tags to handlers. Adding another monitored
//! event type means registering another handler; the dispatch control flow
//! never changes. Exactly one handler ships today: charge failures.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::activity::ActivityLog;
use crate::customers::CustomerClient;
use crate::email::EmailService;
use crate::errors::Result;
use crate::format;
use crate::webhooks::events::{EventType, PaymentFailureRecord, WebhookEvent};

/// A handler for one monitored event type.
///
/// Handlers run synchronously with respect to the HTTP request: the webhook
/// is only acknowledged once the handler (including downstream notification)
/// has completed, and handler errors surface as a 500 to the provider.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &WebhookEvent) -> Result<()>;
}

/// Dispatches verified events to their registered handlers.
pub struct EventRouter {
    handlers: HashMap<EventType, Box<dyn EventHandler>>,
    activity: Arc<ActivityLog>,
}

impl EventRouter {
    pub fn new(activity: Arc<ActivityLog>) -> Self {
        Self {
            handlers: HashMap::new(),
            activity,
        }
    }

    pub fn register(&mut self, event_type: EventType, handler: Box<dyn EventHandler>) {
        self.handlers.insert(event_type, handler);
    }

    /// Type tags with a registered handler, for the status endpoint.
    pub fn monitored_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().map(|t| t.to_string()).collect();
        types.sort();
        types
    }

    /// Route a verified event to its handler, or log the miss.
    ///
    /// Unregistered types are a no-op apart from a single "unhandled"
    /// activity entry - the provider still gets a 200.
    pub async fn dispatch(&self, event: &WebhookEvent) -> Result<()> {
        let event_type = EventType::from(event.event_type.as_str());
        match self.handlers.get(&event_type) {
            Some(handler) => handler.handle(event).await,
            None => {
                tracing::debug!(event_type = %event.event_type, "No handler registered for event type");
                self.activity.append(format!("unhandled event type: {}", event.event_type));
                Ok(())
            }
        }
    }
}

/// Handler for `charge.failed`: parse, resolve the customer, format, send.
pub struct ChargeFailedHandler {
    email: Arc<EmailService>,
    customers: Option<Arc<CustomerClient>>,
    recipient: String,
}

impl ChargeFailedHandler {
    pub fn new(email: Arc<EmailService>, customers: Option<Arc<CustomerClient>>, recipient: String) -> Self {
        Self {
            email,
            customers,
            recipient,
        }
    }
}

#[async_trait]
impl EventHandler for ChargeFailedHandler {
    #[tracing::instrument(skip_all)]
    async fn handle(&self, event: &WebhookEvent) -> Result<()> {
        let record = PaymentFailureRecord::from_event(event)?;
        tracing::info!(
            charge_id = %record.id,
            amount = record.amount,
            currency = %record.currency,
            "Processing failed charge"
        );

        // Missing customer reference skips the lookup entirely; a failed
        // lookup yields None and the formatter's defaults take over.
        let customer = match (&record.customer, &self.customers) {
            (Some(customer_id), Some(client)) => client.lookup(customer_id).await,
            _ => None,
        };

        let formatted_amount = format::format_amount(record.amount, &record.currency);
        let notification = format::format_notification(&record, customer.as_ref());

        self.email
            .send_payment_failure_alert(&self.recipient, &notification, &record.id, &formatted_amount)
            .await
    }
}
