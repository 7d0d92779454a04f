//! # chargewatch: Payment Failure Alerting
//!
//! `chargewatch` is a small relay service that listens for signed webhooks
//! from a payment provider and turns failed charges into email alerts. It
//! exists for teams that want to hear about declined payments immediately
//! without wiring a full billing pipeline: point the provider's webhook
//! endpoint at this service, configure a recipient, and every `charge.failed`
//! event becomes a formatted email.
//!
//! ## Request Flow
//!
//! A webhook POST to `/webhook` is verified against the provider's signature
//! scheme (an HMAC-SHA256 over the timestamped raw body, see
//! [`webhooks::signing`]) before anything is parsed. Verified events are
//! dispatched through a type registry ([`webhooks::router`]); the
//! `charge.failed` handler flattens the charge payload, optionally resolves
//! the customer through the provider's API ([`customers`]), renders the alert
//! ([`format`]) and sends it ([`email`]). The provider is only acknowledged
//! once delivery has completed, so its retry machinery covers transient mail
//! failures.
//!
//! Alongside the webhook endpoint the service exposes `/health` for probes,
//! `/` for a service overview, `/logs` for the recent in-memory activity
//! trail, and `POST /test` to fire a synthetic alert through the real
//! delivery path.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use chargewatch::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = chargewatch::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     chargewatch::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config)?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.
pub mod activity;
pub mod api;
pub mod config;
pub mod customers;
pub mod email;
pub mod errors;
pub mod format;
pub mod telemetry;
pub mod webhooks;

#[cfg(test)]
pub mod test_utils;

use axum::{
    Router,
    routing::{get, post},
};
use bon::Builder;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, info};

use crate::activity::ActivityLog;
use crate::customers::CustomerClient;
use crate::email::EmailService;
use crate::webhooks::{ChargeFailedHandler, EventRouter, EventType};

pub use config::Config;

/// Application state shared across all request handlers.
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub activity: Arc<ActivityLog>,
    pub email: Arc<EmailService>,
    pub router: Arc<EventRouter>,
}

/// Build the application router with all endpoints and middleware.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(api::handlers::status::index))
        .route("/health", get(api::handlers::status::health))
        .route("/logs", get(api::handlers::status::recent_logs))
        .route("/test", post(api::handlers::status::trigger_test))
        .route("/webhook", post(api::handlers::webhooks::receive_webhook))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

/// Main application struct that owns all resources and lifecycle.
///
/// 1. **Create**: [`Application::new`] wires the activity log, mail transport,
///    optional provider API client, and the event handler registry
/// 2. **Serve**: [`Application::serve`] binds a TCP port and handles requests
///    until the shutdown future resolves
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub fn new(config: Config) -> anyhow::Result<Self> {
        tracing::debug!("Starting chargewatch with configuration: {:#?}", config);

        let activity = Arc::new(ActivityLog::new());
        let email = Arc::new(EmailService::new(&config, activity.clone())?);

        let customers = match &config.provider {
            Some(provider) => Some(Arc::new(CustomerClient::new(provider)?)),
            None => {
                info!("No provider API key configured, alerts will use billing details from the charge");
                None
            }
        };

        let mut registry = EventRouter::new(activity.clone());
        registry.register(
            EventType::ChargeFailed,
            Box::new(ChargeFailedHandler::new(
                email.clone(),
                customers,
                config.notification_email.clone(),
            )),
        );

        let state = AppState::builder()
            .config(config.clone())
            .activity(activity)
            .email(email)
            .router(Arc::new(registry))
            .build();

        let router = build_router(state);

        Ok(Self { router, config })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "chargewatch listening on http://{}, alerts go to {}",
            bind_addr, self.config.notification_email
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::test_utils::{create_test_app, create_test_config, signed_headers, TEST_WEBHOOK_SECRET};
    use serde_json::json;

    fn charge_failed_payload() -> String {
        json!({
            "id": "evt_1",
            "type": "charge.failed",
            "data": {
                "object": {
                    "id": "ch_e2e_1",
                    "amount": 2999,
                    "currency": "usd",
                    "created": 1705314725,
                    "failure_message": "Your card was declined.",
                    "failure_code": "card_declined",
                    "billing_details": { "email": "customer@example.com" },
                    "payment_method_details": {
                        "card": { "brand": "visa", "last4": "4242" }
                    },
                    "outcome": { "reason": "generic_decline" }
                }
            }
        })
        .to_string()
    }

    fn written_emails(dir: &std::path::Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| std::fs::read_to_string(e.unwrap().path()).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_verified_charge_failed_sends_alert() {
        let dir = tempfile::tempdir().unwrap();
        let server = create_test_app(create_test_config(dir.path()));

        let body = charge_failed_payload();
        let response = server
            .post("/webhook")
            .add_header("stripe-signature", signed_headers(&body, TEST_WEBHOOK_SECRET))
            .text(body)
            .content_type("application/json")
            .await;

        response.assert_status_ok();
        response.assert_json(&json!({ "received": true }));

        let emails = written_emails(dir.path());
        assert_eq!(emails.len(), 1);
        assert!(emails[0].contains("$29.99"));
        assert!(emails[0].contains("customer@example.com"));
        assert!(emails[0].contains("ch_e2e_1"));
        assert!(emails[0].contains("generic_decline"));

        let logs = server.get("/logs").await.json::<serde_json::Value>();
        let messages: Vec<&str> = logs["recent_logs"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["message"].as_str().unwrap())
            .collect();
        assert!(messages.contains(&"received charge.failed event"));
        assert!(messages.contains(&"alert sent for ch_e2e_1 ($29.99)"));
    }

    #[tokio::test]
    async fn test_bad_signature_rejected_without_alert() {
        let dir = tempfile::tempdir().unwrap();
        let server = create_test_app(create_test_config(dir.path()));

        let body = charge_failed_payload();
        let response = server
            .post("/webhook")
            .add_header("stripe-signature", signed_headers(&body, "whsec_wrong_secret"))
            .text(body)
            .content_type("application/json")
            .await;

        response.assert_status_bad_request();
        assert!(written_emails(dir.path()).is_empty());

        let logs = server.get("/logs").await.json::<serde_json::Value>();
        let messages: Vec<String> = logs["recent_logs"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["message"].as_str().unwrap().to_string())
            .collect();
        assert!(messages.iter().any(|m| m.starts_with("signature verification failed")));
        assert!(!messages.iter().any(|m| m.starts_with("received")));
    }

    #[tokio::test]
    async fn test_missing_signature_header_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let server = create_test_app(create_test_config(dir.path()));

        let response = server
            .post("/webhook")
            .text(charge_failed_payload())
            .content_type("application/json")
            .await;

        response.assert_status_bad_request();
        assert!(written_emails(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_monitored_event_with_non_charge_object_is_server_error() {
        let dir = tempfile::tempdir().unwrap();
        let server = create_test_app(create_test_config(dir.path()));

        // Validly signed, but the payload isn't a charge: a processing
        // failure, so the provider should see a 500 and retry
        let body = json!({ "id": "evt_3", "type": "charge.failed", "data": { "object": { "not_a_charge": true } } })
            .to_string();
        let response = server
            .post("/webhook")
            .add_header("stripe-signature", signed_headers(&body, TEST_WEBHOOK_SECRET))
            .text(body)
            .content_type("application/json")
            .await;

        response.assert_status(axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        assert!(written_emails(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_unhandled_event_type_acknowledged() {
        let dir = tempfile::tempdir().unwrap();
        let server = create_test_app(create_test_config(dir.path()));

        let body = json!({ "id": "evt_2", "type": "invoice.paid", "data": { "object": {} } }).to_string();
        let response = server
            .post("/webhook")
            .add_header("stripe-signature", signed_headers(&body, TEST_WEBHOOK_SECRET))
            .text(body)
            .content_type("application/json")
            .await;

        response.assert_status_ok();
        response.assert_json(&json!({ "received": true }));
        assert!(written_emails(dir.path()).is_empty());

        let logs = server.get("/logs").await.json::<serde_json::Value>();
        let messages: Vec<&str> = logs["recent_logs"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["message"].as_str().unwrap())
            .collect();
        assert_eq!(
            messages.iter().filter(|m| **m == "unhandled event type: invoice.paid").count(),
            1
        );
    }

    #[tokio::test]
    async fn test_health_and_index_endpoints() {
        let dir = tempfile::tempdir().unwrap();
        let server = create_test_app(create_test_config(dir.path()));

        let health = server.get("/health").await.json::<serde_json::Value>();
        assert_eq!(health["status"], "ok");
        assert_eq!(health["service"], "chargewatch");

        let index = server.get("/").await.json::<serde_json::Value>();
        assert_eq!(index["status"], "running");
        assert_eq!(index["monitored_events"], json!(["charge.failed"]));
        assert_eq!(index["endpoints"]["webhook"], "POST /webhook");
    }

    #[tokio::test]
    async fn test_trigger_test_alert() {
        let dir = tempfile::tempdir().unwrap();
        let server = create_test_app(create_test_config(dir.path()));

        let response = server.post("/test").await;
        response.assert_status_ok();

        let body = response.json::<serde_json::Value>();
        assert_eq!(body["success"], true);
        assert_eq!(body["sent_to"], "alerts@example.com");
        let charge_id = body["test_charge_id"].as_str().unwrap();
        assert!(charge_id.starts_with("ch_test_"));

        let emails = written_emails(dir.path());
        assert_eq!(emails.len(), 1);
        assert!(emails[0].contains("$29.99"));
        assert!(emails[0].contains(charge_id));
    }
}
