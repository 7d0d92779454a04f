//! Shared helpers for unit and end-to-end tests.

use std::path::Path;

use crate::config::{Config, EmailTransportConfig, WebhookConfig};
use crate::webhooks::signing;
use crate::Application;

pub const TEST_WEBHOOK_SECRET: &str = "whsec_test_secret";

/// A config with the file email transport writing into `emails_dir`, so tests
/// can assert on delivered messages without a mail server.
pub fn create_test_config(emails_dir: &Path) -> Config {
    Config {
        webhook: WebhookConfig {
            secret: TEST_WEBHOOK_SECRET.to_string(),
            ..WebhookConfig::default()
        },
        email: crate::config::EmailConfig {
            transport: EmailTransportConfig::File {
                path: emails_dir.to_string_lossy().into_owned(),
            },
            ..crate::config::EmailConfig::default()
        },
        ..Config::default()
    }
}

pub fn create_test_app(config: Config) -> axum_test::TestServer {
    Application::new(config)
        .expect("Failed to create test application")
        .into_test_server()
}

/// Sign `body` with `secret` at the current time, producing a header value
/// the verifier accepts.
pub fn signed_headers(body: &str, secret: &str) -> String {
    let timestamp = chrono::Utc::now().timestamp();
    signing::sign_payload(timestamp, body, secret).expect("Failed to sign test payload")
}
