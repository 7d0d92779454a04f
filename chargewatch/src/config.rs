//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `CHARGEWATCH_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `CHARGEWATCH_` override YAML values
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `CHARGEWATCH_WEBHOOK__SECRET=whsec_xyz` sets the `webhook.secret` field.
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! # Override server port
//! CHARGEWATCH_PORT=8080
//!
//! # Webhook signing secret and provider API key
//! CHARGEWATCH_WEBHOOK__SECRET="whsec_..."
//! CHARGEWATCH_PROVIDER__API_KEY="sk_live_..."
//!
//! # SMTP credentials
//! CHARGEWATCH_EMAIL__USERNAME="alerts@example.com"
//! CHARGEWATCH_EMAIL__PASSWORD="app-password"
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::Error;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "CHARGEWATCH_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines to catch config errors before deployment.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// This is the root configuration structure loaded from YAML and environment variables.
/// All fields have sensible defaults defined in the `Default` implementation, except for
/// the secrets which must come from the file or environment.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Service name reported by the health and status endpoints
    pub service_name: String,
    /// Fixed recipient for payment failure alerts
    pub notification_email: String,
    /// Webhook signature verification settings
    pub webhook: WebhookConfig,
    /// Payment provider API access, used to resolve customer details for alerts.
    /// When absent, alerts fall back to the billing details on the charge itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderConfig>,
    /// Email transport configuration for outbound alerts
    pub email: EmailConfig,
}

/// Webhook signature verification settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct WebhookConfig {
    /// Shared signing secret from the provider's webhook endpoint settings
    /// (starts with whsec_)
    pub secret: String,
    /// Signature timestamp tolerance window. Signed timestamps further than
    /// this from the current time are rejected to limit replay.
    #[serde(with = "humantime_serde")]
    pub tolerance: Duration,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            tolerance: Duration::from_secs(5 * 60),
        }
    }
}

/// Payment provider API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// Provider secret API key (starts with sk_)
    pub api_key: String,
    /// Provider API base URL. Overridable for tests.
    #[serde(default = "ProviderConfig::default_api_base")]
    pub api_base: String,
}

impl ProviderConfig {
    fn default_api_base() -> String {
        "https://api.stripe.com".to_string()
    }
}

/// Email configuration for outbound alerts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
// Note: Cannot use deny_unknown_fields here due to #[serde(flatten)] on transport
pub struct EmailConfig {
    /// Email transport method
    #[serde(flatten)]
    pub transport: EmailTransportConfig,
    /// Sender email address
    pub from_email: String,
    /// Sender display name
    pub from_name: String,
    /// Upper bound on a single transport send. A slow mail server otherwise
    /// stalls the webhook response and the provider's delivery accounting.
    #[serde(with = "humantime_serde")]
    pub send_timeout: Duration,
}

/// Email transport configuration - either SMTP or file-based for testing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EmailTransportConfig {
    /// Send emails via SMTP server
    Smtp {
        /// SMTP server hostname
        host: String,
        /// SMTP server port
        port: u16,
        /// SMTP authentication username
        username: String,
        /// SMTP authentication password
        password: String,
        /// Use TLS encryption
        use_tls: bool,
    },
    /// Write emails to files (for development/testing)
    File {
        /// Directory path where email files will be written
        path: String,
    },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            service_name: "chargewatch".to_string(),
            notification_email: "alerts@example.com".to_string(),
            webhook: WebhookConfig::default(),
            provider: None,
            email: EmailConfig::default(),
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            transport: EmailTransportConfig::default(),
            from_email: "noreply@example.com".to_string(),
            from_name: "Chargewatch".to_string(),
            send_timeout: Duration::from_secs(30),
        }
    }
}

impl Default for EmailTransportConfig {
    fn default() -> Self {
        Self::File {
            path: "./emails".to_string(),
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can override specific values
            .merge(Env::prefixed("CHARGEWATCH_").split("__"))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if self.webhook.secret.is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: webhook.secret is not configured. \
                     Set CHARGEWATCH_WEBHOOK__SECRET or add webhook.secret to the config file."
                    .to_string(),
            });
        }

        if self.webhook.tolerance.is_zero() {
            return Err(Error::Internal {
                operation: "Config validation: webhook.tolerance must be non-zero (default: 5m)".to_string(),
            });
        }

        if self.notification_email.parse::<lettre::message::Mailbox>().is_err() {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: notification_email {:?} is not a valid mailbox address",
                    self.notification_email
                ),
            });
        }

        if self.email.from_email.parse::<lettre::Address>().is_err() {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: email.from_email {:?} is not a valid address",
                    self.email.from_email
                ),
            });
        }

        if self.email.send_timeout.is_zero() {
            return Err(Error::Internal {
                operation: "Config validation: email.send_timeout must be non-zero (default: 30s)".to_string(),
            });
        }

        Ok(())
    }
}
