//! Email service for sending payment failure alerts.

use lettre::{
    AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::{activity::ActivityLog, config::Config, errors::Error, format::Notification};

pub struct EmailService {
    transport: EmailTransport,
    from_email: String,
    from_name: String,
    send_timeout: Duration,
    activity: Arc<ActivityLog>,
}

enum EmailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
}

impl EmailService {
    pub fn new(config: &Config, activity: Arc<ActivityLog>) -> Result<Self, Error> {
        let email_config = &config.email;

        let transport = match &email_config.transport {
            crate::config::EmailTransportConfig::Smtp {
                host,
                port,
                username,
                password,
                use_tls,
            } => {
                if !use_tls {
                    tracing::warn!("SMTP TLS is disabled - this is not recommended for production");
                }

                let smtp_builder = if *use_tls {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                } else {
                    Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host))
                }
                .map_err(|e| Error::Internal {
                    operation: format!("create SMTP transport: {e}"),
                })?
                .port(*port)
                .credentials(Credentials::new(username.clone(), password.clone()));

                EmailTransport::Smtp(smtp_builder.build())
            }
            crate::config::EmailTransportConfig::File { path } => {
                // File transport for development/testing
                let emails_dir = Path::new(path);
                if !emails_dir.exists() {
                    std::fs::create_dir_all(emails_dir).map_err(|e| Error::Internal {
                        operation: format!("create emails directory: {e}"),
                    })?;
                }
                let file_transport = AsyncFileTransport::<Tokio1Executor>::new(emails_dir);
                EmailTransport::File(file_transport)
            }
        };

        Ok(Self {
            transport,
            from_email: email_config.from_email.clone(),
            from_name: email_config.from_name.clone(),
            send_timeout: email_config.send_timeout,
            activity,
        })
    }

    /// Send a formatted payment failure alert and record the outcome in the
    /// activity log. `charge_id` and `formatted_amount` only feed the log and
    /// tracing output; the notification itself is already fully rendered.
    pub async fn send_payment_failure_alert(
        &self,
        to_email: &str,
        notification: &Notification,
        charge_id: &str,
        formatted_amount: &str,
    ) -> Result<(), Error> {
        match self.send_email(to_email, &notification.subject, &notification.body).await {
            Ok(()) => {
                tracing::info!(charge_id, to_email, "payment failure alert sent");
                self.activity
                    .append(format!("alert sent for {charge_id} ({formatted_amount})"));
                Ok(())
            }
            Err(e) => {
                self.activity.append(format!("alert delivery failed: {e}"));
                Err(Error::Delivery {
                    message: format!("send alert for {charge_id}: {e}"),
                })
            }
        }
    }

    async fn send_email(&self, to_email: &str, subject: &str, body: &str) -> Result<(), Error> {
        let from = format!("{} <{}>", self.from_name, self.from_email)
            .parse::<Mailbox>()
            .map_err(|e| Error::Internal {
                operation: format!("parse from email: {e}"),
            })?;

        let to = to_email.parse::<Mailbox>().map_err(|e| Error::Internal {
            operation: format!("parse to email: {e}"),
        })?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(body.to_string())
            .map_err(|e| Error::Internal {
                operation: format!("build email message: {e}"),
            })?;

        let send = async {
            match &self.transport {
                EmailTransport::Smtp(smtp) => {
                    smtp.send(message).await.map_err(|e| Error::Internal {
                        operation: format!("send SMTP email: {e}"),
                    })?;
                }
                EmailTransport::File(file) => {
                    file.send(message).await.map_err(|e| Error::Internal {
                        operation: format!("send file email: {e}"),
                    })?;
                }
            }
            Ok(())
        };

        match tokio::time::timeout(self.send_timeout, send).await {
            Ok(result) => result,
            Err(_) => Err(Error::Internal {
                operation: format!("send email: timed out after {:?}", self.send_timeout),
            }),
        }
    }
}
