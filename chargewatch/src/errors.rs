use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Webhook signature verification failed - untrusted input
    #[error("Signature verification failed: {reason}")]
    SignatureVerification { reason: String },

    /// Invalid request data
    #[error("{message}")]
    BadRequest { message: String },

    /// Notification could not be delivered through the mail transport
    #[error("Notification delivery failed: {message}")]
    Delivery { message: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::SignatureVerification { .. } => StatusCode::BAD_REQUEST,
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::Delivery { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::SignatureVerification { reason } => {
                format!("Signature verification failed: {reason}")
            }
            Error::BadRequest { message } => message.clone(),
            Error::Delivery { .. } => "Notification delivery failed".to_string(),
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::Other(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Delivery { .. } | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::SignatureVerification { .. } => {
                tracing::warn!("Rejected webhook: {}", self);
            }
            Error::BadRequest { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        (self.status_code(), self.user_message()).into_response()
    }
}

/// Convert from String errors (e.g., from external functions)
impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Internal { operation: msg }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let err = Error::SignatureVerification {
            reason: "bad hmac".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = Error::Delivery {
            message: "connection refused".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = Error::Internal {
            operation: "build message".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_delivery_error_does_not_leak_transport_detail() {
        let err = Error::Delivery {
            message: "smtp://secret-host:25 refused".to_string(),
        };
        assert_eq!(err.user_message(), "Notification delivery failed");
    }

    #[test]
    fn test_signature_error_is_surfaced_to_client() {
        let err = Error::SignatureVerification {
            reason: "timestamp outside tolerance".to_string(),
        };
        assert!(err.user_message().contains("timestamp outside tolerance"));
    }
}
