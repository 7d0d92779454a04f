//! Webhook ingestion endpoint.

use axum::{Json, extract::State, http::HeaderMap};
use serde_json::{Value, json};

use crate::AppState;
use crate::errors::{Error, Result};
use crate::webhooks::signing;

/// Receive a signed webhook from the payment provider.
///
/// The raw body is taken as a `String` because the signature is computed over
/// the exact bytes on the wire; any re-serialization would break verification.
/// Handler failures surface as a 500 so the provider retries the delivery.
#[tracing::instrument(skip_all)]
pub async fn receive_webhook(State(state): State<AppState>, headers: HeaderMap, body: String) -> Result<Json<Value>> {
    let Some(header) = headers.get(signing::SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
        state
            .activity
            .append("signature verification failed: missing signature header".to_string());
        return Err(Error::SignatureVerification {
            reason: "missing signature header".to_string(),
        });
    };

    let event = match signing::construct_event(&body, header, &state.config.webhook.secret, state.config.webhook.tolerance)
    {
        Ok(event) => event,
        Err(e) => {
            match &e {
                Error::SignatureVerification { reason } => {
                    state.activity.append(format!("signature verification failed: {reason}"));
                }
                other => {
                    state.activity.append(format!("rejected webhook payload: {other}"));
                }
            }
            return Err(e);
        }
    };

    tracing::info!(event_type = %event.event_type, "Received webhook event");
    state.activity.append(format!("received {} event", event.event_type));

    state.router.dispatch(&event).await?;

    Ok(Json(json!({ "received": true })))
}
