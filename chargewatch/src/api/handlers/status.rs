//! Health, status, activity log, and test-fire endpoints.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde_json::{Value, json};

use crate::AppState;
use crate::activity::RECENT_LIMIT;
use crate::format;
use crate::webhooks::events::PaymentFailureRecord;

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
        "service": state.config.service_name,
    }))
}

/// Service overview for humans poking at the root URL.
pub async fn index(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "service": state.config.service_name,
        "status": "running",
        "endpoints": {
            "webhook": "POST /webhook",
            "health": "GET /health",
            "logs": "GET /logs",
            "test": "POST /test",
        },
        "notification_email": state.config.notification_email,
        "monitored_events": state.router.monitored_types(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn recent_logs(State(state): State<AppState>) -> Json<Value> {
    let (recent, total) = state.activity.recent(RECENT_LIMIT);
    Json(json!({
        "recent_logs": recent,
        "total_logs": total,
    }))
}

/// Fire a synthetic payment failure alert through the real formatting and
/// delivery path, without touching signature verification or dispatch.
#[tracing::instrument(skip_all)]
pub async fn trigger_test(State(state): State<AppState>) -> Response {
    let record = PaymentFailureRecord::synthetic();
    let formatted_amount = format::format_amount(record.amount, &record.currency);
    let notification = format::format_notification(&record, None);

    match state
        .email
        .send_payment_failure_alert(&state.config.notification_email, &notification, &record.id, &formatted_amount)
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "Test alert sent",
                "test_charge_id": record.id,
                "sent_to": state.config.notification_email,
            })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "success": false,
                "error": e.user_message(),
            })),
        )
            .into_response(),
    }
}
