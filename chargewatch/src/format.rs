//! Payment failure alert formatting.
//!
//! Turns a [`PaymentFailureRecord`] (plus an optionally resolved customer)
//! into a subject and HTML body. Every optional field goes through a pure
//! `resolve_*` function that maps absent data to a documented default, so
//! formatting can never fail on a sparse payload.

use chrono::DateTime;

use crate::customers::CustomerInfo;
use crate::webhooks::events::PaymentFailureRecord;

/// A formatted alert ready for the sender.
#[derive(Debug, Clone)]
pub struct Notification {
    pub subject: String,
    pub body: String,
}

/// Format a minor-unit amount with its currency symbol, e.g. `2999 usd`
/// renders `$29.99`.
pub fn format_amount(amount: i64, currency: &str) -> String {
    let negative = amount < 0;
    let abs = amount.unsigned_abs();
    let value = format!("{}.{:02}", group_thousands(abs / 100), abs % 100);
    let value = if negative { format!("-{value}") } else { value };

    match currency_symbol(currency) {
        Some(symbol) => format!("{symbol}{value}"),
        None => format!("{} {value}", currency.to_uppercase()),
    }
}

fn currency_symbol(currency: &str) -> Option<&'static str> {
    match currency.to_ascii_lowercase().as_str() {
        "usd" | "aud" | "cad" | "nzd" | "sgd" | "hkd" | "mxn" => Some("$"),
        "eur" => Some("€"),
        "gbp" => Some("£"),
        "jpy" => Some("¥"),
        _ => None,
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

/// Render a unix timestamp as a human-readable UTC date/time.
pub fn format_timestamp(created: Option<i64>) -> String {
    created
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .map(|dt| dt.format("%B %-d, %Y at %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

pub fn resolve_customer_name(customer: Option<&CustomerInfo>) -> String {
    customer
        .and_then(|c| c.name.clone())
        .unwrap_or_else(|| "Unknown Customer".to_string())
}

/// Resolved customer email wins over the billing email on the charge.
pub fn resolve_customer_email(billing_email: Option<&str>, customer: Option<&CustomerInfo>) -> String {
    customer
        .and_then(|c| c.email.clone())
        .or_else(|| billing_email.map(str::to_string))
        .unwrap_or_else(|| "No email provided".to_string())
}

pub fn resolve_card_brand(brand: Option<&str>) -> String {
    brand.map(str::to_string).unwrap_or_else(|| "Unknown".to_string())
}

pub fn resolve_card_last4(last4: Option<&str>) -> String {
    last4.map(str::to_string).unwrap_or_else(|| "N/A".to_string())
}

pub fn resolve_decline_code(decline_code: Option<&str>) -> String {
    decline_code.map(str::to_string).unwrap_or_else(|| "N/A".to_string())
}

pub fn resolve_failure_reason(failure_message: Option<&str>) -> String {
    failure_message.map(str::to_string).unwrap_or_else(|| "Unknown reason".to_string())
}

pub fn resolve_failure_code(failure_code: Option<&str>) -> String {
    failure_code.map(str::to_string).unwrap_or_else(|| "unknown".to_string())
}

/// Build the alert for a failed charge.
pub fn format_notification(record: &PaymentFailureRecord, customer: Option<&CustomerInfo>) -> Notification {
    let amount = format_amount(record.amount, &record.currency);
    let subject = format!("[ALERT] Payment failed: {amount}");

    let charge_date = format_timestamp(record.created);
    let failure_reason = resolve_failure_reason(record.failure_message.as_deref());
    let failure_code = resolve_failure_code(record.failure_code.as_deref());

    let customer_name = resolve_customer_name(customer);
    let customer_email = resolve_customer_email(record.billing_email.as_deref(), customer);
    let customer_id = record.customer.as_deref().unwrap_or("N/A");

    let card = record.card.as_ref();
    let card_brand = resolve_card_brand(card.and_then(|c| c.brand.as_deref()));
    let card_last4 = resolve_card_last4(card.and_then(|c| c.last4.as_deref()));
    let decline_code = resolve_decline_code(card.and_then(|c| c.decline_code.as_deref()));

    let body = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Payment Failed</title>
    <style>
        body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
        h2 {{ color: #c0392b; }}
        h3 {{ border-bottom: 1px solid #ddd; padding-bottom: 4px; }}
        .footer {{ margin-top: 30px; font-size: 12px; color: #666; }}
    </style>
</head>
<body>
    <div class="container">
        <h2>Payment Failed: {amount}</h2>

        <h3>Payment Details</h3>
        <p><strong>Charge ID:</strong> {charge_id}</p>
        <p><strong>Amount:</strong> {amount}</p>
        <p><strong>Date:</strong> {charge_date}</p>
        <p><strong>Failure Reason:</strong> {failure_reason}</p>
        <p><strong>Failure Code:</strong> {failure_code}</p>

        <h3>Customer Information</h3>
        <p><strong>Name:</strong> {customer_name}</p>
        <p><strong>Email:</strong> {customer_email}</p>
        <p><strong>Customer ID:</strong> {customer_id}</p>

        <h3>Card Information</h3>
        <p><strong>Brand:</strong> {card_brand}</p>
        <p><strong>Last 4:</strong> {card_last4}</p>
        <p><strong>Decline Code:</strong> {decline_code}</p>

        <div class="footer">
            <p>This is an automated alert, please do not reply to this email.</p>
        </div>
    </div>
</body>
</html>"#,
        charge_id = record.id,
    );

    Notification { subject, body }
}
