//! Axum route handlers.

use axum::Json;
use axum::body::Bytes;
use axum::extract::Extension;
use gate402_http::PaymentContext;
use serde_json::{Value, json};

/// `GET /health` - Liveness check, never gated.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// `POST /echo` - Returns the request body under `echo`.
///
/// Only reachable through the payment gate, which supplies the
/// [`PaymentContext`]. A body that is not JSON is echoed as a string; an
/// empty body as `null`.
pub async fn echo(Extension(payment): Extension<PaymentContext>, body: Bytes) -> Json<Value> {
    tracing::debug!(
        transaction = %payment.transaction,
        payer = payment.payer.as_deref().unwrap_or("unknown"),
        bytes = body.len(),
        "Echoing paid request"
    );
    let echoed = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()))
    };
    Json(json!({ "echo": echoed }))
}
