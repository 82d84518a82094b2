//! Inbound Wave webhook handler - the primary payment-generation trigger.
//!
//! Deduplicates on (source, external_id), so redelivered events are
//! acknowledged without touching the ledger. Processing failures still
//! return 200: Wave retries on 5xx, and a retry of a buggy event would
//! fail identically forever. The failed row in `webhook_events` is the
//! replay mechanism for recoverable failures.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::db::{queries, AppState};
use crate::engine::ledger;
use crate::models::WebhookEventStatus;
use crate::providers::wave;

/// Wave webhook envelope. Field placement varies between payload versions,
/// so everything is optional and resolved by precedence.
#[derive(Debug, Deserialize)]
struct WaveWebhookPayload {
    id: Option<String>,
    #[serde(rename = "eventType")]
    event_type: Option<String>,
    event: Option<String>,
    data: Option<WavePayloadData>,
    invoice: Option<WavePayloadInvoice>,
}

#[derive(Debug, Deserialize)]
struct WavePayloadData {
    id: Option<String>,
    invoice: Option<WavePayloadInvoice>,
    #[serde(rename = "customerId")]
    customer_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WavePayloadInvoice {
    customer: Option<WaveCustomerRef>,
    #[serde(rename = "customerId")]
    customer_id: Option<String>,
    #[serde(rename = "paidAt")]
    paid_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct WaveCustomerRef {
    id: String,
}

impl WaveWebhookPayload {
    fn event_type(&self) -> &str {
        self.event_type
            .as_deref()
            .or(self.event.as_deref())
            .unwrap_or("unknown")
    }

    /// Customer id precedence: data.invoice.customer.id, then
    /// invoice.customerId, then data.customerId.
    fn customer_id(&self) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(|d| d.invoice.as_ref())
            .and_then(|i| i.customer.as_ref())
            .map(|c| c.id.as_str())
            .or_else(|| {
                self.invoice
                    .as_ref()
                    .and_then(|i| i.customer_id.as_deref())
            })
            .or_else(|| self.data.as_ref().and_then(|d| d.customer_id.as_deref()))
    }

    fn paid_at(&self) -> Option<i64> {
        self.data
            .as_ref()
            .and_then(|d| d.invoice.as_ref())
            .and_then(|i| i.paid_at)
            .or_else(|| self.invoice.as_ref().and_then(|i| i.paid_at))
    }
}

pub async fn handle_wave_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    // Signature check is skipped when no secret is configured (dev).
    if let Some(secret) = &state.wave_webhook_secret {
        let signature = headers
            .get("x-wave-signature")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        match wave::verify_webhook_signature(secret, &body, signature) {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!("wave webhook rejected: invalid signature");
                return (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({ "error": "Invalid signature" })),
                );
            }
            Err(e) => {
                tracing::error!("signature verification error: {}", e);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Signature verification failed" })),
                );
            }
        }
    }

    let payload: WaveWebhookPayload = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Invalid JSON" })),
            )
        }
    };

    let event_type = payload.event_type().to_string();
    let event_id = payload
        .id
        .clone()
        .or_else(|| payload.data.as_ref().and_then(|d| d.id.clone()))
        .unwrap_or_else(|| format!("{}-{}", event_type, chrono::Utc::now().timestamp_millis()));

    let conn = match state.db.get() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("DB connection error: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Database error" })),
            );
        }
    };

    // Idempotency: a processed event is acknowledged without reprocessing.
    match queries::get_webhook_event(&conn, "wave", &event_id) {
        Ok(Some(existing)) if existing.status == WebhookEventStatus::Processed => {
            return (
                StatusCode::OK,
                Json(json!({ "ok": true, "skipped": true, "reason": "already_processed" })),
            );
        }
        Ok(_) => {}
        Err(e) => {
            tracing::error!("DB error: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Database error" })),
            );
        }
    }

    let raw_payload = String::from_utf8_lossy(&body).into_owned();
    let event = match queries::upsert_webhook_event(&conn, "wave", &event_id, &event_type, &raw_payload)
    {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("failed to record webhook event: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Database error" })),
            );
        }
    };

    let result = match event_type.as_str() {
        "invoice.paid" | "INVOICE_PAID" => handle_invoice_paid(&state, &conn, &payload, &event_id),
        other => {
            tracing::debug!("unhandled wave event type: {}", other);
            Ok(json!({ "skipped": true, "reason": "unhandled_event_type" }))
        }
    };

    match result {
        Ok(body) => {
            if let Err(e) = queries::mark_webhook_event_processed(&conn, &event.id) {
                tracing::error!("failed to mark webhook event processed: {}", e);
            }
            let mut response = json!({ "ok": true });
            if let (Some(obj), Some(extra)) = (response.as_object_mut(), body.as_object()) {
                obj.extend(extra.clone());
            }
            (StatusCode::OK, Json(response))
        }
        Err(e) => {
            let error_msg = e.to_string();
            tracing::error!("wave webhook processing failed for {}: {}", event_id, error_msg);
            if let Err(e) = queries::mark_webhook_event_failed(&conn, &event.id, &error_msg) {
                tracing::error!("failed to mark webhook event failed: {}", e);
            }
            // 200 on purpose: a retry would hit the same bug. The failed
            // webhook_events row is what gets replayed once fixed.
            (
                StatusCode::OK,
                Json(json!({ "ok": false, "error": error_msg })),
            )
        }
    }
}

fn handle_invoice_paid(
    state: &AppState,
    conn: &rusqlite::Connection,
    payload: &WaveWebhookPayload,
    event_id: &str,
) -> crate::error::Result<serde_json::Value> {
    let customer_id = match payload.customer_id() {
        Some(id) => id,
        None => {
            tracing::warn!("invoice.paid event {} has no customer id, skipping", event_id);
            return Ok(json!({ "skipped": true, "reason": "no_customer_id" }));
        }
    };

    let client = match queries::get_client_by_wave_customer_id(conn, customer_id)? {
        Some(c) => c,
        None => {
            tracing::warn!("no client found for wave customer {}", customer_id);
            return Ok(json!({
                "skipped": true,
                "reason": "no_client_match",
                "wave_customer_id": customer_id,
            }));
        }
    };

    let paid_at = payload.paid_at().unwrap_or_else(|| chrono::Utc::now().timestamp());
    let outcome = ledger::on_invoice_paid(conn, &client, paid_at, &state.owner_user_ids, event_id)?;

    Ok(json!({
        "client_id": client.id,
        "payments_created": outcome.created,
        "payments_skipped": outcome.skipped,
    }))
}
