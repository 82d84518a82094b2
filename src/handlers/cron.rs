//! Scheduled trigger endpoints, protected by a bearer token.
//!
//! `/cron/invoice-status-poll` runs hourly: re-fetch every open invoice
//! from Wave and run the payment engine for any that flipped to paid.
//! Covers webhook deliveries that never arrived.
//!
//! `/cron/generate-payments` runs monthly: the catch-all that generates
//! residuals and master fees for every active client the async triggers
//! missed. Safe to re-run - existing rows are skipped.

use std::str::FromStr;
use std::time::Duration;

use axum::{extract::State, http::HeaderMap, Json};
use serde::Serialize;
use serde_json::{json, Value};

use crate::db::{queries, AppState};
use crate::engine::{ledger, Month};
use crate::error::{AppError, Result};
use crate::models::InvoiceStatus;
use crate::providers::wave::WaveClient;

fn require_cron_auth(state: &AppState, headers: &HeaderMap) -> Result<()> {
    let secret = match &state.cron_secret {
        Some(s) => s,
        // No secret configured (dev): endpoints are open.
        None => return Ok(()),
    };
    let expected = format!("Bearer {}", secret);
    let provided = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if provided != expected {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

#[derive(Debug, Default, Serialize)]
struct PollSummary {
    checked: usize,
    unchanged: usize,
    paid_flips: usize,
    payments_created: usize,
    payments_skipped: usize,
    errors: Vec<String>,
}

/// Hourly reconciliation poll over all open invoices.
pub async fn invoice_status_poll(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>> {
    require_cron_auth(&state, &headers)?;

    let api_token = state
        .wave_api_token
        .clone()
        .ok_or_else(|| AppError::Internal("WAVE_API_TOKEN not configured".into()))?;
    let wave = WaveClient::new(api_token);

    let open_invoices = {
        let conn = state.db.get()?;
        queries::list_open_invoices(&conn)?
    };

    let mut summary = PollSummary {
        checked: open_invoices.len(),
        ..Default::default()
    };
    let month = Month::of_timestamp(chrono::Utc::now().timestamp());

    for invoice in &open_invoices {
        // Spread provider calls out; the whole cycle has an hour.
        tokio::time::sleep(Duration::from_millis(state.poll_request_delay_ms)).await;

        let remote = match wave.get_invoice(&invoice.wave_invoice_id).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("poll fetch failed for invoice {}: {}", invoice.wave_invoice_id, e);
                summary
                    .errors
                    .push(format!("{}: {}", invoice.wave_invoice_id, e));
                continue;
            }
        };

        let new_status = match InvoiceStatus::from_str(&remote.status.to_lowercase()) {
            Ok(s) => s,
            Err(e) => {
                summary.errors.push(e);
                continue;
            }
        };
        if new_status == invoice.status {
            summary.unchanged += 1;
            continue;
        }

        let is_paid = new_status == InvoiceStatus::Paid;
        let now = chrono::Utc::now().timestamp();
        let conn = state.db.get()?;
        queries::update_invoice_status(
            &conn,
            &invoice.id,
            new_status,
            is_paid.then_some(remote.paid_cents),
            is_paid.then_some(now),
        )?;

        if !is_paid {
            continue;
        }
        summary.paid_flips += 1;

        let client = match queries::get_client_by_id(&conn, invoice.client_id)? {
            Some(c) => c,
            None => {
                summary
                    .errors
                    .push(format!("invoice {} has no client", invoice.id));
                continue;
            }
        };

        // Same event-id shape across poll cycles, so a second cycle in
        // the same month rides the ledger's uniqueness key.
        let event_id = format!("poll-{}-{}", invoice.wave_invoice_id, month.short());
        match ledger::on_invoice_paid(&conn, &client, now, &state.owner_user_ids, &event_id) {
            Ok(outcome) => {
                summary.payments_created += outcome.created;
                summary.payments_skipped += outcome.skipped;
            }
            Err(e) => {
                tracing::error!("poll payment generation failed for client {}: {}", client.id, e);
                summary.errors.push(format!("client {}: {}", client.id, e));
            }
        }
    }

    tracing::info!(
        checked = summary.checked,
        paid_flips = summary.paid_flips,
        created = summary.payments_created,
        "invoice status poll complete"
    );
    Ok(Json(serde_json::to_value(summary)?))
}

/// Monthly catch-all payment generation over every active client.
pub async fn generate_payments(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>> {
    require_cron_auth(&state, &headers)?;

    let started = std::time::Instant::now();
    let month = Month::of_timestamp(chrono::Utc::now().timestamp());
    let source_event_id = format!("cron-{}", month.short());

    let conn = state.db.get()?;
    let clients = queries::list_active_clients(&conn)?;

    let mut created = 0usize;
    let mut skipped = 0usize;
    let mut errors: Vec<String> = Vec::new();

    for client in &clients {
        match ledger::generate_for_client(
            &conn,
            client,
            month,
            false,
            &state.owner_user_ids,
            Some(&source_event_id),
        ) {
            Ok(outcome) => {
                created += outcome.created;
                skipped += outcome.skipped;
            }
            Err(e) => {
                tracing::error!("payment generation failed for client {}: {}", client.id, e);
                errors.push(format!("client {}: {}", client.id, e));
            }
        }
    }

    tracing::info!(
        clients = clients.len(),
        created,
        skipped,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "monthly payment generation complete"
    );
    Ok(Json(json!({
        "month": month.to_string(),
        "clients": clients.len(),
        "created": created,
        "skipped": skipped,
        "errors": errors,
    })))
}
