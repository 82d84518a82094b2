//! Client lifecycle endpoints. The status transition handler is the
//! synchronous third trigger: flipping a client to active generates the
//! activation-month payments inline, and flipping to churned cancels
//! every open payment.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::db::{queries, AppState};
use crate::engine::{ledger, Month};
use crate::error::{AppError, Result};
use crate::models::{Client, ClientStatus, CreateClient, InvoiceStatus, PaymentTransaction};

pub async fn create_client(
    State(state): State<AppState>,
    Json(input): Json<CreateClient>,
) -> Result<(StatusCode, Json<Client>)> {
    if input.business_name.trim().is_empty() {
        return Err(AppError::BadRequest("business_name is required".into()));
    }
    if input.retainer_cents <= 0 {
        return Err(AppError::BadRequest("retainer_cents must be positive".into()));
    }

    let conn = state.db.get()?;
    if let Some(rep_id) = input.sales_rep_id {
        if queries::get_user_by_id(&conn, rep_id)?.is_none() {
            return Err(AppError::BadRequest(format!("sales rep {} does not exist", rep_id)));
        }
    }
    if let Some(manager_id) = input.master_manager_id {
        if queries::get_user_by_id(&conn, manager_id)?.is_none() {
            return Err(AppError::BadRequest(format!(
                "master manager {} does not exist",
                manager_id
            )));
        }
    }

    let client = queries::create_client(&conn, &input)?;
    tracing::info!(client_id = client.id, "client created");
    Ok((StatusCode::CREATED, Json(client)))
}

pub async fn get_client(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Client>> {
    let conn = state.db.get()?;
    let client = queries::get_client_by_id(&conn, id)?
        .ok_or_else(|| AppError::NotFound(format!("client {}", id)))?;
    Ok(Json(client))
}

pub async fn list_client_payments(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<PaymentTransaction>>> {
    let conn = state.db.get()?;
    if queries::get_client_by_id(&conn, id)?.is_none() {
        return Err(AppError::NotFound(format!("client {}", id)));
    }
    Ok(Json(queries::list_payments_for_client(&conn, id)?))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: ClientStatus,
    /// Churn reason, recorded when status is `churned`.
    pub reason: Option<String>,
}

pub async fn update_client_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateStatusRequest>,
) -> Result<Json<Value>> {
    let conn = state.db.get()?;
    let client = queries::get_client_by_id(&conn, id)?
        .ok_or_else(|| AppError::NotFound(format!("client {}", id)))?;

    if client.status == input.status {
        return Ok(Json(json!({ "ok": true, "unchanged": true })));
    }

    match input.status {
        ClientStatus::Active => {
            let was_active_before = client.onboarded_month.is_some();
            queries::update_client_status(&conn, id, ClientStatus::Active)?;
            let month = Month::of_timestamp(chrono::Utc::now().timestamp());
            let outcome = ledger::on_client_activated(&conn, id, month, &state.owner_user_ids)?;
            Ok(Json(json!({
                "ok": true,
                "status": "active",
                "reactivation": was_active_before,
                "payments_created": outcome.created,
                "payments_skipped": outcome.skipped,
            })))
        }
        ClientStatus::Churned => {
            let now = chrono::Utc::now().timestamp();
            let cancelled =
                ledger::on_client_churned(&conn, id, now, input.reason.as_deref())?;
            Ok(Json(json!({
                "ok": true,
                "status": "churned",
                "payments_cancelled": cancelled,
            })))
        }
        status => {
            queries::update_client_status(&conn, id, status)?;
            Ok(Json(json!({ "ok": true, "status": status.as_str() })))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpsellRequest {
    /// Monthly value of the new recurring line item, in cents.
    pub line_amount_cents: i64,
    /// Provider line-item reference, recorded for audit.
    pub line_item_id: Option<String>,
}

pub async fn add_upsell(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpsellRequest>,
) -> Result<Json<Value>> {
    let conn = state.db.get()?;
    let client = queries::get_client_by_id(&conn, id)?
        .ok_or_else(|| AppError::NotFound(format!("client {}", id)))?;

    let month = Month::of_timestamp(chrono::Utc::now().timestamp());
    let outcome = ledger::on_upsell_added(
        &conn,
        &client,
        input.line_amount_cents,
        month,
        state.upsell_commission_rate,
        input.line_item_id.as_deref(),
    )?;

    Ok(Json(json!({
        "ok": true,
        "payments_created": outcome.created,
        "payments_skipped": outcome.skipped,
    })))
}

#[derive(Debug, Deserialize)]
pub struct RegisterInvoiceRequest {
    pub wave_invoice_id: String,
    pub amount_cents: i64,
    #[serde(default = "default_invoice_status")]
    pub status: InvoiceStatus,
}

fn default_invoice_status() -> InvoiceStatus {
    InvoiceStatus::Sent
}

/// Mirror a provider invoice locally so the reconciliation poll can track
/// it. Re-registering the same wave invoice id is a conflict.
pub async fn register_invoice(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<RegisterInvoiceRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    let conn = state.db.get()?;
    if queries::get_client_by_id(&conn, id)?.is_none() {
        return Err(AppError::NotFound(format!("client {}", id)));
    }

    let invoice = queries::create_invoice_record(
        &conn,
        id,
        &input.wave_invoice_id,
        input.status,
        input.amount_cents,
    )
    .map_err(|e| match e {
        AppError::Database(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            AppError::Conflict(format!("invoice {} already registered", input.wave_invoice_id))
        }
        other => other,
    })?;

    Ok((StatusCode::CREATED, Json(json!({ "ok": true, "invoice": invoice }))))
}
