//! Payment ledger review endpoints: pending queue, approval flow, and
//! per-user earnings.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::models::PaymentTransaction;

pub async fn list_pending(State(state): State<AppState>) -> Result<Json<Vec<PaymentTransaction>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_pending_payments(&conn)?))
}

pub async fn approve(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let conn = state.db.get()?;
    let payment = queries::get_payment_by_id(&conn, &id)?
        .ok_or_else(|| AppError::NotFound(format!("payment {}", id)))?;

    if !queries::approve_payment(&conn, &id)? {
        return Err(AppError::Conflict(format!(
            "payment {} is {}, only pending payments can be approved",
            id,
            payment.status
        )));
    }
    tracing::info!(payment_id = %id, "payment approved");
    Ok(Json(json!({ "ok": true, "status": "approved" })))
}

pub async fn mark_paid(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let conn = state.db.get()?;
    let payment = queries::get_payment_by_id(&conn, &id)?
        .ok_or_else(|| AppError::NotFound(format!("payment {}", id)))?;

    if !queries::mark_payment_paid(&conn, &id)? {
        return Err(AppError::Conflict(format!(
            "payment {} is {}, only approved payments can be marked paid",
            id,
            payment.status
        )));
    }
    tracing::info!(payment_id = %id, "payment marked paid");
    Ok(Json(json!({ "ok": true, "status": "paid" })))
}

pub async fn user_earnings(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Value>> {
    let conn = state.db.get()?;
    if queries::get_user_by_id(&conn, user_id)?.is_none() {
        return Err(AppError::NotFound(format!("user {}", user_id)));
    }

    let payments = queries::list_user_earnings(&conn, user_id)?;
    let total_cents: i64 = payments.iter().map(|p| p.amount_cents).sum();
    Ok(Json(json!({
        "user_id": user_id,
        "total_cents": total_cents,
        "payments": payments,
    })))
}
