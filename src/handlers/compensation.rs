//! User and compensation configuration endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::models::{
    CompensationConfig, CompensationOverride, CreateUser, UpsertCompensationConfig,
    UpsertCompensationOverride, User,
};

pub async fn create_user(
    State(state): State<AppState>,
    Json(input): Json<CreateUser>,
) -> Result<(StatusCode, Json<User>)> {
    if input.name.trim().is_empty() || input.email.trim().is_empty() {
        return Err(AppError::BadRequest("name and email are required".into()));
    }
    let conn = state.db.get()?;
    let user = queries::create_user(&conn, &input)?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_compensation(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<CompensationConfig>> {
    let conn = state.db.get()?;
    let config = queries::get_compensation_config(&conn, user_id)?
        .ok_or_else(|| AppError::NotFound(format!("compensation config for user {}", user_id)))?;
    Ok(Json(config))
}

/// Create or replace a user's default compensation config. Changes apply
/// to future calculations only - locked residuals and existing ledger rows
/// are untouched.
pub async fn upsert_compensation(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(input): Json<UpsertCompensationConfig>,
) -> Result<Json<CompensationConfig>> {
    if input.residual_start_month < 1 {
        return Err(AppError::BadRequest("residual_start_month must be at least 1".into()));
    }
    let conn = state.db.get()?;
    if queries::get_user_by_id(&conn, user_id)?.is_none() {
        return Err(AppError::NotFound(format!("user {}", user_id)));
    }
    let config = queries::upsert_compensation_config(&conn, user_id, &input)?;
    tracing::info!(user_id, "compensation config updated");
    Ok(Json(config))
}

/// Create or replace a per-(client, user) override. NULL fields fall
/// through to the user's default config.
pub async fn upsert_override(
    State(state): State<AppState>,
    Path((client_id, user_id)): Path<(i64, i64)>,
    Json(input): Json<UpsertCompensationOverride>,
) -> Result<Json<CompensationOverride>> {
    if let Some(rate) = input.upsell_rate {
        if !(0.0..=1.0).contains(&rate) {
            return Err(AppError::BadRequest("upsell_rate must be between 0 and 1".into()));
        }
    }
    let conn = state.db.get()?;
    if queries::get_client_by_id(&conn, client_id)?.is_none() {
        return Err(AppError::NotFound(format!("client {}", client_id)));
    }
    if queries::get_user_by_id(&conn, user_id)?.is_none() {
        return Err(AppError::NotFound(format!("user {}", user_id)));
    }
    let override_ = queries::upsert_compensation_override(&conn, client_id, user_id, &input)?;
    tracing::info!(client_id, user_id, "compensation override updated");
    Ok(Json(override_))
}
