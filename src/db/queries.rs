use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::engine::Month;
use crate::error::Result;
use crate::models::*;

use super::from_row::{
    query_all, query_one, CLIENT_COLS, COMPENSATION_CONFIG_COLS, COMPENSATION_OVERRIDE_COLS,
    INVOICE_COLS, PAYMENT_COLS, USER_COLS, WEBHOOK_EVENT_COLS,
};

fn now() -> i64 {
    Utc::now().timestamp()
}

fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

// ============ Users ============

pub fn create_user(conn: &Connection, input: &CreateUser) -> Result<User> {
    conn.execute(
        "INSERT INTO users (name, email, created_at) VALUES (?1, ?2, ?3)",
        params![input.name, input.email, now()],
    )?;
    let id = conn.last_insert_rowid();
    get_user_by_id(conn, id)?.ok_or_else(|| {
        crate::error::AppError::Internal(format!("user {} vanished after insert", id))
    })
}

pub fn get_user_by_id(conn: &Connection, id: i64) -> Result<Option<User>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLS),
        &[&id],
    )
}

// ============ Clients ============

pub fn create_client(conn: &Connection, input: &CreateClient) -> Result<Client> {
    let ts = now();
    conn.execute(
        "INSERT INTO clients (business_name, retainer_cents, closed_in_month, sales_rep_id, \
         master_manager_id, wave_customer_id, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![
            input.business_name,
            input.retainer_cents,
            input.closed_in_month,
            input.sales_rep_id,
            input.master_manager_id,
            input.wave_customer_id,
            ts
        ],
    )?;
    let id = conn.last_insert_rowid();
    get_client_by_id(conn, id)?.ok_or_else(|| {
        crate::error::AppError::Internal(format!("client {} vanished after insert", id))
    })
}

pub fn get_client_by_id(conn: &Connection, id: i64) -> Result<Option<Client>> {
    query_one(
        conn,
        &format!("SELECT {} FROM clients WHERE id = ?1", CLIENT_COLS),
        &[&id],
    )
}

pub fn get_client_by_wave_customer_id(
    conn: &Connection,
    wave_customer_id: &str,
) -> Result<Option<Client>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM clients WHERE wave_customer_id = ?1",
            CLIENT_COLS
        ),
        &[&wave_customer_id],
    )
}

pub fn list_active_clients(conn: &Connection) -> Result<Vec<Client>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM clients WHERE status = 'active' ORDER BY id",
            CLIENT_COLS
        ),
        &[],
    )
}

pub fn update_client_status(conn: &Connection, id: i64, status: ClientStatus) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE clients SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now(), id],
    )?;
    Ok(affected > 0)
}

/// Set the onboarded month, only if it was never set. Onboarded month is
/// immutable once written - reactivation does not reset it.
pub fn set_onboarded_month_if_unset(conn: &Connection, id: i64, month: Month) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE clients SET onboarded_month = ?1, updated_at = ?2 \
         WHERE id = ?3 AND onboarded_month IS NULL",
        params![month, now(), id],
    )?;
    Ok(affected > 0)
}

/// Freeze the residual lock, only if no lock exists yet. Later residual
/// rate changes never touch a locked client.
pub fn lock_residual_if_unset(conn: &Connection, id: i64, amount_cents: i64) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE clients SET locked_residual_cents = ?1, updated_at = ?2 \
         WHERE id = ?3 AND locked_residual_cents IS NULL",
        params![amount_cents, now(), id],
    )?;
    Ok(affected > 0)
}

pub fn mark_client_churned(
    conn: &Connection,
    id: i64,
    churned_at: i64,
    reason: Option<&str>,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE clients SET status = 'churned', churned_at = ?1, churn_reason = ?2, \
         updated_at = ?3 WHERE id = ?4",
        params![churned_at, reason, now(), id],
    )?;
    Ok(affected > 0)
}

pub fn mark_client_payment_current(conn: &Connection, id: i64, paid_at: i64) -> Result<()> {
    conn.execute(
        "UPDATE clients SET payment_status = 'current', last_payment_date = ?1, \
         updated_at = ?2 WHERE id = ?3",
        params![paid_at, now(), id],
    )?;
    Ok(())
}

// ============ Compensation ============

pub fn upsert_compensation_config(
    conn: &Connection,
    user_id: i64,
    input: &UpsertCompensationConfig,
) -> Result<CompensationConfig> {
    conn.execute(
        "INSERT INTO compensation_configs (user_id, commission_enabled, commission_cents, \
         residual_enabled, residual_cents, residual_start_month, master_fee_enabled, \
         master_fee_cents, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
         ON CONFLICT(user_id) DO UPDATE SET \
           commission_enabled = excluded.commission_enabled, \
           commission_cents = excluded.commission_cents, \
           residual_enabled = excluded.residual_enabled, \
           residual_cents = excluded.residual_cents, \
           residual_start_month = excluded.residual_start_month, \
           master_fee_enabled = excluded.master_fee_enabled, \
           master_fee_cents = excluded.master_fee_cents, \
           updated_at = excluded.updated_at",
        params![
            user_id,
            input.commission_enabled,
            input.commission_cents,
            input.residual_enabled,
            input.residual_cents,
            input.residual_start_month,
            input.master_fee_enabled,
            input.master_fee_cents,
            now()
        ],
    )?;
    get_compensation_config(conn, user_id)?.ok_or_else(|| {
        crate::error::AppError::Internal(format!("config for user {} vanished after upsert", user_id))
    })
}

pub fn get_compensation_config(conn: &Connection, user_id: i64) -> Result<Option<CompensationConfig>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM compensation_configs WHERE user_id = ?1",
            COMPENSATION_CONFIG_COLS
        ),
        &[&user_id],
    )
}

pub fn upsert_compensation_override(
    conn: &Connection,
    client_id: i64,
    user_id: i64,
    input: &UpsertCompensationOverride,
) -> Result<CompensationOverride> {
    conn.execute(
        "INSERT INTO compensation_overrides (id, client_id, user_id, commission_cents, \
         residual_cents, upsell_rate, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
         ON CONFLICT(client_id, user_id) DO UPDATE SET \
           commission_cents = excluded.commission_cents, \
           residual_cents = excluded.residual_cents, \
           upsell_rate = excluded.upsell_rate",
        params![
            gen_id(),
            client_id,
            user_id,
            input.commission_cents,
            input.residual_cents,
            input.upsell_rate,
            now()
        ],
    )?;
    get_compensation_override(conn, client_id, user_id)?.ok_or_else(|| {
        crate::error::AppError::Internal("override vanished after upsert".to_string())
    })
}

pub fn get_compensation_override(
    conn: &Connection,
    client_id: i64,
    user_id: i64,
) -> Result<Option<CompensationOverride>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM compensation_overrides WHERE client_id = ?1 AND user_id = ?2",
            COMPENSATION_OVERRIDE_COLS
        ),
        &[&client_id, &user_id],
    )
}

// ============ Payment Ledger ============

/// Atomically create a payment transaction, returning true if a row was
/// created. INSERT OR IGNORE against the partial unique index on
/// (client_id, user_id, type, month) makes concurrent duplicate attempts
/// collapse to a single row instead of double-paying.
pub fn try_insert_payment(conn: &Connection, input: &CreatePayment) -> Result<bool> {
    let ts = now();
    let affected = conn.execute(
        "INSERT OR IGNORE INTO payment_transactions \
         (id, client_id, user_id, type, amount_cents, month, status, source_event_id, \
          notes, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', ?7, ?8, ?9, ?9)",
        params![
            gen_id(),
            input.client_id,
            input.user_id,
            input.payment_type.as_str(),
            input.amount_cents,
            input.month,
            input.source_event_id,
            input.notes,
            ts
        ],
    )?;
    Ok(affected > 0)
}

/// Non-cancelled payment exists for the full idempotency key.
pub fn payment_exists(
    conn: &Connection,
    client_id: i64,
    user_id: i64,
    payment_type: PaymentType,
    month: Month,
) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM payment_transactions WHERE client_id = ?1 AND user_id = ?2 \
             AND type = ?3 AND month = ?4 AND status != 'cancelled' LIMIT 1",
            params![client_id, user_id, payment_type.as_str(), month],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Commission is a once-ever event per (client, rep) - any non-cancelled
/// commission row counts, regardless of month.
pub fn commission_exists(conn: &Connection, client_id: i64, user_id: i64) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM payment_transactions WHERE client_id = ?1 AND user_id = ?2 \
             AND type = 'commission' AND status != 'cancelled' LIMIT 1",
            params![client_id, user_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn get_payment_by_id(conn: &Connection, id: &str) -> Result<Option<PaymentTransaction>> {
    query_one(
        conn,
        &format!("SELECT {} FROM payment_transactions WHERE id = ?1", PAYMENT_COLS),
        &[&id],
    )
}

pub fn list_payments_for_client(conn: &Connection, client_id: i64) -> Result<Vec<PaymentTransaction>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM payment_transactions WHERE client_id = ?1 ORDER BY month, type",
            PAYMENT_COLS
        ),
        &[&client_id],
    )
}

pub fn list_pending_payments(conn: &Connection) -> Result<Vec<PaymentTransaction>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM payment_transactions WHERE status = 'pending' \
             ORDER BY month, client_id",
            PAYMENT_COLS
        ),
        &[],
    )
}

pub fn list_user_earnings(conn: &Connection, user_id: i64) -> Result<Vec<PaymentTransaction>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM payment_transactions WHERE user_id = ?1 \
             AND status != 'cancelled' ORDER BY month DESC",
            PAYMENT_COLS
        ),
        &[&user_id],
    )
}

/// Narrow status transition: pending -> approved.
pub fn approve_payment(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE payment_transactions SET status = 'approved', updated_at = ?1 \
         WHERE id = ?2 AND status = 'pending'",
        params![now(), id],
    )?;
    Ok(affected > 0)
}

/// Narrow status transition: approved -> paid.
pub fn mark_payment_paid(conn: &Connection, id: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE payment_transactions SET status = 'paid', updated_at = ?1 \
         WHERE id = ?2 AND status = 'approved'",
        params![now(), id],
    )?;
    Ok(affected > 0)
}

/// Cancel every non-final payment for a client (churn handling). Cancelling
/// an already-cancelled row is harmless; this is not idempotency-guarded.
pub fn cancel_open_payments_for_client(conn: &Connection, client_id: i64) -> Result<usize> {
    let affected = conn.execute(
        "UPDATE payment_transactions SET status = 'cancelled', updated_at = ?1 \
         WHERE client_id = ?2 AND status IN ('pending', 'approved')",
        params![now(), client_id],
    )?;
    Ok(affected)
}

// ============ Invoice Records ============

pub fn create_invoice_record(
    conn: &Connection,
    client_id: i64,
    wave_invoice_id: &str,
    status: InvoiceStatus,
    amount_cents: i64,
) -> Result<InvoiceRecord> {
    let ts = now();
    let id = gen_id();
    conn.execute(
        "INSERT INTO invoice_records (id, client_id, wave_invoice_id, status, amount_cents, \
         created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![id, client_id, wave_invoice_id, status.as_str(), amount_cents, ts],
    )?;
    get_invoice_by_id(conn, &id)?.ok_or_else(|| {
        crate::error::AppError::Internal("invoice vanished after insert".to_string())
    })
}

pub fn get_invoice_by_id(conn: &Connection, id: &str) -> Result<Option<InvoiceRecord>> {
    query_one(
        conn,
        &format!("SELECT {} FROM invoice_records WHERE id = ?1", INVOICE_COLS),
        &[&id],
    )
}

/// Invoices that could still flip to paid.
pub fn list_open_invoices(conn: &Connection) -> Result<Vec<InvoiceRecord>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM invoice_records WHERE status IN ('sent', 'viewed', 'overdue') \
             ORDER BY created_at",
            INVOICE_COLS
        ),
        &[],
    )
}

pub fn update_invoice_status(
    conn: &Connection,
    id: &str,
    status: InvoiceStatus,
    paid_cents: Option<i64>,
    paid_date: Option<i64>,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE invoice_records SET status = ?1, \
         paid_cents = COALESCE(?2, paid_cents), paid_date = COALESCE(?3, paid_date), \
         updated_at = ?4 WHERE id = ?5",
        params![status.as_str(), paid_cents, paid_date, now(), id],
    )?;
    Ok(affected > 0)
}

// ============ Webhook Events ============

pub fn get_webhook_event(
    conn: &Connection,
    source: &str,
    external_id: &str,
) -> Result<Option<WebhookEvent>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM webhook_events WHERE source = ?1 AND external_id = ?2",
            WEBHOOK_EVENT_COLS
        ),
        &[&source, &external_id],
    )
}

/// Record an inbound event as `received`, or reset a previously failed one
/// for reprocessing. Keyed by UNIQUE(source, external_id).
pub fn upsert_webhook_event(
    conn: &Connection,
    source: &str,
    external_id: &str,
    event_type: &str,
    raw_payload: &str,
) -> Result<WebhookEvent> {
    conn.execute(
        "INSERT INTO webhook_events (id, source, external_id, event_type, status, \
         raw_payload, created_at) VALUES (?1, ?2, ?3, ?4, 'received', ?5, ?6) \
         ON CONFLICT(source, external_id) DO UPDATE SET status = 'received', error = NULL",
        params![gen_id(), source, external_id, event_type, raw_payload, now()],
    )?;
    get_webhook_event(conn, source, external_id)?.ok_or_else(|| {
        crate::error::AppError::Internal("webhook event vanished after upsert".to_string())
    })
}

pub fn mark_webhook_event_processed(conn: &Connection, id: &str) -> Result<()> {
    conn.execute(
        "UPDATE webhook_events SET status = 'processed', processed_at = ?1 WHERE id = ?2",
        params![now(), id],
    )?;
    Ok(())
}

pub fn mark_webhook_event_failed(conn: &Connection, id: &str, error: &str) -> Result<()> {
    conn.execute(
        "UPDATE webhook_events SET status = 'failed', error = ?1 WHERE id = ?2",
        params![error, id],
    )?;
    Ok(())
}
