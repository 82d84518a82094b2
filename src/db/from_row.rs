//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum type, converting parse errors to
/// rusqlite errors instead of panicking on corrupt data.
fn parse_enum<T: std::str::FromStr>(row: &Row, col: usize, col_name: &str) -> rusqlite::Result<T> {
    row.get::<_, String>(col)?.parse::<T>().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const USER_COLS: &str = "id, name, email, created_at";

pub const CLIENT_COLS: &str = "id, business_name, status, retainer_cents, onboarded_month, \
     closed_in_month, locked_residual_cents, sales_rep_id, master_manager_id, \
     wave_customer_id, payment_status, last_payment_date, churned_at, churn_reason, \
     created_at, updated_at";

pub const COMPENSATION_CONFIG_COLS: &str = "user_id, commission_enabled, commission_cents, \
     residual_enabled, residual_cents, residual_start_month, master_fee_enabled, \
     master_fee_cents, updated_at";

pub const COMPENSATION_OVERRIDE_COLS: &str =
    "id, client_id, user_id, commission_cents, residual_cents, upsell_rate, created_at";

pub const PAYMENT_COLS: &str = "id, client_id, user_id, type, amount_cents, month, status, \
     source_event_id, notes, created_at, updated_at";

pub const INVOICE_COLS: &str = "id, client_id, wave_invoice_id, status, amount_cents, \
     paid_cents, paid_date, created_at, updated_at";

pub const WEBHOOK_EVENT_COLS: &str = "id, source, external_id, event_type, status, \
     raw_payload, error, processed_at, created_at";

// ============ FromRow Implementations ============

impl FromRow for User {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            created_at: row.get(3)?,
        })
    }
}

impl FromRow for Client {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Client {
            id: row.get(0)?,
            business_name: row.get(1)?,
            status: parse_enum(row, 2, "status")?,
            retainer_cents: row.get(3)?,
            onboarded_month: row.get(4)?,
            closed_in_month: row.get(5)?,
            locked_residual_cents: row.get(6)?,
            sales_rep_id: row.get(7)?,
            master_manager_id: row.get(8)?,
            wave_customer_id: row.get(9)?,
            payment_status: row.get(10)?,
            last_payment_date: row.get(11)?,
            churned_at: row.get(12)?,
            churn_reason: row.get(13)?,
            created_at: row.get(14)?,
            updated_at: row.get(15)?,
        })
    }
}

impl FromRow for CompensationConfig {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(CompensationConfig {
            user_id: row.get(0)?,
            commission_enabled: row.get(1)?,
            commission_cents: row.get(2)?,
            residual_enabled: row.get(3)?,
            residual_cents: row.get(4)?,
            residual_start_month: row.get(5)?,
            master_fee_enabled: row.get(6)?,
            master_fee_cents: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

impl FromRow for CompensationOverride {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(CompensationOverride {
            id: row.get(0)?,
            client_id: row.get(1)?,
            user_id: row.get(2)?,
            commission_cents: row.get(3)?,
            residual_cents: row.get(4)?,
            upsell_rate: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

impl FromRow for PaymentTransaction {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(PaymentTransaction {
            id: row.get(0)?,
            client_id: row.get(1)?,
            user_id: row.get(2)?,
            payment_type: parse_enum(row, 3, "type")?,
            amount_cents: row.get(4)?,
            month: row.get(5)?,
            status: parse_enum(row, 6, "status")?,
            source_event_id: row.get(7)?,
            notes: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }
}

impl FromRow for InvoiceRecord {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(InvoiceRecord {
            id: row.get(0)?,
            client_id: row.get(1)?,
            wave_invoice_id: row.get(2)?,
            status: parse_enum(row, 3, "status")?,
            amount_cents: row.get(4)?,
            paid_cents: row.get(5)?,
            paid_date: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

impl FromRow for WebhookEvent {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(WebhookEvent {
            id: row.get(0)?,
            source: row.get(1)?,
            external_id: row.get(2)?,
            event_type: row.get(3)?,
            status: parse_enum(row, 4, "status")?,
            raw_payload: row.get(5)?,
            error: row.get(6)?,
            processed_at: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}
