//! Idempotent ledger writer.
//!
//! All three triggers (payment webhook, hourly invoice poll, synchronous
//! activation handler) end up here. The planner decides WHAT is due; this
//! module guarantees each due payment is created at most once, no matter
//! how many triggers fire for the same client-month. The real guard is the
//! partial unique index behind `try_insert_payment` - the existence checks
//! are just cheaper fast paths.

use rusqlite::Connection;

use crate::db::queries;
use crate::error::Result;
use crate::models::{Client, ClientStatus, CreatePayment, PaymentType};

use super::planner::{plan_payments_for_client, PlanItem};
use super::rules;
use super::Month;

/// Per-invocation tally. `skipped` counts plan items that already had a
/// non-cancelled row for their key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerOutcome {
    pub created: usize,
    pub skipped: usize,
}

/// Write a planned set of payments, skipping keys that already exist.
///
/// A failure on one row is logged and counted as skipped rather than
/// aborting the batch - a poll cycle covering forty clients must not lose
/// thirty-nine payments to one bad row.
pub fn record_plan(
    conn: &Connection,
    plan: &[PlanItem],
    month: Month,
    source_event_id: Option<&str>,
) -> LedgerOutcome {
    let mut outcome = LedgerOutcome::default();

    for item in plan {
        // Commission is once-ever per (client, rep): a reactivated client
        // must not re-pay it in a new month.
        if item.payment_type == PaymentType::Commission {
            match queries::commission_exists(conn, item.client_id, item.user_id) {
                Ok(true) => {
                    outcome.skipped += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(
                        client_id = item.client_id,
                        user_id = item.user_id,
                        "commission existence check failed: {}",
                        e
                    );
                    outcome.skipped += 1;
                    continue;
                }
            }
        }

        let create = CreatePayment {
            client_id: item.client_id,
            user_id: item.user_id,
            payment_type: item.payment_type,
            amount_cents: item.amount_cents,
            month,
            source_event_id: source_event_id.map(str::to_string),
            notes: Some(item.notes.clone()),
        };
        match queries::try_insert_payment(conn, &create) {
            Ok(true) => {
                tracing::info!(
                    client_id = item.client_id,
                    user_id = item.user_id,
                    payment_type = %item.payment_type,
                    amount_cents = item.amount_cents,
                    month = %month,
                    "payment created"
                );
                outcome.created += 1;
            }
            Ok(false) => {
                tracing::debug!(
                    client_id = item.client_id,
                    user_id = item.user_id,
                    payment_type = %item.payment_type,
                    month = %month,
                    "payment already exists, skipped"
                );
                outcome.skipped += 1;
            }
            Err(e) => {
                tracing::error!(
                    client_id = item.client_id,
                    user_id = item.user_id,
                    payment_type = %item.payment_type,
                    "payment insert failed: {}",
                    e
                );
                outcome.skipped += 1;
            }
        }
    }

    outcome
}

/// Plan and record everything due for one client in one month. Loads the
/// rep and manager configs, runs the planner, writes through `record_plan`.
pub fn generate_for_client(
    conn: &Connection,
    client: &Client,
    month: Month,
    newly_activated: bool,
    owner_ids: &[i64],
    source_event_id: Option<&str>,
) -> Result<LedgerOutcome> {
    let rep_config = match client.sales_rep_id {
        Some(rep_id) => queries::get_compensation_config(conn, rep_id)?,
        None => None,
    };
    let rep_override = match client.sales_rep_id {
        Some(rep_id) => queries::get_compensation_override(conn, client.id, rep_id)?,
        None => None,
    };
    let manager_config = match client.master_manager_id {
        Some(manager_id) => queries::get_compensation_config(conn, manager_id)?,
        None => None,
    };

    let plan = plan_payments_for_client(
        client,
        rep_config.as_ref(),
        rep_override.as_ref(),
        manager_config.as_ref(),
        month,
        newly_activated,
        owner_ids,
    );

    // A client that predates activation-time locking gets its residual
    // frozen the first time one is paid out.
    if client.locked_residual_cents.is_none() {
        if let Some(residual) = plan
            .iter()
            .find(|item| item.payment_type == PaymentType::Residual)
        {
            queries::lock_residual_if_unset(conn, client.id, residual.amount_cents)?;
        }
    }

    Ok(record_plan(conn, &plan, month, source_event_id))
}

/// Synchronous activation trigger. Stamps the onboarded month (first
/// activation only), freezes the residual tier for the retainer at close,
/// then generates the activation-month payments.
///
/// Failures in payment generation are logged, never propagated - the
/// status change that triggered this must not be rolled back by a
/// compensation hiccup. The other two triggers will catch up.
pub fn on_client_activated(
    conn: &Connection,
    client_id: i64,
    month: Month,
    owner_ids: &[i64],
) -> Result<LedgerOutcome> {
    queries::set_onboarded_month_if_unset(conn, client_id, month)?;

    let client = queries::get_client_by_id(conn, client_id)?
        .ok_or_else(|| crate::error::AppError::NotFound(format!("client {}", client_id)))?;

    if client.locked_residual_cents.is_none() {
        let locked = rules::tiered_residual_for_retainer(
            client.retainer_cents,
            rules::ResidualTierConfig::default(),
        );
        queries::lock_residual_if_unset(conn, client_id, locked)?;
    }

    let client = queries::get_client_by_id(conn, client_id)?
        .ok_or_else(|| crate::error::AppError::NotFound(format!("client {}", client_id)))?;

    match generate_for_client(conn, &client, month, true, owner_ids, None) {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            tracing::error!(client_id, "activation payment generation failed: {}", e);
            Ok(LedgerOutcome::default())
        }
    }
}

/// Churn trigger: stamp the churn fields and cancel every open payment.
/// Safe to repeat - cancelling already-cancelled rows affects nothing.
pub fn on_client_churned(
    conn: &Connection,
    client_id: i64,
    churned_at: i64,
    reason: Option<&str>,
) -> Result<usize> {
    queries::mark_client_churned(conn, client_id, churned_at, reason)?;
    let cancelled = queries::cancel_open_payments_for_client(conn, client_id)?;
    tracing::info!(client_id, cancelled, "client churned, open payments cancelled");
    Ok(cancelled)
}

/// Upsell trigger: one-time commission at `rate` on a new recurring line
/// item. Subject to the same one-row-per-key cap as every other payment.
pub fn on_upsell_added(
    conn: &Connection,
    client: &Client,
    line_amount_cents: i64,
    month: Month,
    default_rate: f64,
    source_event_id: Option<&str>,
) -> Result<LedgerOutcome> {
    let rate = match client.sales_rep_id {
        Some(rep_id) => queries::get_compensation_override(conn, client.id, rep_id)?
            .and_then(|o| o.upsell_rate)
            .unwrap_or(default_rate),
        None => default_rate,
    };

    let decision =
        rules::evaluate_upsell_commission(client.sales_rep_id, line_amount_cents, client.status, rate);
    if !decision.should_pay {
        tracing::debug!(client_id = client.id, "upsell commission skipped: {}", decision.reason);
        return Ok(LedgerOutcome { created: 0, skipped: 1 });
    }

    let plan = [PlanItem {
        client_id: client.id,
        user_id: client.sales_rep_id.unwrap_or_default(),
        payment_type: PaymentType::UpsellCommission,
        amount_cents: decision.amount_cents,
        notes: decision.reason,
    }];
    Ok(record_plan(conn, &plan, month, source_event_id))
}

/// Async trigger path shared by the webhook and the poll: a confirmed
/// invoice payment for a client generates that client's payments for the
/// month the payment landed in.
pub fn on_invoice_paid(
    conn: &Connection,
    client: &Client,
    paid_at: i64,
    owner_ids: &[i64],
    source_event_id: &str,
) -> Result<LedgerOutcome> {
    if client.status != ClientStatus::Active {
        tracing::debug!(
            client_id = client.id,
            status = %client.status,
            "invoice paid for non-active client, no payments generated"
        );
        return Ok(LedgerOutcome::default());
    }

    queries::mark_client_payment_current(conn, client.id, paid_at)?;

    let month = Month::of_timestamp(paid_at);
    generate_for_client(conn, client, month, false, owner_ids, Some(source_event_id))
}
