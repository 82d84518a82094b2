//! Ledger idempotency and lifecycle tests: the exactly-once guarantee
//! under redundant triggers, reactivation, churn, and residual locking.

mod common;

use common::*;
use payrun::engine::ledger;

// ============ Exactly-once across redundant triggers ============

#[test]
fn repeated_triggers_create_each_payment_once() {
    let conn = setup_test_db();
    let rep = create_test_user(&conn, "Rep", "rep@test.local");
    let manager = create_test_user(&conn, "Manager", "mgr@test.local");
    create_rep_config(&conn, rep.id);
    create_manager_config(&conn, manager.id);
    let client = create_test_client(&conn, "acme", Some(rep.id), Some(manager.id));

    let jan = Month::new(2025, 1);
    let feb = Month::new(2025, 2);
    let (client, _) = activate_client(&conn, client.id, jan, &[]);

    // Webhook, poll, and monthly cron all fire for February.
    let first = ledger::generate_for_client(&conn, &client, feb, false, &[], Some("evt-1"))
        .expect("first trigger failed");
    let second = ledger::generate_for_client(&conn, &client, feb, false, &[], Some("poll-inv-2025-02"))
        .expect("second trigger failed");
    let third = ledger::generate_for_client(&conn, &client, feb, false, &[], Some("cron-2025-02"))
        .expect("third trigger failed");

    // Residual + master fee, created exactly once.
    assert_eq!(first.created, 2);
    assert_eq!(second.created, 0);
    assert_eq!(second.skipped, 2);
    assert_eq!(third.created, 0);

    let feb_rows: Vec<_> = ledger_rows(&conn, client.id)
        .into_iter()
        .filter(|p| p.month == feb)
        .collect();
    assert_eq!(feb_rows.len(), 2);
    // Provenance points at whichever trigger won.
    assert!(feb_rows.iter().all(|p| p.source_event_id.as_deref() == Some("evt-1")));
}

#[test]
fn duplicate_insert_blocked_until_row_is_cancelled() {
    let conn = setup_test_db();
    let rep = create_test_user(&conn, "Rep", "rep@test.local");
    create_rep_config(&conn, rep.id);
    let client = create_test_client(&conn, "acme", Some(rep.id), None);

    let payment = CreatePayment {
        client_id: client.id,
        user_id: rep.id,
        payment_type: PaymentType::Residual,
        amount_cents: 200_00,
        month: Month::new(2025, 3),
        source_event_id: None,
        notes: None,
    };

    assert!(queries::try_insert_payment(&conn, &payment).unwrap());
    assert!(!queries::try_insert_payment(&conn, &payment).unwrap());

    // Cancelling the row frees the key up again.
    let cancelled = queries::cancel_open_payments_for_client(&conn, client.id).unwrap();
    assert_eq!(cancelled, 1);
    assert!(queries::try_insert_payment(&conn, &payment).unwrap());
}

// ============ Activation and reactivation ============

#[test]
fn activation_pays_commission_and_master_fee_but_no_residual() {
    let conn = setup_test_db();
    let rep = create_test_user(&conn, "Rep", "rep@test.local");
    let manager = create_test_user(&conn, "Manager", "mgr@test.local");
    create_rep_config(&conn, rep.id);
    create_manager_config(&conn, manager.id);
    let client = create_test_client(&conn, "acme", Some(rep.id), Some(manager.id));

    let jan = Month::new(2025, 1);
    let (client, outcome) = activate_client(&conn, client.id, jan, &[]);

    assert_eq!(outcome.created, 2);
    assert_eq!(client.onboarded_month, Some(jan));
    // $2,400 retainer lands in tier 1.
    assert_eq!(client.locked_residual_cents, Some(200_00));

    let rows = ledger_rows(&conn, client.id);
    let types: Vec<_> = rows.iter().map(|p| p.payment_type).collect();
    assert!(types.contains(&PaymentType::Commission));
    assert!(types.contains(&PaymentType::MasterFee));
    assert!(!types.contains(&PaymentType::Residual));
}

#[test]
fn reactivation_never_repays_commission() {
    let conn = setup_test_db();
    let rep = create_test_user(&conn, "Rep", "rep@test.local");
    create_rep_config(&conn, rep.id);
    let client = create_test_client(&conn, "acme", Some(rep.id), None);

    let jan = Month::new(2025, 1);
    activate_client(&conn, client.id, jan, &[]);

    // The commission goes out the door before the client churns.
    let commission = ledger_rows(&conn, client.id)
        .into_iter()
        .find(|p| p.payment_type == PaymentType::Commission)
        .unwrap();
    queries::approve_payment(&conn, &commission.id).unwrap();
    queries::mark_payment_paid(&conn, &commission.id).unwrap();

    ledger::on_client_churned(&conn, client.id, 1_700_000_000, Some("budget cut")).unwrap();

    // Reactivated in June: commission already happened once, residual is
    // due (month 6 since onboarding), onboarded month is unchanged.
    let jun = Month::new(2025, 6);
    let (client, outcome) = activate_client(&conn, client.id, jun, &[]);

    assert_eq!(client.onboarded_month, Some(jan));
    assert_eq!(outcome.created, 1);

    let rows = ledger_rows(&conn, client.id);
    let commissions: Vec<_> = rows
        .iter()
        .filter(|p| p.payment_type == PaymentType::Commission)
        .collect();
    assert_eq!(commissions.len(), 1);
    assert_eq!(commissions[0].month, jan);
    assert!(rows
        .iter()
        .any(|p| p.payment_type == PaymentType::Residual && p.month == jun));
}

#[test]
fn commission_exists_check_spans_all_months() {
    let conn = setup_test_db();
    let rep = create_test_user(&conn, "Rep", "rep@test.local");
    create_rep_config(&conn, rep.id);
    let client = create_test_client(&conn, "acme", Some(rep.id), None);

    activate_client(&conn, client.id, Month::new(2025, 1), &[]);
    assert!(queries::commission_exists(&conn, client.id, rep.id).unwrap());

    // Set it paid (final status); a later activation in a different month
    // must still find it.
    let rows = ledger_rows(&conn, client.id);
    let commission = rows
        .iter()
        .find(|p| p.payment_type == PaymentType::Commission)
        .unwrap();
    queries::approve_payment(&conn, &commission.id).unwrap();
    queries::mark_payment_paid(&conn, &commission.id).unwrap();

    queries::update_client_status(&conn, client.id, ClientStatus::Paused).unwrap();
    let (_, outcome) = activate_client(&conn, client.id, Month::new(2025, 4), &[]);
    let commissions = ledger_rows(&conn, client.id)
        .into_iter()
        .filter(|p| p.payment_type == PaymentType::Commission)
        .count();
    assert_eq!(commissions, 1);
    // Month 4: residual created, commission skipped.
    assert_eq!(outcome.created, 1);
}

// ============ Residual locking ============

#[test]
fn locked_residual_survives_config_changes() {
    let conn = setup_test_db();
    let rep = create_test_user(&conn, "Rep", "rep@test.local");
    create_rep_config(&conn, rep.id);
    let client = create_test_client(&conn, "acme", Some(rep.id), None);

    let (client, _) = activate_client(&conn, client.id, Month::new(2025, 1), &[]);
    assert_eq!(client.locked_residual_cents, Some(200_00));

    // Agency raises the default residual; existing client is insulated.
    queries::upsert_compensation_config(
        &conn,
        rep.id,
        &UpsertCompensationConfig {
            commission_enabled: true,
            commission_cents: 500_00,
            residual_enabled: true,
            residual_cents: 500_00,
            residual_start_month: 2,
            master_fee_enabled: false,
            master_fee_cents: 0,
        },
    )
    .unwrap();

    let feb = Month::new(2025, 2);
    ledger::generate_for_client(&conn, &client, feb, false, &[], None).unwrap();
    let residual = ledger_rows(&conn, client.id)
        .into_iter()
        .find(|p| p.payment_type == PaymentType::Residual && p.month == feb)
        .expect("residual missing");
    assert_eq!(residual.amount_cents, 200_00);
}

#[test]
fn residual_lock_is_write_once() {
    let conn = setup_test_db();
    let rep = create_test_user(&conn, "Rep", "rep@test.local");
    create_rep_config(&conn, rep.id);
    let client = create_test_client(&conn, "acme", Some(rep.id), None);

    assert!(queries::lock_residual_if_unset(&conn, client.id, 250_00).unwrap());
    assert!(!queries::lock_residual_if_unset(&conn, client.id, 999_00).unwrap());
    let client = queries::get_client_by_id(&conn, client.id).unwrap().unwrap();
    assert_eq!(client.locked_residual_cents, Some(250_00));
}

// ============ Churn ============

#[test]
fn churn_cancels_open_payments_and_is_repeat_safe() {
    let conn = setup_test_db();
    let rep = create_test_user(&conn, "Rep", "rep@test.local");
    let manager = create_test_user(&conn, "Manager", "mgr@test.local");
    create_rep_config(&conn, rep.id);
    create_manager_config(&conn, manager.id);
    let client = create_test_client(&conn, "acme", Some(rep.id), Some(manager.id));

    activate_client(&conn, client.id, Month::new(2025, 1), &[]);

    // One payment already went out the door; it stays paid.
    let rows = ledger_rows(&conn, client.id);
    let fee = rows
        .iter()
        .find(|p| p.payment_type == PaymentType::MasterFee)
        .unwrap();
    queries::approve_payment(&conn, &fee.id).unwrap();
    queries::mark_payment_paid(&conn, &fee.id).unwrap();

    let cancelled = ledger::on_client_churned(&conn, client.id, 1_700_000_000, Some("non-payment"))
        .expect("churn failed");
    assert_eq!(cancelled, 1);

    let client = queries::get_client_by_id(&conn, client.id).unwrap().unwrap();
    assert_eq!(client.status, ClientStatus::Churned);
    assert_eq!(client.churn_reason.as_deref(), Some("non-payment"));

    let paid_fee = queries::get_payment_by_id(&conn, &fee.id).unwrap().unwrap();
    assert_eq!(paid_fee.status, PaymentStatus::Paid);

    // Second churn call is a no-op.
    let again = ledger::on_client_churned(&conn, client.id, 1_700_000_100, None).unwrap();
    assert_eq!(again, 0);
}

#[test]
fn churned_client_generates_nothing() {
    let conn = setup_test_db();
    let rep = create_test_user(&conn, "Rep", "rep@test.local");
    create_rep_config(&conn, rep.id);
    let client = create_test_client(&conn, "acme", Some(rep.id), None);

    activate_client(&conn, client.id, Month::new(2025, 1), &[]);
    ledger::on_client_churned(&conn, client.id, 1_700_000_000, None).unwrap();

    let client = queries::get_client_by_id(&conn, client.id).unwrap().unwrap();
    let outcome =
        ledger::generate_for_client(&conn, &client, Month::new(2025, 3), false, &[], None).unwrap();
    assert_eq!(outcome.created, 0);
}

// ============ Owner guard ============

#[test]
fn owner_closed_deal_pays_no_residual() {
    let conn = setup_test_db();
    let manager = create_test_user(&conn, "Manager", "mgr@test.local");
    create_manager_config(&conn, manager.id);
    // Owner closed this deal personally: no sales rep of record.
    let client = create_test_client(&conn, "acme", None, Some(manager.id));

    activate_client(&conn, client.id, Month::new(2025, 1), &[]);
    let client = queries::get_client_by_id(&conn, client.id).unwrap().unwrap();
    ledger::generate_for_client(&conn, &client, Month::new(2025, 5), false, &[], None).unwrap();

    let rows = ledger_rows(&conn, client.id);
    assert!(rows.iter().all(|p| p.payment_type == PaymentType::MasterFee));
}

#[test]
fn owner_manager_collects_no_master_fee() {
    let conn = setup_test_db();
    let rep = create_test_user(&conn, "Rep", "rep@test.local");
    let owner = create_test_user(&conn, "Owner", "owner@test.local");
    create_rep_config(&conn, rep.id);
    create_manager_config(&conn, owner.id);
    let client = create_test_client(&conn, "acme", Some(rep.id), Some(owner.id));

    let (_, outcome) = activate_client(&conn, client.id, Month::new(2025, 1), &[owner.id]);
    // Commission only; the fee stays in the business as profit.
    assert_eq!(outcome.created, 1);
    let rows = ledger_rows(&conn, client.id);
    assert!(rows.iter().all(|p| p.payment_type == PaymentType::Commission));
}

// ============ Upsells ============

#[test]
fn upsell_pays_default_rate_once_per_month() {
    let conn = setup_test_db();
    let rep = create_test_user(&conn, "Rep", "rep@test.local");
    create_rep_config(&conn, rep.id);
    let client = create_test_client(&conn, "acme", Some(rep.id), None);
    let (client, _) = activate_client(&conn, client.id, Month::new(2025, 1), &[]);

    let mar = Month::new(2025, 3);
    let outcome =
        ledger::on_upsell_added(&conn, &client, 1_000_00, mar, 0.10, Some("line-1")).unwrap();
    assert_eq!(outcome.created, 1);

    let upsell = ledger_rows(&conn, client.id)
        .into_iter()
        .find(|p| p.payment_type == PaymentType::UpsellCommission)
        .unwrap();
    assert_eq!(upsell.amount_cents, 100_00);
    assert_eq!(upsell.source_event_id.as_deref(), Some("line-1"));

    // A second line item in the same month hits the uniqueness key.
    let again =
        ledger::on_upsell_added(&conn, &client, 500_00, mar, 0.10, Some("line-2")).unwrap();
    assert_eq!(again.created, 0);
    assert_eq!(again.skipped, 1);
}

#[test]
fn upsell_rate_override_applies() {
    let conn = setup_test_db();
    let rep = create_test_user(&conn, "Rep", "rep@test.local");
    create_rep_config(&conn, rep.id);
    let client = create_test_client(&conn, "acme", Some(rep.id), None);
    let (client, _) = activate_client(&conn, client.id, Month::new(2025, 1), &[]);

    queries::upsert_compensation_override(
        &conn,
        client.id,
        rep.id,
        &UpsertCompensationOverride {
            commission_cents: None,
            residual_cents: None,
            upsell_rate: Some(0.15),
        },
    )
    .unwrap();

    ledger::on_upsell_added(&conn, &client, 1_000_00, Month::new(2025, 4), 0.10, None).unwrap();
    let upsell = ledger_rows(&conn, client.id)
        .into_iter()
        .find(|p| p.payment_type == PaymentType::UpsellCommission)
        .unwrap();
    assert_eq!(upsell.amount_cents, 150_00);
}
