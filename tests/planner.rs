//! End-to-end planner scenarios against real database state.

mod common;

use common::*;

/// The canonical walkthrough: client on a $2,400 retainer, rep on a $200
/// residual from month 2, manager on a $150 fee. Activated January 2025;
/// the February plan is exactly one residual and one master fee.
#[test]
fn february_plan_for_january_activation() {
    let conn = setup_test_db();
    let rep = create_test_user(&conn, "Rep", "rep@test.local");
    let manager = create_test_user(&conn, "Manager", "mgr@test.local");
    let rep_config = create_rep_config(&conn, rep.id);
    let manager_config = create_manager_config(&conn, manager.id);
    let client = create_test_client(&conn, "acme", Some(rep.id), Some(manager.id));

    let (client, _) = activate_client(&conn, client.id, Month::new(2025, 1), &[]);

    let plan = plan_payments_for_client(
        &client,
        Some(&rep_config),
        None,
        Some(&manager_config),
        Month::new(2025, 2),
        false,
        &[],
    );

    assert_eq!(plan.len(), 2);

    let residual = plan
        .iter()
        .find(|p| p.payment_type == PaymentType::Residual)
        .expect("residual missing from plan");
    assert_eq!(residual.user_id, rep.id);
    assert_eq!(residual.amount_cents, 200_00);

    let fee = plan
        .iter()
        .find(|p| p.payment_type == PaymentType::MasterFee)
        .expect("master fee missing from plan");
    assert_eq!(fee.user_id, manager.id);
    assert_eq!(fee.amount_cents, 150_00);
}

#[test]
fn activation_month_plan_has_no_residual() {
    let conn = setup_test_db();
    let rep = create_test_user(&conn, "Rep", "rep@test.local");
    let rep_config = create_rep_config(&conn, rep.id);
    let client = create_test_client(&conn, "acme", Some(rep.id), None);

    let jan = Month::new(2025, 1);
    let (client, _) = activate_client(&conn, client.id, jan, &[]);

    let plan = plan_payments_for_client(&client, Some(&rep_config), None, None, jan, true, &[]);
    assert_eq!(plan.len(), 1);
    assert_eq!(plan[0].payment_type, PaymentType::Commission);
    assert_eq!(plan[0].amount_cents, 500_00);
}

#[test]
fn residual_counts_months_across_year_boundary() {
    let conn = setup_test_db();
    let rep = create_test_user(&conn, "Rep", "rep@test.local");
    let rep_config = create_rep_config(&conn, rep.id);
    let client = create_test_client(&conn, "acme", Some(rep.id), None);

    // Onboarded November 2024; February 2025 is month 4.
    let (client, _) = activate_client(&conn, client.id, Month::new(2024, 11), &[]);
    let plan = plan_payments_for_client(
        &client,
        Some(&rep_config),
        None,
        None,
        Month::new(2025, 2),
        false,
        &[],
    );
    assert_eq!(plan.len(), 1);
    assert_eq!(plan[0].payment_type, PaymentType::Residual);
    assert!(plan[0].notes.contains("month 4"));
}

#[test]
fn field_level_override_changes_residual_only() {
    let conn = setup_test_db();
    let rep = create_test_user(&conn, "Rep", "rep@test.local");
    let rep_config = create_rep_config(&conn, rep.id);
    let client = create_test_client(&conn, "acme", Some(rep.id), None);

    // No residual lock so the override is visible.
    queries::update_client_status(&conn, client.id, ClientStatus::Active).unwrap();
    queries::set_onboarded_month_if_unset(&conn, client.id, Month::new(2025, 1)).unwrap();

    let override_ = queries::upsert_compensation_override(
        &conn,
        client.id,
        rep.id,
        &UpsertCompensationOverride {
            commission_cents: None,
            residual_cents: Some(300_00),
            upsell_rate: None,
        },
    )
    .unwrap();

    let client = queries::get_client_by_id(&conn, client.id).unwrap().unwrap();
    let plan = plan_payments_for_client(
        &client,
        Some(&rep_config),
        Some(&override_),
        None,
        Month::new(2025, 2),
        true,
        &[],
    );

    // Commission falls through to config, residual takes the override.
    let commission = plan
        .iter()
        .find(|p| p.payment_type == PaymentType::Commission)
        .unwrap();
    assert_eq!(commission.amount_cents, 500_00);
    let residual = plan
        .iter()
        .find(|p| p.payment_type == PaymentType::Residual)
        .unwrap();
    assert_eq!(residual.amount_cents, 300_00);
}

#[test]
fn missing_config_means_no_payment() {
    let conn = setup_test_db();
    let rep = create_test_user(&conn, "Rep", "rep@test.local");
    let client = create_test_client(&conn, "acme", Some(rep.id), None);
    let (client, _) = activate_client(&conn, client.id, Month::new(2025, 1), &[]);

    let plan = plan_payments_for_client(&client, None, None, None, Month::new(2025, 2), true, &[]);
    assert!(plan.is_empty());
}
