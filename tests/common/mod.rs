//! Test utilities and fixtures for payrun integration tests

#![allow(dead_code)]

use rusqlite::Connection;

pub use payrun::db::{init_db, queries};
pub use payrun::engine::{ledger, plan_payments_for_client, Month};
pub use payrun::models::*;

/// Create an in-memory test database with schema initialized
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

/// Create a test user
pub fn create_test_user(conn: &Connection, name: &str, email: &str) -> User {
    queries::create_user(
        conn,
        &CreateUser {
            name: name.to_string(),
            email: email.to_string(),
        },
    )
    .expect("Failed to create test user")
}

/// Standard sales rep config: $500 commission, $200 residual from month 2
pub fn create_rep_config(conn: &Connection, user_id: i64) -> CompensationConfig {
    queries::upsert_compensation_config(
        conn,
        user_id,
        &UpsertCompensationConfig {
            commission_enabled: true,
            commission_cents: 500_00,
            residual_enabled: true,
            residual_cents: 200_00,
            residual_start_month: 2,
            master_fee_enabled: false,
            master_fee_cents: 0,
        },
    )
    .expect("Failed to create rep config")
}

/// Standard master manager config: $150 monthly fee from month 1
pub fn create_manager_config(conn: &Connection, user_id: i64) -> CompensationConfig {
    queries::upsert_compensation_config(
        conn,
        user_id,
        &UpsertCompensationConfig {
            commission_enabled: false,
            commission_cents: 0,
            residual_enabled: false,
            residual_cents: 0,
            residual_start_month: 2,
            master_fee_enabled: true,
            master_fee_cents: 150_00,
        },
    )
    .expect("Failed to create manager config")
}

/// Create a test client on a $2,400 retainer, assigned to a rep and manager
pub fn create_test_client(
    conn: &Connection,
    name: &str,
    sales_rep_id: Option<i64>,
    master_manager_id: Option<i64>,
) -> Client {
    queries::create_client(
        conn,
        &CreateClient {
            business_name: name.to_string(),
            retainer_cents: 2_400_00,
            closed_in_month: None,
            sales_rep_id,
            master_manager_id,
            wave_customer_id: Some(format!("wave-{}", name)),
        },
    )
    .expect("Failed to create test client")
}

/// Flip a client to active and run the activation trigger for `month`.
/// Returns the refreshed client.
pub fn activate_client(
    conn: &Connection,
    client_id: i64,
    month: Month,
    owner_ids: &[i64],
) -> (Client, ledger::LedgerOutcome) {
    queries::update_client_status(conn, client_id, ClientStatus::Active)
        .expect("Failed to set client active");
    let outcome = ledger::on_client_activated(conn, client_id, month, owner_ids)
        .expect("Activation trigger failed");
    let client = queries::get_client_by_id(conn, client_id)
        .expect("Failed to reload client")
        .expect("Client missing after activation");
    (client, outcome)
}

/// All non-cancelled ledger rows for a client, ordered by month then type
pub fn ledger_rows(conn: &Connection, client_id: i64) -> Vec<PaymentTransaction> {
    queries::list_payments_for_client(conn, client_id)
        .expect("Failed to list payments")
        .into_iter()
        .filter(|p| p.status != PaymentStatus::Cancelled)
        .collect()
}
