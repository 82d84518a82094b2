use rusqlite::Connection;

/// Initialize the database schema.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Payees (sales reps and master managers)
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            created_at INTEGER NOT NULL
        );

        -- Paying client accounts
        -- onboarded_month / months are stored as YYYY-MM-01 text
        CREATE TABLE IF NOT EXISTS clients (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            business_name TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'paused'
                CHECK (status IN ('active', 'paused', 'at_risk', 'churned')),
            retainer_cents INTEGER NOT NULL DEFAULT 0,
            onboarded_month TEXT,
            closed_in_month TEXT,
            locked_residual_cents INTEGER,
            sales_rep_id INTEGER REFERENCES users(id),
            master_manager_id INTEGER REFERENCES users(id),
            wave_customer_id TEXT,
            payment_status TEXT,
            last_payment_date INTEGER,
            churned_at INTEGER,
            churn_reason TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_clients_status ON clients(status);
        CREATE INDEX IF NOT EXISTS idx_clients_wave_customer ON clients(wave_customer_id);

        -- Per-user default compensation settings (admin-edited)
        CREATE TABLE IF NOT EXISTS compensation_configs (
            user_id INTEGER PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
            commission_enabled INTEGER NOT NULL DEFAULT 0,
            commission_cents INTEGER NOT NULL DEFAULT 0,
            residual_enabled INTEGER NOT NULL DEFAULT 0,
            residual_cents INTEGER NOT NULL DEFAULT 0,
            residual_start_month INTEGER NOT NULL DEFAULT 2,
            master_fee_enabled INTEGER NOT NULL DEFAULT 0,
            master_fee_cents INTEGER NOT NULL DEFAULT 0,
            updated_at INTEGER NOT NULL
        );

        -- Per-(client, user) override of config fields; NULL falls through
        CREATE TABLE IF NOT EXISTS compensation_overrides (
            id TEXT PRIMARY KEY,
            client_id INTEGER NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            commission_cents INTEGER,
            residual_cents INTEGER,
            upsell_rate REAL,
            created_at INTEGER NOT NULL,
            UNIQUE(client_id, user_id)
        );

        -- The payment ledger. month is always YYYY-MM-01.
        CREATE TABLE IF NOT EXISTS payment_transactions (
            id TEXT PRIMARY KEY,
            client_id INTEGER NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
            user_id INTEGER NOT NULL REFERENCES users(id),
            type TEXT NOT NULL
                CHECK (type IN ('commission', 'residual', 'master_fee', 'upsell_commission')),
            amount_cents INTEGER NOT NULL,
            month TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'approved', 'paid', 'cancelled')),
            source_event_id TEXT,
            notes TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        -- At most one non-cancelled payment per (client, payee, type, month).
        -- This is the engine's correctness guarantee under concurrent
        -- webhook/poll triggers; application-level existence checks are only
        -- an optimization on top of it.
        CREATE UNIQUE INDEX IF NOT EXISTS idx_payments_unique_key
            ON payment_transactions(client_id, user_id, type, month)
            WHERE status != 'cancelled';
        CREATE INDEX IF NOT EXISTS idx_payments_client ON payment_transactions(client_id);
        CREATE INDEX IF NOT EXISTS idx_payments_user_month ON payment_transactions(user_id, month);
        CREATE INDEX IF NOT EXISTS idx_payments_status ON payment_transactions(status);

        -- Locally-mirrored provider invoices for the reconciliation poll
        CREATE TABLE IF NOT EXISTS invoice_records (
            id TEXT PRIMARY KEY,
            client_id INTEGER NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
            wave_invoice_id TEXT NOT NULL UNIQUE,
            status TEXT NOT NULL DEFAULT 'sent'
                CHECK (status IN ('draft', 'sent', 'viewed', 'overdue', 'paid', 'void')),
            amount_cents INTEGER NOT NULL DEFAULT 0,
            paid_cents INTEGER,
            paid_date INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_invoices_status ON invoice_records(status);

        -- Inbound provider events; retried deliveries are recognized here
        CREATE TABLE IF NOT EXISTS webhook_events (
            id TEXT PRIMARY KEY,
            source TEXT NOT NULL,
            external_id TEXT NOT NULL,
            event_type TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'received'
                CHECK (status IN ('received', 'processed', 'failed')),
            raw_payload TEXT,
            error TEXT,
            processed_at INTEGER,
            created_at INTEGER NOT NULL,
            UNIQUE(source, external_id)
        );
        CREATE INDEX IF NOT EXISTS idx_webhook_events_lookup ON webhook_events(source, external_id);
        "#,
    )?;
    Ok(())
}
