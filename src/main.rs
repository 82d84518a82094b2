use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use payrun::config::Config;
use payrun::db::{create_pool, init_db, queries, AppState};
use payrun::engine::{plan_payments_for_client, Month};
use payrun::handlers;
use payrun::models::{CreateClient, CreateUser, UpsertCompensationConfig};

#[derive(Parser, Debug)]
#[command(name = "payrun")]
#[command(about = "Commission and residual payment engine for agency retainers")]
struct Cli {
    /// Seed the database with dev data (users, configs, a sample client)
    #[arg(long)]
    seed: bool,

    /// Print the payment plan for a month (YYYY-MM) without writing
    /// anything, then exit
    #[arg(long, value_name = "MONTH")]
    dry_run: Option<String>,
}

/// Read-only validation pass: plan every active client for `month` and
/// print what the engine would pay, without touching the ledger.
fn dry_run(state: &AppState, month: Month) {
    let conn = state.db.get().expect("Failed to get db connection");
    let clients = queries::list_active_clients(&conn).expect("Failed to list clients");

    println!("Payment plan for {}", month);
    println!("========================");

    let mut total_cents: i64 = 0;
    for client in &clients {
        let rep_config = client
            .sales_rep_id
            .and_then(|id| queries::get_compensation_config(&conn, id).ok().flatten());
        let rep_override = client.sales_rep_id.and_then(|id| {
            queries::get_compensation_override(&conn, client.id, id)
                .ok()
                .flatten()
        });
        let manager_config = client
            .master_manager_id
            .and_then(|id| queries::get_compensation_config(&conn, id).ok().flatten());

        let plan = plan_payments_for_client(
            client,
            rep_config.as_ref(),
            rep_override.as_ref(),
            manager_config.as_ref(),
            month,
            false,
            &state.owner_user_ids,
        );

        if plan.is_empty() {
            println!("{}: nothing due", client.business_name);
            continue;
        }
        println!("{}:", client.business_name);
        for item in &plan {
            let exists = queries::payment_exists(
                &conn,
                item.client_id,
                item.user_id,
                item.payment_type,
                month,
            )
            .unwrap_or(false);
            println!(
                "  {} -> user {}: ${:.2} ({}){}",
                item.payment_type,
                item.user_id,
                item.amount_cents as f64 / 100.0,
                item.notes,
                if exists { " [already in ledger]" } else { "" }
            );
            if !exists {
                total_cents += item.amount_cents;
            }
        }
    }

    println!("========================");
    println!(
        "{} clients, ${:.2} not yet in ledger",
        clients.len(),
        total_cents as f64 / 100.0
    );
}

/// Seeds the database with dev data: a rep, a master manager, their
/// compensation configs, and one active client.
fn seed_dev_data(state: &AppState) {
    let conn = state.db.get().expect("Failed to get db connection for seeding");

    if queries::list_active_clients(&conn).map(|c| !c.is_empty()).unwrap_or(false) {
        tracing::info!("Database already has data, skipping seed");
        return;
    }

    tracing::info!("Seeding dev data");

    let rep = queries::create_user(
        &conn,
        &CreateUser {
            name: "Dev Sales Rep".to_string(),
            email: "rep@payrun.local".to_string(),
        },
    )
    .expect("Failed to create dev rep");
    let manager = queries::create_user(
        &conn,
        &CreateUser {
            name: "Dev Master Manager".to_string(),
            email: "master@payrun.local".to_string(),
        },
    )
    .expect("Failed to create dev manager");

    queries::upsert_compensation_config(
        &conn,
        rep.id,
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
    .expect("Failed to create rep config");
    queries::upsert_compensation_config(
        &conn,
        manager.id,
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
    .expect("Failed to create manager config");

    let client = queries::create_client(
        &conn,
        &CreateClient {
            business_name: "Dev Plumbing Co".to_string(),
            retainer_cents: 2_400_00,
            closed_in_month: None,
            sales_rep_id: Some(rep.id),
            master_manager_id: Some(manager.id),
            wave_customer_id: Some("dev-wave-customer".to_string()),
        },
    )
    .expect("Failed to create dev client");

    tracing::info!(
        "Seeded: rep {} / manager {} / client {}",
        rep.id,
        manager.id,
        client.id
    );
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "payrun=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }
    if config.wave_webhook_secret.is_none() {
        tracing::warn!("WAVE_WEBHOOK_SECRET not set, webhook signatures will not be verified");
    }
    if config.cron_secret.is_none() {
        tracing::warn!("CRON_SECRET not set, cron endpoints are unauthenticated");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let state = AppState::new(db_pool, &config);

    if let Some(ref month_str) = cli.dry_run {
        let month: Month = month_str.parse().unwrap_or_else(|e| {
            eprintln!("Invalid --dry-run month: {}", e);
            std::process::exit(1);
        });
        dry_run(&state, month);
        return;
    }

    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set PAYRUN_ENV=dev)");
        } else {
            seed_dev_data(&state);
        }
    }

    let app = Router::new()
        .merge(handlers::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("payrun listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to install ctrl-c handler");
            tracing::info!("Shutting down");
        })
        .await
        .expect("Server error");
}
