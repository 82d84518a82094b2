pub mod clients;
pub mod compensation;
pub mod cron;
pub mod payments;
pub mod webhooks;

use axum::{
    routing::{get, patch, post, put},
    Router,
};

use crate::db::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        // Inbound provider events
        .route("/webhooks/wave", post(webhooks::handle_wave_webhook))
        // Scheduled triggers
        .route("/cron/invoice-status-poll", get(cron::invoice_status_poll))
        .route("/cron/generate-payments", get(cron::generate_payments))
        // Users and compensation
        .route("/users", post(compensation::create_user))
        .route(
            "/users/{id}/compensation",
            get(compensation::get_compensation).put(compensation::upsert_compensation),
        )
        .route("/users/{id}/earnings", get(payments::user_earnings))
        // Clients
        .route("/clients", post(clients::create_client))
        .route("/clients/{id}", get(clients::get_client))
        .route("/clients/{id}/status", patch(clients::update_client_status))
        .route("/clients/{id}/payments", get(clients::list_client_payments))
        .route("/clients/{id}/upsells", post(clients::add_upsell))
        .route("/clients/{id}/invoices", post(clients::register_invoice))
        .route(
            "/clients/{client_id}/compensation/{user_id}",
            put(compensation::upsert_override),
        )
        // Payment ledger
        .route("/payments/pending", get(payments::list_pending))
        .route("/payments/{id}/approve", post(payments::approve))
        .route("/payments/{id}/mark-paid", post(payments::mark_paid))
}
