mod from_row;
pub mod queries;
mod schema;

pub use schema::init_db;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::Config;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// HMAC secret for inbound Wave webhooks.
    pub wave_webhook_secret: Option<String>,
    /// API token for outbound Wave calls.
    pub wave_api_token: Option<String>,
    /// Bearer token protecting the cron endpoints.
    pub cron_secret: Option<String>,
    /// Users who never pay themselves a master fee.
    pub owner_user_ids: Vec<i64>,
    pub upsell_commission_rate: f64,
    pub poll_request_delay_ms: u64,
}

impl AppState {
    pub fn new(db: DbPool, config: &Config) -> Self {
        Self {
            db,
            wave_webhook_secret: config.wave_webhook_secret.clone(),
            wave_api_token: config.wave_api_token.clone(),
            cron_secret: config.cron_secret.clone(),
            owner_user_ids: config.owner_user_ids.clone(),
            upsell_commission_rate: config.upsell_commission_rate,
            poll_request_delay_ms: config.poll_request_delay_ms,
        }
    }
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    Pool::builder().max_size(10).build(manager)
}
