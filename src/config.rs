use std::env;

/// Global upsell commission rate when no per-client override exists.
pub const DEFAULT_UPSELL_COMMISSION_RATE: f64 = 0.10;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub base_url: String,
    /// HMAC secret for verifying inbound Wave webhooks.
    pub wave_webhook_secret: Option<String>,
    /// API token for outbound Wave calls (invoice re-fetch in the poll).
    pub wave_api_token: Option<String>,
    /// Bearer token protecting the cron endpoints.
    pub cron_secret: Option<String>,
    /// Users who never pay themselves a master fee (agency owners).
    pub owner_user_ids: Vec<i64>,
    pub upsell_commission_rate: f64,
    /// Delay between provider calls in the reconciliation poll, milliseconds.
    pub poll_request_delay_ms: u64,
    pub dev_mode: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("PAYRUN_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let base_url =
            env::var("BASE_URL").unwrap_or_else(|_| format!("http://{}:{}", host, port));

        let owner_user_ids = env::var("OWNER_USER_IDS")
            .map(|v| {
                v.split(',')
                    .filter_map(|s| s.trim().parse().ok())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "payrun.db".to_string()),
            base_url,
            wave_webhook_secret: env::var("WAVE_WEBHOOK_SECRET").ok(),
            wave_api_token: env::var("WAVE_API_TOKEN").ok(),
            cron_secret: env::var("CRON_SECRET").ok(),
            owner_user_ids,
            upsell_commission_rate: env::var("UPSELL_COMMISSION_RATE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_UPSELL_COMMISSION_RATE),
            poll_request_delay_ms: env::var("POLL_REQUEST_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(250),
            dev_mode,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
