use serde::{Deserialize, Serialize};

/// Per-user default compensation settings. Admin-edited, read-only to the
/// engine within a calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompensationConfig {
    pub user_id: i64,
    pub commission_enabled: bool,
    pub commission_cents: i64,
    pub residual_enabled: bool,
    pub residual_cents: i64,
    /// First month a residual is due, counting the onboarding month as
    /// month 1. Default 2: no residual in the activation month.
    pub residual_start_month: i64,
    pub master_fee_enabled: bool,
    pub master_fee_cents: i64,
    pub updated_at: i64,
}

/// Input for creating or replacing a user's compensation config.
#[derive(Debug, Clone, Deserialize)]
pub struct UpsertCompensationConfig {
    pub commission_enabled: bool,
    pub commission_cents: i64,
    pub residual_enabled: bool,
    pub residual_cents: i64,
    #[serde(default = "default_residual_start_month")]
    pub residual_start_month: i64,
    pub master_fee_enabled: bool,
    pub master_fee_cents: i64,
}

fn default_residual_start_month() -> i64 {
    2
}

/// Optional per-(client, user) replacement of config fields, e.g. a
/// negotiated split. Field-level: a NULL field falls through to the user's
/// default config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompensationOverride {
    pub id: String,
    pub client_id: i64,
    pub user_id: i64,
    pub commission_cents: Option<i64>,
    pub residual_cents: Option<i64>,
    pub upsell_rate: Option<f64>,
    pub created_at: i64,
}

/// Input for creating or replacing a per-client override.
#[derive(Debug, Clone, Deserialize)]
pub struct UpsertCompensationOverride {
    pub commission_cents: Option<i64>,
    pub residual_cents: Option<i64>,
    pub upsell_rate: Option<f64>,
}
