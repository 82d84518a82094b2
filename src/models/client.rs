use serde::{Deserialize, Serialize};

use crate::engine::Month;

/// A paying agency client (retainer account).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: i64,
    pub business_name: String,
    pub status: ClientStatus,
    /// Current monthly retainer, in cents.
    pub retainer_cents: i64,
    /// First month counted for residual eligibility. Set once at activation,
    /// immutable thereafter (survives churn + reactivation unless NULL).
    pub onboarded_month: Option<Month>,
    /// Month the deal was won.
    pub closed_in_month: Option<Month>,
    /// Residual amount frozen when the client went active. Insulates
    /// existing clients from later changes to residual rates.
    pub locked_residual_cents: Option<i64>,
    pub sales_rep_id: Option<i64>,
    pub master_manager_id: Option<i64>,
    /// Customer id on the billing provider, used to resolve webhook events.
    pub wave_customer_id: Option<String>,
    pub payment_status: Option<String>,
    pub last_payment_date: Option<i64>,
    pub churned_at: Option<i64>,
    pub churn_reason: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Data required to create a new client.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateClient {
    pub business_name: String,
    pub retainer_cents: i64,
    pub closed_in_month: Option<Month>,
    pub sales_rep_id: Option<i64>,
    pub master_manager_id: Option<i64>,
    pub wave_customer_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    Active,
    Paused,
    AtRisk,
    Churned,
}

impl ClientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::AtRisk => "at_risk",
            Self::Churned => "churned",
        }
    }
}

impl std::str::FromStr for ClientStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "at_risk" => Ok(Self::AtRisk),
            "churned" => Ok(Self::Churned),
            other => Err(format!("unknown client status: {}", other)),
        }
    }
}

impl std::fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
