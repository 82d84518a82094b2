use serde::{Deserialize, Serialize};

use crate::engine::Month;

/// A single payable unit in the ledger. At most one non-cancelled row may
/// exist for a given (client_id, user_id, payment_type, month) tuple; the
/// schema enforces this with a partial unique index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub id: String,
    pub client_id: i64,
    pub user_id: i64,
    pub payment_type: PaymentType,
    pub amount_cents: i64,
    /// Always the first day of a calendar month - the coarse-grained
    /// idempotency key.
    pub month: Month,
    pub status: PaymentStatus,
    /// Provenance: which webhook delivery or poll cycle created this row.
    /// Audit only - not part of the uniqueness key.
    pub source_event_id: Option<String>,
    pub notes: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Data required to create a new payment transaction.
#[derive(Debug, Clone)]
pub struct CreatePayment {
    pub client_id: i64,
    pub user_id: i64,
    pub payment_type: PaymentType,
    pub amount_cents: i64,
    pub month: Month,
    pub source_event_id: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    Commission,
    Residual,
    MasterFee,
    UpsellCommission,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Commission => "commission",
            Self::Residual => "residual",
            Self::MasterFee => "master_fee",
            Self::UpsellCommission => "upsell_commission",
        }
    }
}

impl std::str::FromStr for PaymentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "commission" => Ok(Self::Commission),
            "residual" => Ok(Self::Residual),
            "master_fee" => Ok(Self::MasterFee),
            "upsell_commission" => Ok(Self::UpsellCommission),
            other => Err(format!("unknown payment type: {}", other)),
        }
    }
}

impl std::fmt::Display for PaymentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payment lifecycle. The engine creates rows as `pending`; later updates
/// are narrow status transitions (pending -> approved -> paid, or ->
/// cancelled).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Paid,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "paid" => Ok(Self::Paid),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown payment status: {}", other)),
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
