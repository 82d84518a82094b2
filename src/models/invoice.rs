use serde::{Deserialize, Serialize};

/// Locally-mirrored provider invoice. The reconciliation poll re-fetches
/// every non-terminal invoice from the provider each cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub id: String,
    pub client_id: i64,
    pub wave_invoice_id: String,
    pub status: InvoiceStatus,
    pub amount_cents: i64,
    pub paid_cents: Option<i64>,
    pub paid_date: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Viewed,
    Overdue,
    Paid,
    Void,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Viewed => "viewed",
            Self::Overdue => "overdue",
            Self::Paid => "paid",
            Self::Void => "void",
        }
    }

    /// Terminal statuses can no longer flip to paid and are skipped by the
    /// reconciliation poll.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid | Self::Void)
    }
}

impl std::str::FromStr for InvoiceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "sent" => Ok(Self::Sent),
            "viewed" => Ok(Self::Viewed),
            "overdue" => Ok(Self::Overdue),
            "paid" => Ok(Self::Paid),
            "void" => Ok(Self::Void),
            other => Err(format!("unknown invoice status: {}", other)),
        }
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
