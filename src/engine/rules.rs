//! Pure payment-decision rules.
//!
//! Every function here answers "is this payee owed money for this client,
//! and how much" with no side effects and no database access. Idempotency
//! is entirely the caller's problem (see `ledger`), which keeps these
//! testable against arbitrary pinned months.

use crate::models::{Client, ClientStatus, CompensationConfig, CompensationOverride};

use super::Month;

/// Outcome of a single payment rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub should_pay: bool,
    pub amount_cents: i64,
    pub reason: String,
}

impl Decision {
    fn pay(amount_cents: i64, reason: impl Into<String>) -> Self {
        Self {
            should_pay: true,
            amount_cents,
            reason: reason.into(),
        }
    }

    fn skip(reason: impl Into<String>) -> Self {
        Self {
            should_pay: false,
            amount_cents: 0,
            reason: reason.into(),
        }
    }
}

/// The "owner guard": a client with no distinct sales rep of record never
/// generates a residual. This covers the agency owner closing their own
/// deal - the owner is not paid a residual on it. Deliberate business rule,
/// kept as a named predicate so it survives refactoring.
pub fn owner_guard(client: &Client) -> bool {
    client.sales_rep_id.is_none()
}

/// One-time commission for the closing rep, due when a client first becomes
/// active. Stateless: the caller detects the activation transition and
/// guards the once-ever idempotency.
pub fn commission_due(
    config: &CompensationConfig,
    override_: Option<&CompensationOverride>,
    client: &Client,
) -> Decision {
    if !config.commission_enabled {
        return Decision::skip("Commission disabled for this user");
    }
    if client.status != ClientStatus::Active {
        return Decision::skip(format!(
            "Client status is {}, not active",
            client.status
        ));
    }

    let amount = override_
        .and_then(|o| o.commission_cents)
        .unwrap_or(config.commission_cents);
    if amount <= 0 {
        return Decision::skip("Commission amount is zero");
    }

    Decision::pay(amount, "One-time commission at client activation")
}

/// Monthly residual for the closing rep. Starts at
/// `config.residual_start_month` (onboarding month counts as month 1, so
/// the default of 2 means no residual in the activation month - that month
/// is covered by commission). Amount precedence: locked amount frozen at
/// close > per-client override > live config.
pub fn residual_due(
    config: &CompensationConfig,
    override_: Option<&CompensationOverride>,
    client: &Client,
    month: Month,
) -> Decision {
    if owner_guard(client) {
        return Decision::skip("No sales rep on record (owner guard)");
    }
    if !config.residual_enabled {
        return Decision::skip("Residual disabled for this user");
    }
    if client.status != ClientStatus::Active {
        return Decision::skip(format!(
            "Client status is {}, not active",
            client.status
        ));
    }
    let onboarded = match client.onboarded_month {
        Some(m) => m,
        None => return Decision::skip("Client onboarded month not set"),
    };

    let months = month.months_since(onboarded);
    if months < config.residual_start_month {
        return Decision::skip(format!(
            "Residual starts at month {}, currently at month {}",
            config.residual_start_month, months
        ));
    }

    let amount = client
        .locked_residual_cents
        .or_else(|| override_.and_then(|o| o.residual_cents))
        .unwrap_or(config.residual_cents);
    if amount <= 0 {
        return Decision::skip("Residual amount is zero");
    }

    Decision::pay(
        amount,
        format!("Residual payment for month {} since onboarding", months),
    )
}

/// Monthly fee for the master manager overseeing the account. Independent
/// of the rep's residual - two separate payees for the same client-month.
/// Owners never pay themselves a master fee (counts as profit instead).
pub fn master_fee_due(
    config: &CompensationConfig,
    client: &Client,
    month: Month,
    manager_id: i64,
    owner_ids: &[i64],
) -> Decision {
    if owner_ids.contains(&manager_id) {
        return Decision::skip("Owner doesn't pay self (counts as profit)");
    }
    if !config.master_fee_enabled {
        return Decision::skip("Master fee disabled for this user");
    }
    if client.status != ClientStatus::Active {
        return Decision::skip(format!(
            "Client status is {}, not active",
            client.status
        ));
    }
    let onboarded = match client.onboarded_month {
        Some(m) => m,
        None => return Decision::skip("Client onboarded month not set"),
    };

    // Master fee starts month 1, immediately at onboarding.
    let months = month.months_since(onboarded);
    if months < 1 {
        return Decision::skip("Master fee starts in month 1");
    }
    if config.master_fee_cents <= 0 {
        return Decision::skip("Master fee amount is zero");
    }

    Decision::pay(
        config.master_fee_cents,
        format!("Master manager fee for month {} since onboarding", months),
    )
}

/// One-time commission on an upsold line item, due only while the client is
/// active. Fires once per line item; the ledger's uniqueness key still caps
/// one non-cancelled upsell row per (client, rep, month).
pub fn evaluate_upsell_commission(
    sales_rep_id: Option<i64>,
    line_amount_cents: i64,
    client_status: ClientStatus,
    rate: f64,
) -> Decision {
    if sales_rep_id.is_none() {
        return Decision::skip("No sales rep assigned to client");
    }
    if client_status != ClientStatus::Active {
        return Decision::skip(format!("Client not active (status: {})", client_status));
    }
    if line_amount_cents <= 0 {
        return Decision::skip("Line item amount is zero");
    }

    let amount = ((line_amount_cents as f64) * rate).round() as i64;
    if amount <= 0 {
        return Decision::skip("Upsell commission rounds to zero");
    }

    Decision::pay(
        amount,
        format!(
            "Upsell commission at {:.0}% of ${:.2}",
            rate * 100.0,
            line_amount_cents as f64 / 100.0
        ),
    )
}

/// Residual tier table applied at close time. The result is frozen on the
/// client as `locked_residual_cents` so later rate changes never touch
/// existing clients.
#[derive(Debug, Clone, Copy)]
pub struct ResidualTierConfig {
    pub tier1_cents: i64,
    pub tier2_cents: i64,
    pub tier3_cents: i64,
    /// Retainer at or above this lands in tier 2.
    pub tier2_threshold_cents: i64,
    /// Retainer at or above this lands in tier 3.
    pub tier3_threshold_cents: i64,
}

impl Default for ResidualTierConfig {
    fn default() -> Self {
        Self {
            tier1_cents: 200_00,
            tier2_cents: 250_00,
            tier3_cents: 300_00,
            tier2_threshold_cents: 3_000_00,
            tier3_threshold_cents: 4_000_00,
        }
    }
}

/// Tiered residual amount for a retainer value at close.
pub fn tiered_residual_for_retainer(retainer_cents: i64, tiers: ResidualTierConfig) -> i64 {
    if retainer_cents >= tiers.tier3_threshold_cents {
        tiers.tier3_cents
    } else if retainer_cents >= tiers.tier2_threshold_cents {
        tiers.tier2_cents
    } else {
        tiers.tier1_cents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(status: ClientStatus, onboarded: Option<Month>) -> Client {
        Client {
            id: 1,
            business_name: "Acme Plumbing".into(),
            status,
            retainer_cents: 2_400_00,
            onboarded_month: onboarded,
            closed_in_month: onboarded,
            locked_residual_cents: None,
            sales_rep_id: Some(5),
            master_manager_id: Some(2),
            wave_customer_id: None,
            payment_status: None,
            last_payment_date: None,
            churned_at: None,
            churn_reason: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn config(user_id: i64) -> CompensationConfig {
        CompensationConfig {
            user_id,
            commission_enabled: true,
            commission_cents: 500_00,
            residual_enabled: true,
            residual_cents: 200_00,
            residual_start_month: 2,
            master_fee_enabled: true,
            master_fee_cents: 150_00,
            updated_at: 0,
        }
    }

    #[test]
    fn residual_skipped_in_activation_month() {
        let jan = Month::new(2025, 1);
        let c = client(ClientStatus::Active, Some(jan));
        let d = residual_due(&config(5), None, &c, jan);
        assert!(!d.should_pay);
    }

    #[test]
    fn residual_due_from_second_month() {
        let c = client(ClientStatus::Active, Some(Month::new(2025, 1)));
        let d = residual_due(&config(5), None, &c, Month::new(2025, 2));
        assert!(d.should_pay);
        assert_eq!(d.amount_cents, 200_00);
    }

    #[test]
    fn locked_amount_beats_override_and_config() {
        let mut c = client(ClientStatus::Active, Some(Month::new(2025, 1)));
        c.locked_residual_cents = Some(250_00);
        let override_ = CompensationOverride {
            id: "o1".into(),
            client_id: 1,
            user_id: 5,
            commission_cents: None,
            residual_cents: Some(175_00),
            upsell_rate: None,
            created_at: 0,
        };
        let d = residual_due(&config(5), Some(&override_), &c, Month::new(2025, 3));
        assert_eq!(d.amount_cents, 250_00);

        c.locked_residual_cents = None;
        let d = residual_due(&config(5), Some(&override_), &c, Month::new(2025, 3));
        assert_eq!(d.amount_cents, 175_00);
    }

    #[test]
    fn owner_guard_suppresses_residual() {
        let mut c = client(ClientStatus::Active, Some(Month::new(2025, 1)));
        c.sales_rep_id = None;
        assert!(owner_guard(&c));
        let d = residual_due(&config(5), None, &c, Month::new(2025, 6));
        assert!(!d.should_pay);
        assert!(d.reason.contains("owner guard"));
    }

    #[test]
    fn master_fee_due_in_first_month_but_not_for_owner() {
        let jan = Month::new(2025, 1);
        let c = client(ClientStatus::Active, Some(jan));
        let d = master_fee_due(&config(2), &c, jan, 2, &[]);
        assert!(d.should_pay);
        assert_eq!(d.amount_cents, 150_00);

        let d = master_fee_due(&config(2), &c, jan, 2, &[1, 2]);
        assert!(!d.should_pay);
    }

    #[test]
    fn commission_skipped_for_inactive_client() {
        let c = client(ClientStatus::Paused, Some(Month::new(2025, 1)));
        assert!(!commission_due(&config(5), None, &c).should_pay);
    }

    #[test]
    fn commission_uses_override_amount() {
        let c = client(ClientStatus::Active, Some(Month::new(2025, 1)));
        let override_ = CompensationOverride {
            id: "o1".into(),
            client_id: 1,
            user_id: 5,
            commission_cents: Some(750_00),
            residual_cents: None,
            upsell_rate: None,
            created_at: 0,
        };
        let d = commission_due(&config(5), Some(&override_), &c);
        assert_eq!(d.amount_cents, 750_00);
    }

    #[test]
    fn upsell_requires_active_client_and_rep() {
        let d = evaluate_upsell_commission(Some(5), 1_000_00, ClientStatus::Active, 0.10);
        assert!(d.should_pay);
        assert_eq!(d.amount_cents, 100_00);

        assert!(!evaluate_upsell_commission(None, 1_000_00, ClientStatus::Active, 0.10).should_pay);
        assert!(
            !evaluate_upsell_commission(Some(5), 1_000_00, ClientStatus::Paused, 0.10).should_pay
        );
        assert!(!evaluate_upsell_commission(Some(5), 0, ClientStatus::Active, 0.10).should_pay);
    }

    #[test]
    fn residual_tiers_follow_retainer_thresholds() {
        let tiers = ResidualTierConfig::default();
        assert_eq!(tiered_residual_for_retainer(2_400_00, tiers), 200_00);
        assert_eq!(tiered_residual_for_retainer(3_000_00, tiers), 250_00);
        assert_eq!(tiered_residual_for_retainer(4_500_00, tiers), 300_00);
    }
}
