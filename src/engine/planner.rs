//! Monthly payment planner: composes the calculation rules for a single
//! client into the flat set of payments due for one month. Pure - performs
//! no deduplication against the ledger; that belongs to the trigger paths.

use crate::models::{Client, CompensationConfig, CompensationOverride, PaymentType};

use super::rules;
use super::Month;

/// One candidate payment for a client-month. Amounts are final; the ledger
/// only decides created-vs-skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanItem {
    pub client_id: i64,
    pub user_id: i64,
    pub payment_type: PaymentType,
    pub amount_cents: i64,
    pub notes: String,
}

/// Plan every payment due for `client` in `month`: commission (only when
/// the caller detected a fresh activation), residual to the closing rep,
/// and master fee to the managing master.
pub fn plan_payments_for_client(
    client: &Client,
    rep_config: Option<&CompensationConfig>,
    rep_override: Option<&CompensationOverride>,
    manager_config: Option<&CompensationConfig>,
    month: Month,
    newly_activated: bool,
    owner_ids: &[i64],
) -> Vec<PlanItem> {
    let mut plan = Vec::new();

    if newly_activated {
        if let (Some(rep_id), Some(config)) = (client.sales_rep_id, rep_config) {
            let decision = rules::commission_due(config, rep_override, client);
            if decision.should_pay {
                plan.push(PlanItem {
                    client_id: client.id,
                    user_id: rep_id,
                    payment_type: PaymentType::Commission,
                    amount_cents: decision.amount_cents,
                    notes: decision.reason,
                });
            }
        }
    }

    if let (Some(rep_id), Some(config)) = (client.sales_rep_id, rep_config) {
        let decision = rules::residual_due(config, rep_override, client, month);
        if decision.should_pay {
            plan.push(PlanItem {
                client_id: client.id,
                user_id: rep_id,
                payment_type: PaymentType::Residual,
                amount_cents: decision.amount_cents,
                notes: decision.reason,
            });
        }
    }

    if let (Some(manager_id), Some(config)) = (client.master_manager_id, manager_config) {
        let decision = rules::master_fee_due(config, client, month, manager_id, owner_ids);
        if decision.should_pay {
            plan.push(PlanItem {
                client_id: client.id,
                user_id: manager_id,
                payment_type: PaymentType::MasterFee,
                amount_cents: decision.amount_cents,
                notes: decision.reason,
            });
        }
    }

    plan
}
