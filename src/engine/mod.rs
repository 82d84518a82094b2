//! Payment generation engine: calendar math, pure decision rules, the
//! per-client planner, and the idempotent ledger writer that all three
//! triggers funnel through.

pub mod ledger;
mod month;
pub mod planner;
pub mod rules;

pub use month::Month;
pub use planner::{plan_payments_for_client, PlanItem};
pub use rules::Decision;
