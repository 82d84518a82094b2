//! Payrun - commission and residual payment generation for agency retainers
//!
//! This library provides the core payment engine: pure calculation rules,
//! the monthly payment planner, the idempotent transaction ledger, and the
//! trigger adapters (activation handler, provider webhook, reconciliation
//! poll) that feed it.

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod models;
pub mod providers;
