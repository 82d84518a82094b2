//! Billing provider integrations.

pub mod wave;
