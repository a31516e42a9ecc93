//! Outreach Wave - a campaign coordinator for multi-wave trial outreach.
//!
//! This library provides the intervention ledger, allocation import,
//! artifact generation, dispatch, and receipt reconciliation logic.

pub mod allocation;
pub mod artifacts;
pub mod config;
pub mod dispatch;
pub mod receipts;
pub mod report;
pub mod server;
pub mod store;
pub mod tracker;
pub mod types;
