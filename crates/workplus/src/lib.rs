//! Decision core for the Work+ impact job board.
//!
//! Three trust-sensitive flows live here: offer moderation backed by external
//! evidence, the append-only points ledger with its awards and claims, and
//! subscription checkout with webhook reconciliation. Storage, notification and
//! payment providers are collaborators reached through traits.

pub mod billing;
pub mod config;
pub mod error;
pub mod impact;
pub mod points;
pub mod store;
pub mod telemetry;
pub mod types;
