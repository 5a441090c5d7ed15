//! commsd - identity and access core for the commcomms platform.
//!
//! Turns an anonymous request into an authenticated, rate-limited,
//! auditable actor: signed token issuance/validation/rotation, per-key
//! token-bucket admission control, invite-gated registration with atomic
//! consumption, and an append-only reputation ledger with anti-gaming
//! guards.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod metrics;
