//! LitLayer Keys: delegated trading keys proven with EIP-712 signatures
//!
//! This is the root crate that hosts the cross-crate integration tests.
//! For actual functionality, use the individual crates directly:
//!
//! - `litlayer-core`: Keys, EIP-712 encoding, signing, session records, config
//! - `trading-session`: Session lifecycle and durable session stores
//! - `keygen-cli`: The `litlayer-keygen` command-line tool

pub use litlayer_core as core;
pub use trading_session as session;
