//! LitLayer Core Library
//!
//! EIP-712 typed data encoding, trading keys, signatures and the session
//! types shared by the LitLayer trading key system.

pub mod config;
pub mod error;
pub mod signing;
pub mod types;

pub use error::{Error, Result};
