//! Session and exchange-facing types.

pub mod exchange;
pub mod session;

pub use exchange::*;
pub use session::*;
