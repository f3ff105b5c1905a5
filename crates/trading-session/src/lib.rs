//! Trading session lifecycle for LitLayer agents.
//!
//! A session is created in one synchronous step (generate key, build the
//! agent message, sign, self-verify) and persisted separately through a
//! [`SessionStore`].

pub mod file_store;
pub mod lifecycle;
pub mod manager;
pub mod store;

pub use file_store::FileSessionStore;
pub use lifecycle::{
    create_signed_session, generate_session_id, NewSession, PreparedSession, SessionState,
    SignedSession,
};
pub use manager::{parse_address, unix_now, SessionManager};
pub use store::{normalize_session_id, wallet_key, MemorySessionStore, SessionStore};
