//! Authentication module for managing the member session.
//!
//! `Session` persists the backend token to the cache directory so the
//! client stays logged in between runs. Tokens are treated as expired
//! after 12 hours, matching the backend session cookie age.

pub mod session;

pub use session::{Session, SessionData};
