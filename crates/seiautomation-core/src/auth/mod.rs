//! Authentication module for managing user sessions and credentials.
//!
//! This module provides:
//! - `SessionManager`: login, profile validation, and logout, with state
//!   changes published to subscribers
//! - `TokenStore`: persistence for the session token (OS keychain, cache
//!   file, or memory)
//!
//! Tokens carry no expiry on the client side. A token is valid for exactly
//! as long as `/auth/me` keeps accepting it.

pub mod credentials;
pub mod session;

pub use credentials::{
    open_token_store, FallbackTokenStore, FileTokenStore, KeyringTokenStore, MemoryTokenStore,
    TokenStore, STORAGE_KEY,
};
pub use session::{AuthError, SessionManager, SessionPhase, SessionState};
