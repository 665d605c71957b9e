//! Authentication module for managing the client session and its persistence.
//!
//! This module provides:
//! - `SessionState`: the authoritative in-memory session, mutated only by login/logout
//! - `CredentialStore`: durable `token`/`user` persistence behind a pluggable backend
//! - `TokenClaims`: unverified view of a JWT payload (subject, role, expiry)
//!
//! Persisted sessions whose token has already expired are dropped at startup.

pub mod claims;
pub mod credentials;
pub mod session;

pub use claims::TokenClaims;
pub use credentials::{CredentialBackend, CredentialStore, FileBackend, KeyringBackend, MemoryBackend};
pub use session::{Session, SessionError, SessionState};
