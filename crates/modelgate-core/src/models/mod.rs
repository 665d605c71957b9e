//! Data models shared with the remote service.
//!
//! - `UserRecord`, `Role`: the authenticated identity held by the session
//! - `NewUser`, `RegisterResponse`: registration exchange

pub mod user;

pub use user::{NewUser, RegisterResponse, Role, UserRecord};
