//! HTTP client module for the modelgate service.
//!
//! - `AuthorizedClient`: stamps `Authorization: Bearer <token>` on every request
//!   and reacts to 401 responses by expiring the session
//! - `AuthGateway`: the login/register exchanges
//!
//! The service issues JWT bearer tokens from `POST /login`.

pub mod binder;
pub mod error;
pub mod gateway;

pub use binder::AuthorizedClient;
pub use error::ApiError;
pub use gateway::{AuthGateway, LoginOutcome};
