//! Core library for modelgate.
//!
//! Client-side session handling for the predictive-modeling service:
//! credential persistence, the in-memory session, bearer stamping of
//! outbound requests, the login/register gateway and the navigation guard
//! that gates routes by authentication and role.

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod models;
pub mod notify;
pub mod router;

#[cfg(test)]
pub(crate) mod test_support;

pub use app::App;
