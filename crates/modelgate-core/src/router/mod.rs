//! Client-side routing.
//!
//! - `RouteTable`: static `(path, name, meta)` declarations
//! - `authorize`: the single guard predicate, pure over `(RouteMeta, Session)`
//! - `Navigator`: current location plus the interception point that runs the guard

pub mod guard;
pub mod navigator;
pub mod routes;

pub use guard::{authorize, Decision};
pub use navigator::{Navigation, NavigationError, Navigator};
pub use routes::{Route, RouteMeta, RouteTable, HOME, LOGIN, LOGOUT};
