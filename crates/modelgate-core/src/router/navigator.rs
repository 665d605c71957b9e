//! The single navigation interception point.
//!
//! Every transition, including the redirects the guard itself issues,
//! passes through `authorize` exactly once per hop before it commits.

use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{debug, info};

use super::guard::{authorize, Decision};
use super::routes::{Route, RouteTable, HOME, LOGIN, LOGOUT};
use crate::auth::SessionState;
use crate::notify::{Notice, Notifier};

/// Guard redirects followed before giving up
const MAX_REDIRECTS: usize = 3;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum NavigationError {
    #[error("No route declared for path: {0}")]
    UnknownPath(String),

    #[error("No route named: {0}")]
    UnknownRoute(String),

    #[error("Too many redirects navigating to {0}")]
    RedirectLoop(String),
}

/// Where a committed transition ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// The requested route was entered
    Allowed(String),
    /// The guard (or the logout route) sent the user elsewhere
    Redirected {
        requested: String,
        to: String,
        denied: bool,
    },
}

impl Navigation {
    /// Name of the route that is now current
    pub fn route(&self) -> &str {
        match self {
            Navigation::Allowed(name) => name,
            Navigation::Redirected { to, .. } => to,
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Navigation::Allowed(_))
    }
}

pub struct Navigator {
    routes: RouteTable,
    session: Arc<SessionState>,
    notifier: Arc<dyn Notifier>,
    current: Mutex<String>,
}

impl Navigator {
    /// Starts on `home` without running the guard.
    pub fn new(routes: RouteTable, session: Arc<SessionState>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            routes,
            session,
            notifier,
            current: Mutex::new(HOME.to_string()),
        }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Name of the current route
    pub fn current(&self) -> String {
        self.current.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn navigate(&self, path: &str) -> Result<Navigation, NavigationError> {
        let route = self
            .routes
            .resolve(path)
            .ok_or_else(|| NavigationError::UnknownPath(path.to_string()))?;
        self.transition(route)
    }

    pub fn navigate_to(&self, name: &str) -> Result<Navigation, NavigationError> {
        let route = self
            .routes
            .by_name(name)
            .ok_or_else(|| NavigationError::UnknownRoute(name.to_string()))?;
        self.transition(route)
    }

    /// Send the user to the login route.
    /// Returns `false` when already there, so a 401 on the login page cannot loop.
    pub fn redirect_to_login(&self) -> Result<bool, NavigationError> {
        if self.current() == LOGIN {
            debug!("Already on login, not redirecting");
            return Ok(false);
        }
        self.navigate_to(LOGIN)?;
        Ok(true)
    }

    fn transition(&self, requested: &Route) -> Result<Navigation, NavigationError> {
        let mut target = requested;
        let mut denied = false;

        for _ in 0..=MAX_REDIRECTS {
            let session = self.session.snapshot();
            let next = match authorize(&target.meta, session.as_ref()) {
                Decision::Allow if target.name == LOGOUT => {
                    self.session.logout();
                    HOME
                }
                Decision::Allow => return Ok(self.commit(requested, target, denied)),
                Decision::RedirectTo(name) => {
                    debug!(from = %target.name, to = name, "Authentication required");
                    name
                }
                Decision::Denied { redirect_to } => {
                    info!(route = %target.name, "Access denied");
                    self.notifier.notify(Notice::AccessDenied);
                    denied = true;
                    redirect_to
                }
            };

            target = self
                .routes
                .by_name(next)
                .ok_or_else(|| NavigationError::UnknownRoute(next.to_string()))?;
        }

        Err(NavigationError::RedirectLoop(requested.name.clone()))
    }

    fn commit(&self, requested: &Route, landed: &Route, denied: bool) -> Navigation {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = landed.name.clone();
        debug!(route = %landed.name, "Navigated");

        if requested.name == landed.name {
            Navigation::Allowed(landed.name.clone())
        } else {
            Navigation::Redirected {
                requested: requested.name.clone(),
                to: landed.name.clone(),
                denied,
            }
        }
    }
}
