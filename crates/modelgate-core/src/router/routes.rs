use serde::{Deserialize, Serialize};

/// Name of the route unauthenticated users are sent to
pub const LOGIN: &str = "login";

/// Name of the route users without the required role are sent to
pub const HOME: &str = "home";

/// Name of the route that ends the session on arrival
pub const LOGOUT: &str = "logout";

/// Access requirements declared by a route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct RouteMeta {
    #[serde(default)]
    pub requires_auth: bool,
    #[serde(default)]
    pub requires_admin: bool,
}

impl RouteMeta {
    pub const PUBLIC: Self = Self {
        requires_auth: false,
        requires_admin: false,
    };

    pub const AUTHENTICATED: Self = Self {
        requires_auth: true,
        requires_admin: false,
    };

    pub const ADMIN: Self = Self {
        requires_auth: true,
        requires_admin: true,
    };
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub path: String,
    pub name: String,
    #[serde(default)]
    pub meta: RouteMeta,
}

impl Route {
    pub fn new(path: &str, name: &str, meta: RouteMeta) -> Self {
        Self {
            path: path.to_string(),
            name: name.to_string(),
            meta,
        }
    }
}

/// Ordered, read-only route declarations. First match wins.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new(vec![
            Route::new("/", HOME, RouteMeta::PUBLIC),
            Route::new("/login", LOGIN, RouteMeta::PUBLIC),
            Route::new("/logout", LOGOUT, RouteMeta::PUBLIC),
            Route::new("/register", "register", RouteMeta::PUBLIC),
            Route::new("/train", "train", RouteMeta::AUTHENTICATED),
            Route::new("/predict", "predict", RouteMeta::AUTHENTICATED),
            Route::new("/help", "help", RouteMeta::PUBLIC),
            Route::new("/contact", "contact", RouteMeta::PUBLIC),
            Route::new("/admin", "AdminDashboard", RouteMeta::ADMIN),
        ])
    }
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Find the route declared for `path`. Query strings, fragments and a
    /// trailing slash are ignored.
    pub fn resolve(&self, path: &str) -> Option<&Route> {
        let path = normalize_path(path);
        self.routes.iter().find(|r| normalize_path(&r.path) == path)
    }

    pub fn by_name(&self, name: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.name == name)
    }
}

fn normalize_path(path: &str) -> String {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    let trimmed = path[..end].trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
