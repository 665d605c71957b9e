//! Application bootstrap for modelgate.
//!
//! Builds the session core once and hands the same `SessionState` to the
//! navigator and the outbound client:
//!
//! config → credential store → session state → navigator → authorized client

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::api::binder::{build_http_client, ExpiryHandler};
use crate::api::{ApiError, AuthGateway, AuthorizedClient};
use crate::auth::{CredentialStore, SessionState};
use crate::config::Config;
use crate::models::{NewUser, RegisterResponse, UserRecord};
use crate::notify::Notifier;
use crate::router::routes::{HOME, LOGIN};
use crate::router::{Navigation, NavigationError, Navigator, RouteTable};

/// Main application state container
pub struct App {
    pub config: Config,
    pub session: Arc<SessionState>,
    pub navigator: Arc<Navigator>,
    pub api: AuthorizedClient,
    pub gateway: AuthGateway,
}

impl App {
    /// Bootstrap from configuration with the default route table.
    pub fn new(config: Config, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let store = CredentialStore::new(config.credential_backend()?);
        Self::with_parts(config, store, RouteTable::default(), notifier)
    }

    pub fn with_parts(
        config: Config,
        store: CredentialStore,
        routes: RouteTable,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        debug!(base_url = %config.api_base_url, storage = ?config.storage, "App starting");

        // The persisted session is read exactly once, here
        let session = Arc::new(SessionState::restore(store));
        let navigator = Arc::new(Navigator::new(routes, session.clone(), notifier.clone()));
        let expiry = Arc::new(ExpiryHandler::new(
            session.clone(),
            navigator.clone(),
            notifier,
        ));

        let http = build_http_client()?;
        let api = AuthorizedClient::new(
            http.clone(),
            config.api_base_url.clone(),
            session.clone(),
            expiry,
        );
        let gateway = AuthGateway::new(http, config.api_base_url.clone());

        Ok(Self {
            config,
            session,
            navigator,
            api,
            gateway,
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    /// Exchange credentials for a session, then go home.
    /// On failure the session is left exactly as it was.
    pub async fn login(&self, username: &str, password: &str) -> Result<UserRecord, ApiError> {
        let outcome = self.gateway.login(username, password).await?;
        self.session
            .login(outcome.token, outcome.user.clone())
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;

        if let Err(e) = self.navigator.navigate_to(HOME) {
            warn!(error = %e, "Failed to navigate after login");
        }
        info!(username = %outcome.user.username, "Login successful");
        Ok(outcome.user)
    }

    /// End the session and show the login route.
    /// Returns `false` if there was no session.
    pub fn logout(&self) -> bool {
        let ended = self.session.logout();
        if let Err(e) = self.navigator.navigate_to(LOGIN) {
            warn!(error = %e, "Failed to navigate after logout");
        }
        ended
    }

    pub async fn register(&self, payload: &NewUser) -> Result<RegisterResponse, ApiError> {
        self.gateway.register(payload).await
    }

    pub async fn register_admin(&self, payload: &NewUser) -> Result<RegisterResponse, ApiError> {
        self.gateway.register_admin(&self.api, payload).await
    }

    pub fn navigate(&self, path: &str) -> Result<Navigation, NavigationError> {
        self.navigator.navigate(path)
    }
}
