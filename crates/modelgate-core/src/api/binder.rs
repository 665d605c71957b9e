//! Outbound client that binds the current session to every request.
//!
//! The token is read from `SessionState` at send time, so a login or
//! logout takes effect for the next request without any re-wiring. A 401
//! ends the session (once, however many requests fail together) and the
//! original error is still returned to the caller.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Client, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use super::ApiError;
use crate::auth::SessionState;
use crate::notify::{Notice, Notifier};
use crate::router::Navigator;

/// HTTP request timeout in seconds.
/// 30s allows for slow training responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Shared HTTP client. Clone is cheap - reqwest::Client uses Arc internally.
pub fn build_http_client() -> Result<Client, ApiError> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()?)
}

/// Join a base URL and an endpoint path with exactly one slash
pub(crate) fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// The reaction to an unauthorized response: notify, log out, go to login.
pub struct ExpiryHandler {
    session: Arc<SessionState>,
    navigator: Arc<Navigator>,
    notifier: Arc<dyn Notifier>,
}

impl ExpiryHandler {
    pub fn new(
        session: Arc<SessionState>,
        navigator: Arc<Navigator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            session,
            navigator,
            notifier,
        }
    }

    /// Handle a 401 for a request that was sent with `token`.
    ///
    /// Returns `true` only for the call that actually ended the session.
    /// Requests sent without a token only lead back to login, silently.
    pub fn on_unauthorized(&self, token: Option<&str>) -> bool {
        let expired = match token {
            Some(token) => self.session.logout_if_current(token),
            None => false,
        };

        if expired {
            info!("Session expired, returning to login");
            self.notifier.notify(Notice::SessionExpired);
        } else if token.is_some() {
            debug!("Unauthorized response for a session that already ended");
            return false;
        }

        if let Err(e) = self.navigator.redirect_to_login() {
            warn!(error = %e, "Failed to redirect to login");
        }
        expired
    }
}

/// API client for authenticated endpoints.
#[derive(Clone)]
pub struct AuthorizedClient {
    client: Client,
    base_url: String,
    session: Arc<SessionState>,
    expiry: Arc<ExpiryHandler>,
}

impl AuthorizedClient {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        session: Arc<SessionState>,
        expiry: Arc<ExpiryHandler>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            session,
            expiry,
        }
    }

    pub fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    fn auth_headers(token: Option<&str>) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        if let Some(token) = token {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }
        Ok(headers)
    }

    /// Start a request against the service. Credentials are attached by `execute`.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path))
    }

    /// Stamp the current token, send, and check the status.
    ///
    /// Never retries. On 401 the expiry reaction runs before
    /// `ApiError::Unauthorized` is returned.
    pub async fn execute(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let token = self.session.current_token();
        let response = request
            .headers(Self::auth_headers(token.as_deref())?)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            warn!(url = %response.url(), "Request unauthorized");
            self.expiry.on_unauthorized(token.as_deref());
            return Err(ApiError::Unauthorized);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_status(status, &body))
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder, path: &str) -> Result<T, ApiError> {
        let response = self.execute(request).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", path, e)))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.json(self.request(Method::GET, path), path).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.json(self.request(Method::POST, path).json(body), path).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.json(self.request(Method::DELETE, path), path).await
    }
}
