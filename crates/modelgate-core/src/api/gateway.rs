//! Login and registration exchanges with the service.
//!
//! These calls do not go through `AuthorizedClient`: a 401 from `/login`
//! means bad credentials, not an expired session, and must leave the
//! session untouched.

use reqwest::{header, Client};
use serde::Deserialize;
use tracing::{debug, error, info};

use super::binder::{join_url, AuthorizedClient};
use super::ApiError;
use crate::auth::TokenClaims;
use crate::models::{NewUser, RegisterResponse, Role, UserRecord};

#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(alias = "access_token")]
    token: String,
    #[serde(default)]
    user: Option<UserRecord>,
}

/// Credentials returned by a successful login, ready for `SessionState::login`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub token: String,
    pub user: UserRecord,
}

#[derive(Clone)]
pub struct AuthGateway {
    client: Client,
    base_url: String,
}

impl AuthGateway {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Submit credentials form-encoded to `POST /login`.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, ApiError> {
        let response = self
            .client
            .post(join_url(&self.base_url, "/login"))
            .header(header::ACCEPT, "application/json")
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = match ApiError::from_status(status, &body) {
                ApiError::Unauthorized => ApiError::AuthFailure(
                    Self::detail(&body).unwrap_or_else(|| "Incorrect username or password".to_string()),
                ),
                other => other,
            };
            error!(username, %status, "Login failed");
            return Err(err);
        }

        let login: LoginResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("login: {}", e)))?;

        let user = match login.user {
            Some(user) => user,
            None => Self::user_from_claims(&login.token, username)?,
        };

        info!(username = %user.username, role = %user.role, "Login accepted");
        Ok(LoginOutcome {
            token: login.token,
            user,
        })
    }

    /// Derive the user record from the token when the service answers with
    /// only `{access_token, token_type}`.
    fn user_from_claims(token: &str, username: &str) -> Result<UserRecord, ApiError> {
        let claims = TokenClaims::decode(token).ok_or_else(|| {
            ApiError::InvalidResponse("login response has no user and an opaque token".to_string())
        })?;
        let id = claims.user_id().ok_or_else(|| {
            ApiError::InvalidResponse("token subject is not a user id".to_string())
        })?;
        debug!(id, "User derived from token claims");
        Ok(UserRecord::new(id, username, claims.role.unwrap_or_default()))
    }

    fn detail(body: &str) -> Option<String> {
        #[derive(Deserialize)]
        struct Detail {
            detail: String,
        }
        serde_json::from_str::<Detail>(body).ok().map(|d| d.detail)
    }

    /// Create an account via `POST /register`. Does not log in.
    pub async fn register(&self, payload: &NewUser) -> Result<RegisterResponse, ApiError> {
        let response = self
            .client
            .post(join_url(&self.base_url, "/register"))
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(username = %payload.username, %status, "Registration failed");
            return Err(ApiError::from_status(status, &body));
        }

        let created: RegisterResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("register: {}", e)))?;
        info!(username = %payload.username, "Registered");
        Ok(created)
    }

    /// Create an account with an explicit role via `POST /admin/register`.
    /// Requires an admin session, so it is sent through the authorized client.
    pub async fn register_admin(
        &self,
        client: &AuthorizedClient,
        payload: &NewUser,
    ) -> Result<RegisterResponse, ApiError> {
        if !matches!(payload.role, Role::User | Role::Admin) {
            return Err(ApiError::Validation("Invalid role.".to_string()));
        }
        client.post("/admin/register", payload).await
    }
}
