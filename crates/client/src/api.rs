//! Identity service endpoints and the response-normalization boundary.
//!
//! Every payload is unwrapped according to the configured
//! [`ResponseEnvelope`] and validated into one canonical shape here. Nothing
//! downstream ever sees raw JSON.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use bandportal_core::UserId;

use crate::config::{ClientConfig, ResponseEnvelope};
use crate::credentials::Credentials;
use crate::error::{SessionError, TransportError};
use crate::transport::{ApiResponse, Transport, build_request};

pub const LOGIN_PATH: &str = "/auth/login";
pub const LOGOUT_PATH: &str = "/auth/logout";
pub const REFRESH_PATH: &str = "/auth/refresh";
pub const PROFILE_PATH: &str = "/profile";

#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

impl LoginRequest {
    /// `username` may also be the account email; the backend accepts either.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

impl core::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Validated user object from a login, refresh or profile response.
///
/// Roles are still raw strings here; the session runs them through the
/// role mapper together with the token's permission claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfilePayload {
    pub id: UserId,
    pub display_name: String,
    pub email: String,
    pub roles: Vec<String>,
}

/// Validated login/refresh response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthPayload {
    pub credentials: Credentials,
    pub user: ProfilePayload,
}

#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> Result<AuthPayload, SessionError>;

    /// Server-side invalidation of the session behind `access_token`.
    async fn logout(&self, access_token: &str) -> Result<(), SessionError>;

    async fn profile(&self, access_token: &str) -> Result<ProfilePayload, SessionError>;

    async fn refresh(&self, refresh_token: &str) -> Result<AuthPayload, SessionError>;
}

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthWire {
    token: Option<String>,
    refresh_token: Option<String>,
    user: Option<UserWire>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserWire {
    id: Option<UserId>,
    name: Option<String>,
    display_name: Option<String>,
    username: Option<String>,
    email: Option<String>,
    roles: Option<Vec<serde_json::Value>>,
    permissions: Option<Vec<serde_json::Value>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

impl UserWire {
    fn validate(self) -> Result<ProfilePayload, SessionError> {
        let id = self.id.ok_or_else(|| SessionError::malformed("user object has no id"))?;
        let roles = self
            .roles
            .or(self.permissions)
            .ok_or_else(|| SessionError::malformed("user object has no roles collection"))?
            .into_iter()
            .filter_map(|value| value.as_str().map(str::to_string))
            .collect();

        let display_name = self
            .display_name
            .or(self.name)
            .or(self.username)
            .unwrap_or_default();

        Ok(ProfilePayload {
            id,
            display_name,
            email: self.email.unwrap_or_default(),
            roles,
        })
    }
}

impl AuthWire {
    fn validate(self) -> Result<AuthPayload, SessionError> {
        let token = self
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SessionError::malformed("response has no token"))?;
        let user = self
            .user
            .ok_or_else(|| SessionError::malformed("response has no user object"))?
            .validate()?;

        Ok(AuthPayload {
            credentials: Credentials::new(token, self.refresh_token.unwrap_or_default()),
            user,
        })
    }
}

/// Unwrap exactly the configured envelope.
fn normalize<T: DeserializeOwned>(envelope: ResponseEnvelope, response: &ApiResponse) -> Result<T, SessionError> {
    let malformed = |err: serde_json::Error| SessionError::malformed(err.to_string());
    match envelope {
        ResponseEnvelope::Bare => response.json::<T>().map_err(malformed),
        ResponseEnvelope::Data => response
            .json::<DataEnvelope<T>>()
            .map_err(malformed)?
            .data
            .ok_or_else(|| SessionError::malformed("response has no data field")),
    }
}

/// HTTP implementation of [`AuthApi`] over any [`Transport`].
#[derive(Clone)]
pub struct HttpAuthApi {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
}

impl HttpAuthApi {
    pub fn new(transport: Arc<dyn Transport>, config: ClientConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn send<B: Serialize + Sync + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        bearer: Option<&str>,
    ) -> Result<ApiResponse, SessionError> {
        let mut request = build_request(method, &self.config.endpoint(path), body)?;
        if let Some(token) = bearer {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }
        Ok(self.transport.execute(request).await?)
    }
}

impl core::fmt::Debug for HttpAuthApi {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HttpAuthApi").field("config", &self.config).finish_non_exhaustive()
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, request: &LoginRequest) -> Result<AuthPayload, SessionError> {
        let response = self.send(Method::POST, LOGIN_PATH, Some(request), None).await?;
        if !response.is_success() {
            return Err(SessionError::from_login_status(response.status()));
        }
        normalize::<AuthWire>(self.config.envelope, &response)?.validate()
    }

    async fn logout(&self, access_token: &str) -> Result<(), SessionError> {
        let response = self
            .send::<()>(Method::POST, LOGOUT_PATH, None, Some(access_token))
            .await?;
        if response.is_success() {
            Ok(())
        } else {
            Err(SessionError::from_session_status(response.status()))
        }
    }

    async fn profile(&self, access_token: &str) -> Result<ProfilePayload, SessionError> {
        let response = self
            .send::<()>(Method::GET, PROFILE_PATH, None, Some(access_token))
            .await?;
        if !response.is_success() {
            return Err(SessionError::from_session_status(response.status()));
        }
        normalize::<UserWire>(self.config.envelope, &response)?.validate()
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthPayload, SessionError> {
        let body = RefreshRequest { refresh_token };
        let response = self.send(Method::POST, REFRESH_PATH, Some(&body), None).await?;
        if !response.is_success() {
            return Err(SessionError::from_session_status(response.status()));
        }
        normalize::<AuthWire>(self.config.envelope, &response)?.validate()
    }
}
