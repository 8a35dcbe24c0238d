//! Session Operations.
//!
//! The only code allowed to move the [`AuthStateStore`]. Each operation
//! either reaches a fully applied state or leaves the session signed out:
//! on failure the credential store is cleared, the state is reset to
//! unauthenticated and the classified error is returned.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;

use bandportal_auth::{Permission, UserProfile, decode_claims, permissions_from_token};

use crate::api::{AuthApi, AuthPayload, LoginRequest, ProfilePayload};
use crate::credentials::{CredentialStore, Credentials};
use crate::error::SessionError;
use crate::guard::Redirect;
use crate::interceptor::TokenSource;
use crate::state::AuthStateStore;

#[derive(Clone)]
pub struct Session {
    api: Arc<dyn AuthApi>,
    credentials: CredentialStore,
    state: AuthStateStore,
}

impl core::fmt::Debug for Session {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Session")
            .field("credentials", &self.credentials)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Role strings from the response plus the token's permission claims.
fn profile_from(user: &ProfilePayload, access_token: &str) -> UserProfile {
    let claims = permissions_from_token(access_token);
    let raw = user
        .roles
        .iter()
        .map(String::as_str)
        .chain(claims.iter().map(Permission::as_str));
    UserProfile::new(user.id.clone(), user.display_name.as_str(), user.email.as_str(), raw)
}

impl Session {
    pub fn new(api: Arc<dyn AuthApi>, credentials: CredentialStore, state: AuthStateStore) -> Self {
        Self {
            api,
            credentials,
            state,
        }
    }

    pub fn state(&self) -> &AuthStateStore {
        &self.state
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Re-seed the state from the credential store at startup.
    ///
    /// Authenticated only when both a token and a profile are stored. An
    /// expired access token with no refresh token to renew it is discarded.
    pub fn restore(&self) -> bool {
        let Some(stored) = self.credentials.load() else {
            self.state.set_authenticated(None);
            return false;
        };

        let expired = decode_claims(stored.credentials.access_token())
            .is_ok_and(|claims| claims.is_expired(Utc::now()));
        if expired && stored.credentials.refresh_token().is_none() {
            tracing::info!(user_id = %stored.profile.id(), "stored session expired; discarding");
            self.clear_local();
            return false;
        }

        tracing::debug!(user_id = %stored.profile.id(), "restored stored session");
        self.state.set_authenticated(Some(stored.profile));
        true
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<UserProfile, SessionError> {
        self.state.set_loading(true);
        match self.api.login(request).await {
            Ok(payload) => {
                let profile = self.establish(payload);
                tracing::info!(user_id = %profile.id(), roles = ?profile.roles(), "login succeeded");
                Ok(profile)
            }
            Err(err) => Err(self.fail(err, "login failed")),
        }
    }

    /// Always ends signed out locally, whatever the server says.
    pub async fn logout(&self) {
        self.state.set_loading(true);
        if let Some(token) = self.credentials.access_token() {
            if let Err(err) = self.api.logout(&token).await {
                tracing::warn!(error = %err, "server-side logout failed; clearing local session anyway");
            }
        }
        self.clear_local();
        tracing::info!("logged out");
    }

    /// Re-derive the profile from the profile endpoint.
    ///
    /// Any failure forces a logout: the session is never left running on a
    /// stale or downgraded identity.
    pub async fn fetch_profile(&self) -> Result<UserProfile, SessionError> {
        let Some(token) = self.credentials.access_token() else {
            return Err(self.fail(SessionError::SessionExpired, "no stored token for profile refresh"));
        };

        self.state.set_loading(true);
        match self.api.profile(&token).await {
            Ok(user) => {
                let profile = profile_from(&user, &token);
                self.credentials.save_profile(&profile);
                self.state.set_authenticated(Some(profile.clone()));
                tracing::info!(user_id = %profile.id(), "profile refreshed");
                Ok(profile)
            }
            Err(err) => Err(self.fail(err, "profile refresh failed; forcing logout")),
        }
    }

    /// Silent refresh: trade the stored refresh token for new credentials.
    ///
    /// Any failure signs the user out.
    pub async fn refresh(&self) -> Result<UserProfile, SessionError> {
        match self.exchange_refresh_token().await {
            Ok(profile) => {
                tracing::info!(user_id = %profile.id(), "session refreshed");
                Ok(profile)
            }
            Err(err) => Err(self.fail(err, "silent refresh failed; forcing logout")),
        }
    }

    /// The refresh exchange alone. A failure leaves credentials and state as
    /// they were, apart from clearing the loading flag.
    async fn exchange_refresh_token(&self) -> Result<UserProfile, SessionError> {
        let refresh_token = self
            .credentials
            .refresh_token()
            .ok_or(SessionError::MissingRefreshToken)?;

        self.state.set_loading(true);
        match self.api.refresh(&refresh_token).await {
            Ok(mut payload) => {
                if payload.credentials.refresh_token().is_none() {
                    // Not rotated: keep using the one we have.
                    payload.credentials = Credentials::new(payload.credentials.access_token(), refresh_token);
                }
                Ok(self.establish(payload))
            }
            Err(err) => {
                self.state.set_loading(false);
                Err(err)
            }
        }
    }

    /// Higher-level handler for a failed API call.
    ///
    /// An expired session is always torn down and sent to login; a 403 goes
    /// to the unauthorized view. Other failures are left to the caller.
    pub fn handle_api_error(&self, error: &SessionError, destination: &str) -> Option<Redirect> {
        match error {
            SessionError::SessionExpired | SessionError::MissingRefreshToken => {
                tracing::warn!(destination, "session expired; forcing logout");
                self.clear_local();
                Some(Redirect::login(destination))
            }
            SessionError::Forbidden => Some(Redirect::Unauthorized),
            _ => None,
        }
    }

    /// [`Self::handle_api_error`] for a raw status from an authenticated request.
    pub fn handle_status(&self, status: StatusCode, destination: &str) -> Option<Redirect> {
        if status.is_success() {
            return None;
        }
        self.handle_api_error(&SessionError::from_session_status(status), destination)
    }

    fn establish(&self, payload: AuthPayload) -> UserProfile {
        let profile = profile_from(&payload.user, payload.credentials.access_token());
        self.credentials.save(&payload.credentials, &profile);
        self.state.set_authenticated(Some(profile.clone()));
        profile
    }

    fn clear_local(&self) {
        self.credentials.clear();
        self.state.set_authenticated(None);
    }

    fn fail(&self, err: SessionError, context: &'static str) -> SessionError {
        tracing::warn!(error = %err, "{context}");
        self.clear_local();
        err
    }
}

#[async_trait]
impl TokenSource for Session {
    async fn access_token(&self) -> Option<String> {
        self.credentials.access_token()
    }

    /// Does not sign out on failure: the rejected response reaches the
    /// caller, whose error handler decides through [`Session::handle_api_error`].
    async fn refresh_access_token(&self) -> Option<String> {
        match self.exchange_refresh_token().await {
            Ok(profile) => {
                tracing::info!(user_id = %profile.id(), "session refreshed for a rejected request");
                self.credentials.access_token()
            }
            Err(err) => {
                tracing::debug!(error = %err, "silent refresh unavailable");
                None
            }
        }
    }
}
