//! Outbound Request Authorizer.
//!
//! Wraps a [`Transport`] and decorates requests bound for first-party API
//! prefixes with the stored bearer token. Identity-service calls made by
//! the session itself go over the undecorated transport.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Request, StatusCode, Url};

use crate::credentials::CredentialStore;
use crate::error::TransportError;
use crate::guard::{covers, normalize_path};
use crate::transport::{ApiResponse, Transport};

/// Source of bearer tokens for outgoing requests.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Option<String>;

    /// Obtain a fresh token without user interaction, if possible.
    async fn refresh_access_token(&self) -> Option<String> {
        None
    }
}

#[async_trait]
impl TokenSource for CredentialStore {
    async fn access_token(&self) -> Option<String> {
        CredentialStore::access_token(self)
    }
}

/// URL prefixes that receive credentials. Everything else is third-party.
///
/// A prefix matches on origin (scheme, host, effective port) and then on
/// whole path segments, so `https://api.example.org/api` covers
/// `https://api.example.org/api/gigs` but neither `/apix` nor
/// `https://api.example.org.other.net/api`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtectedPrefixes(Vec<Url>);

impl ProtectedPrefixes {
    /// Blank and unparsable entries are dropped; the latter with a warning.
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let parsed = prefixes
            .into_iter()
            .map(Into::into)
            .filter(|p: &String| !p.trim().is_empty())
            .filter_map(|p| match Url::parse(p.trim()) {
                Ok(url) if url.has_host() => Some(url),
                Ok(_) => {
                    tracing::warn!(prefix = %p, "protected prefix has no host; ignoring");
                    None
                }
                Err(e) => {
                    tracing::warn!(prefix = %p, error = %e, "protected prefix is not an absolute URL; ignoring");
                    None
                }
            })
            .collect();
        Self(parsed)
    }

    pub fn covers(&self, url: &str) -> bool {
        Url::parse(url).is_ok_and(|url| self.covers_url(&url))
    }

    pub fn covers_url(&self, url: &Url) -> bool {
        self.0.iter().any(|prefix| {
            prefix.scheme() == url.scheme()
                && prefix.host_str() == url.host_str()
                && prefix.port_or_known_default() == url.port_or_known_default()
                && covers(normalize_path(prefix.path()), url.path())
        })
    }
}

pub struct AuthorizingTransport<T> {
    inner: T,
    prefixes: ProtectedPrefixes,
    tokens: Arc<dyn TokenSource>,
}

impl<T: Transport> AuthorizingTransport<T> {
    pub fn new(inner: T, prefixes: ProtectedPrefixes, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            inner,
            prefixes,
            tokens,
        }
    }
}

/// Set the one and only `Authorization` header.
fn attach_bearer(request: &mut Request, token: &str) -> Result<(), TransportError> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|e| TransportError::InvalidRequest(format!("bearer token is not a valid header value: {e}")))?;
    value.set_sensitive(true);
    request.headers_mut().insert(AUTHORIZATION, value);
    Ok(())
}

#[async_trait]
impl<T: Transport> Transport for AuthorizingTransport<T> {
    async fn execute(&self, mut request: Request) -> Result<ApiResponse, TransportError> {
        if !self.prefixes.covers_url(request.url()) {
            return self.inner.execute(request).await;
        }

        let Some(token) = self.tokens.access_token().await else {
            tracing::debug!(url = %request.url(), "no stored token; sending protected request unauthenticated");
            return self.inner.execute(request).await;
        };

        let retry = request.try_clone();
        attach_bearer(&mut request, &token)?;
        let response = self.inner.execute(request).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }
        // One recovery attempt at most; a second 401 is the caller's problem.
        let Some(mut retry) = retry else {
            return Ok(response);
        };

        tracing::info!(url = %retry.url(), "protected request rejected; attempting silent refresh");
        match self.tokens.refresh_access_token().await {
            Some(fresh) if fresh != token => {
                attach_bearer(&mut retry, &fresh)?;
                self.inner.execute(retry).await
            }
            _ => Ok(response),
        }
    }
}
