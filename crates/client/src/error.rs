//! Session error taxonomy.

use reqwest::StatusCode;
use thiserror::Error;

/// Connection-level failure: no HTTP status was received.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request could not be sent: {0}")]
    Connect(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Classified failure of a session operation.
///
/// Decode-level failures never reach this type; they degrade locally.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The response was not in the agreed shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// 401 on login.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// 403.
    #[error("forbidden")]
    Forbidden,

    /// No status at all (connection failure, status 0).
    #[error("server unreachable: {0}")]
    Unreachable(String),

    /// Any other non-success status.
    #[error("unexpected status {status}")]
    Unknown { status: u16 },

    /// 401 on a request made with stored credentials.
    #[error("session expired")]
    SessionExpired,

    #[error("no refresh token stored")]
    MissingRefreshToken,

    /// The request never left the client: bad URL, body or header value.
    #[error("request could not be built: {0}")]
    InvalidRequest(String),
}

pub const MALFORMED_RESPONSE_MESSAGE: &str = "Unexpected response from the server. Please try again later.";

impl SessionError {
    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::MalformedResponse(detail.into())
    }

    /// Classify a failed login/authentication exchange.
    ///
    /// A missing status (status 0) never gets here: it arrives as a
    /// [`TransportError`] and converts to `Unreachable`.
    pub fn from_login_status(status: StatusCode) -> Self {
        match status.as_u16() {
            401 => Self::InvalidCredentials,
            403 => Self::Forbidden,
            other => Self::Unknown { status: other },
        }
    }

    /// Classify a failed request that carried stored credentials.
    pub fn from_session_status(status: StatusCode) -> Self {
        match status.as_u16() {
            401 => Self::SessionExpired,
            _ => Self::from_login_status(status),
        }
    }

    /// Fixed, user-facing text for the failure.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::MalformedResponse(_) => MALFORMED_RESPONSE_MESSAGE,
            Self::InvalidCredentials => "Invalid username or password.",
            Self::Forbidden => "Access forbidden.",
            Self::Unreachable(_) => "The server is unreachable. Please check your connection.",
            Self::Unknown { status } => status_message(*status),
            Self::SessionExpired => "Your session has expired. Please sign in again.",
            Self::MissingRefreshToken => "No saved session to renew. Please sign in again.",
            Self::InvalidRequest(_) => "The request could not be built. Please check the client configuration.",
        }
    }

    /// Whether the caller must treat the session as gone.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, Self::SessionExpired | Self::MissingRefreshToken)
    }
}

impl From<TransportError> for SessionError {
    fn from(value: TransportError) -> Self {
        match value {
            TransportError::Connect(detail) => Self::Unreachable(detail),
            TransportError::InvalidRequest(detail) => Self::InvalidRequest(detail),
        }
    }
}

/// Message for statuses outside the auth taxonomy.
pub fn status_message(status: u16) -> &'static str {
    match status {
        404 => "Resource not found.",
        500 => "Internal server error.",
        _ => "An unexpected error occurred.",
    }
}
