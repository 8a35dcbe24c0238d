//! `bandportal-client`: the IO side of portal authentication.
//!
//! Wires the pure rules of `bandportal-auth` to persistent credentials, a
//! shared auth state, the identity service, navigation guards and an
//! outbound request authorizer.

pub mod api;
pub mod config;
pub mod credentials;
pub mod error;
pub mod guard;
pub mod interceptor;
pub mod session;
pub mod state;
pub mod storage;
pub mod transport;

#[cfg(test)]
mod testing;

pub use api::{AuthApi, AuthPayload, HttpAuthApi, LoginRequest, ProfilePayload};
pub use config::{ClientConfig, NavigationPaths, ResponseEnvelope};
pub use credentials::{CredentialStore, Credentials, StorageKeys, StoredSession};
pub use error::{SessionError, TransportError};
pub use guard::{GuardDecision, Redirect, RouteGuard, RouteTable, role_guard};
pub use interceptor::{AuthorizingTransport, ProtectedPrefixes, TokenSource};
pub use session::Session;
pub use state::{AuthState, AuthStateStore};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage, StorageError};
pub use transport::{ApiResponse, ReqwestTransport, Transport};
