//! Auth State Store: the single source of truth for who is signed in.
//!
//! Readers get snapshots or a `watch` subscription. Only session operations
//! (this crate) can move the state; the mutators are `pub(crate)`.

use std::sync::Arc;

use tokio::sync::watch;

use bandportal_auth::{Role, UserProfile};

/// Authentication snapshot. `is_authenticated()` implies `user().is_some()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    user: Option<UserProfile>,
    is_authenticated: bool,
    is_loading: bool,
}

impl AuthState {
    pub fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Signed-in user, only while authenticated.
    pub fn authenticated_user(&self) -> Option<&UserProfile> {
        self.user.as_ref().filter(|_| self.is_authenticated)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.authenticated_user().is_some_and(|u| u.has_role(role))
    }

    fn has_any(&self, roles: &[Role]) -> bool {
        roles.iter().any(|r| self.has_role(*r))
    }
}

/// Cloneable handle to the process-wide auth state.
///
/// Construct one per application (or per test) and pass it to the session,
/// guards and authorizer; there is no ambient global.
#[derive(Debug, Clone)]
pub struct AuthStateStore {
    tx: Arc<watch::Sender<AuthState>>,
}

impl Default for AuthStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthStateStore {
    /// Starts unauthenticated and idle.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(AuthState::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn snapshot(&self) -> AuthState {
        self.tx.borrow().clone()
    }

    /// Receiver notified on every transition.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.tx.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.tx.borrow().is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.tx.borrow().is_loading()
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.tx.borrow().authenticated_user().cloned()
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.tx.borrow().has_role(role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }

    pub fn is_reporter(&self) -> bool {
        self.has_role(Role::Reporter)
    }

    pub fn is_conductor(&self) -> bool {
        self.has_role(Role::Conductor)
    }

    pub fn is_section_leader(&self) -> bool {
        self.has_role(Role::SectionLeader)
    }

    pub fn is_musician(&self) -> bool {
        self.has_role(Role::Musician)
    }

    /// Access to the administration area (admins and reporters).
    pub fn can_administer(&self) -> bool {
        self.tx.borrow().has_any(&[Role::Admin, Role::Reporter])
    }

    /// Creating and editing gigs.
    pub fn can_manage_gigs(&self) -> bool {
        self.tx.borrow().has_any(&[Role::Admin, Role::Reporter, Role::Conductor])
    }

    /// Waits until no session operation is in flight, then returns the state.
    pub async fn settled(&self) -> AuthState {
        let mut rx = self.subscribe();
        match rx.wait_for(|state| !state.is_loading()).await {
            Ok(state) => state.clone(),
            // Sender lives as long as `self`; unreachable in practice.
            Err(_) => self.snapshot(),
        }
    }

    /// Touches only the loading flag.
    pub(crate) fn set_loading(&self, loading: bool) {
        self.tx.send_modify(|state| state.is_loading = loading);
    }

    /// Replaces user + authenticated flag atomically and clears loading.
    ///
    /// `Some(user)` authenticates; `None` signs out.
    pub(crate) fn set_authenticated(&self, user: Option<UserProfile>) {
        self.tx.send_modify(|state| {
            state.is_authenticated = user.is_some();
            state.user = user;
            state.is_loading = false;
        });
    }
}
