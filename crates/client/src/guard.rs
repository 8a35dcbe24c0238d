//! Route Guard: navigation decisions from the current auth state.

use bandportal_auth::{AuthzError, RequirementError, Role, RouteRequirement, authorize};

use crate::config::NavigationPaths;
use crate::state::{AuthState, AuthStateStore};

/// Where a denied navigation is sent instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redirect {
    /// Sign in first, then continue to `return_to`.
    Login { return_to: String },

    /// Signed in, but none of the required roles is held.
    Unauthorized,
}

impl Redirect {
    pub fn login(return_to: impl Into<String>) -> Self {
        Self::Login {
            return_to: return_to.into(),
        }
    }

    /// Concrete location, e.g. `/login?returnUrl=%2Fadmin%2Fusers`.
    pub fn location(&self, paths: &NavigationPaths) -> String {
        match self {
            Self::Login { return_to } => format!(
                "{}?{}={}",
                paths.login_path,
                paths.return_param,
                urlencoding::encode(return_to)
            ),
            Self::Unauthorized => paths.unauthorized_path.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Deny(Redirect),
}

impl GuardDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    pub fn redirect(&self) -> Option<&Redirect> {
        match self {
            Self::Allow => None,
            Self::Deny(redirect) => Some(redirect),
        }
    }
}

fn decide(state: &AuthState, requirement: &RouteRequirement, destination: &str) -> GuardDecision {
    match authorize(state.authenticated_user(), requirement) {
        Ok(()) => GuardDecision::Allow,
        Err(AuthzError::Unauthenticated) => {
            tracing::warn!(destination, "navigation requires sign-in");
            GuardDecision::Deny(Redirect::login(destination))
        }
        Err(AuthzError::Forbidden { required }) => {
            tracing::warn!(destination, required = ?required, "navigation denied: missing role");
            GuardDecision::Deny(Redirect::Unauthorized)
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouteGuard {
    state: AuthStateStore,
}

impl RouteGuard {
    pub fn new(state: AuthStateStore) -> Self {
        Self { state }
    }

    /// Decide against the current snapshot, even if a session operation is in flight.
    pub fn check(&self, requirement: &RouteRequirement, destination: &str) -> GuardDecision {
        decide(&self.state.snapshot(), requirement, destination)
    }

    /// Decide once no session operation is in flight.
    pub async fn check_settled(&self, requirement: &RouteRequirement, destination: &str) -> GuardDecision {
        let state = self.state.settled().await;
        decide(&state, requirement, destination)
    }

    pub fn navigate(&self, routes: &RouteTable, destination: &str) -> GuardDecision {
        self.check(routes.requirement_for(destination), destination)
    }
}

/// Guard factory: a reusable closure bound to one required-role set.
///
/// Each closure owns its requirement; nothing is shared between instances.
pub fn role_guard(
    roles: impl IntoIterator<Item = Role>,
) -> impl Fn(&AuthStateStore, &str) -> GuardDecision + Clone + Send + Sync {
    let requirement = RouteRequirement::any_of(roles);
    move |state: &AuthStateStore, destination: &str| decide(&state.snapshot(), &requirement, destination)
}

static PUBLIC: RouteRequirement = RouteRequirement::Public;

/// Path-prefix to requirement table. Longest matching prefix wins;
/// paths no route covers are public.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<(String, RouteRequirement)>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, prefix: &str, requirement: RouteRequirement) -> Self {
        self.routes.push((normalize_path(prefix).to_string(), requirement));
        self
    }

    /// Declare a route from its role metadata (see [`RouteRequirement::from_metadata`]).
    pub fn route_with_roles<S: AsRef<str>>(self, prefix: &str, roles: Option<&[S]>) -> Result<Self, RequirementError> {
        let requirement = RouteRequirement::from_metadata(roles)?;
        Ok(self.route(prefix, requirement))
    }

    /// The member and admin areas of the band portal.
    pub fn portal() -> Self {
        Self::new()
            .route("/member-dashboard", RouteRequirement::Authenticated)
            .route("/member-gigs", RouteRequirement::Authenticated)
            .route("/members", RouteRequirement::Authenticated)
            .route("/admin", RouteRequirement::any_of([Role::Admin, Role::Reporter]))
            .route("/admin/gigs", RouteRequirement::any_of([Role::Admin, Role::Reporter, Role::Conductor]))
    }

    pub fn requirement_for(&self, path: &str) -> &RouteRequirement {
        let path = normalize_path(path);
        self.routes
            .iter()
            .filter(|(prefix, _)| covers(prefix, path))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, requirement)| requirement)
            .unwrap_or(&PUBLIC)
    }
}

/// Drop query and fragment, and any trailing slash except on the root.
pub(crate) fn normalize_path(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

/// Segment-wise prefix: `/admin` covers `/admin/users` but not `/administration`.
pub(crate) fn covers(prefix: &str, path: &str) -> bool {
    prefix == "/"
        || path == prefix
        || path.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bandportal_auth::UserProfile;
    use bandportal_core::UserId;

    fn signed_in(roles: &[&str]) -> AuthStateStore {
        let store = AuthStateStore::new();
        store.set_authenticated(Some(UserProfile::new(UserId::from(1), "Demo", "demo@blasmusik.com", roles)));
        store
    }

    #[test]
    fn musician_is_sent_to_unauthorized_not_login() {
        let guard = RouteGuard::new(signed_in(&["MUSICIAN"]));
        let decision = guard.check(&RouteRequirement::any_of([Role::Admin]), "/admin");
        assert_eq!(decision, GuardDecision::Deny(Redirect::Unauthorized));
        assert_eq!(
            decision.redirect().unwrap().location(&NavigationPaths::default()),
            "/unauthorized"
        );
    }

    #[test]
    fn anonymous_user_is_sent_to_login_with_return_url() {
        let guard = RouteGuard::new(AuthStateStore::new());
        let decision = guard.check(&RouteRequirement::Authenticated, "/member-gigs?season=2025");

        let redirect = decision.redirect().unwrap();
        assert_eq!(redirect, &Redirect::login("/member-gigs?season=2025"));
        assert_eq!(
            redirect.location(&NavigationPaths::default()),
            "/login?returnUrl=%2Fmember-gigs%3Fseason%3D2025"
        );
    }

    #[test]
    fn authenticated_user_passes_empty_requirement_and_matching_role() {
        let guard = RouteGuard::new(signed_in(&["ROLE_REPORTER"]));
        assert!(guard.check(&RouteRequirement::Authenticated, "/members").is_allowed());
        assert!(guard.check(&RouteRequirement::any_of([Role::Admin, Role::Reporter]), "/admin").is_allowed());
        assert!(guard.check(&RouteRequirement::Public, "/home").is_allowed());
    }

    #[test]
    fn public_routes_allow_anonymous_users() {
        let guard = RouteGuard::new(AuthStateStore::new());
        assert!(guard.check(&RouteRequirement::Public, "/gigs").is_allowed());
    }

    #[test]
    fn role_guards_are_independent_and_reusable() {
        let admin_only = role_guard([Role::Admin]);
        let gig_managers = role_guard([Role::Admin, Role::Reporter, Role::Conductor]);
        let reused = admin_only.clone();

        let conductor = signed_in(&["CONDUCTOR"]);
        assert!(!admin_only(&conductor, "/admin/users").is_allowed());
        assert!(!reused(&conductor, "/admin/content").is_allowed());
        assert!(gig_managers(&conductor, "/admin/gigs").is_allowed());

        let anonymous = AuthStateStore::new();
        assert_eq!(
            gig_managers(&anonymous, "/admin/gigs"),
            GuardDecision::Deny(Redirect::login("/admin/gigs"))
        );
    }

    #[test]
    fn route_table_uses_longest_segment_prefix() {
        let table = RouteTable::portal();
        assert_eq!(table.requirement_for("/members/42"), &RouteRequirement::Authenticated);
        assert_eq!(
            table.requirement_for("/admin/users?page=2"),
            &RouteRequirement::any_of([Role::Admin, Role::Reporter])
        );
        assert_eq!(
            table.requirement_for("/admin/gigs/"),
            &RouteRequirement::any_of([Role::Admin, Role::Reporter, Role::Conductor])
        );
        assert_eq!(table.requirement_for("/administration"), &RouteRequirement::Public);
        assert_eq!(table.requirement_for("/home"), &RouteRequirement::Public);
    }

    #[test]
    fn route_metadata_rejects_unknown_roles() {
        let table = RouteTable::new()
            .route_with_roles("/admin", Some(&["admin", "reporter"][..]))
            .unwrap();
        assert_eq!(
            table.requirement_for("/admin"),
            &RouteRequirement::any_of([Role::Admin, Role::Reporter])
        );

        let err = RouteTable::new()
            .route_with_roles("/admin", Some(&["kapellmeister"][..]))
            .unwrap_err();
        assert_eq!(err, RequirementError::UnknownRole("kapellmeister".into()));
    }

    #[test]
    fn navigate_consults_the_table() {
        let guard = RouteGuard::new(signed_in(&["CONDUCTOR"]));
        let table = RouteTable::portal();
        assert!(guard.navigate(&table, "/admin/gigs/new").is_allowed());
        assert_eq!(guard.navigate(&table, "/admin/users"), GuardDecision::Deny(Redirect::Unauthorized));
        assert!(guard.navigate(&table, "/about").is_allowed());
    }

    #[tokio::test]
    async fn check_settled_waits_for_in_flight_login() {
        let store = AuthStateStore::new();
        let guard = RouteGuard::new(store.clone());
        store.set_loading(true);

        let pending = {
            let guard = guard.clone();
            tokio::spawn(async move { guard.check_settled(&RouteRequirement::Authenticated, "/members").await })
        };

        tokio::task::yield_now().await;
        store.set_authenticated(Some(UserProfile::new(UserId::from(2), "M", "m@blasmusik.com", ["MUSICIAN"])));
        assert!(pending.await.unwrap().is_allowed());
    }
}
