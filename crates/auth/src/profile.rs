use serde::{Deserialize, Serialize};

use bandportal_core::UserId;

use crate::{Role, RoleSet, map_roles};

/// Identity of the signed-in portal user.
///
/// Immutable once constructed: a refreshed identity replaces the profile
/// wholesale. The role set is never empty; constructors route raw role
/// strings through [`map_roles`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ProfileRecord", into = "ProfileRecord")]
pub struct UserProfile {
    id: UserId,
    display_name: String,
    email: String,
    roles: RoleSet,
}

impl UserProfile {
    /// Build a profile from raw role/permission strings.
    pub fn new<I, S>(id: UserId, display_name: impl Into<String>, email: impl Into<String>, raw_roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            id,
            display_name: display_name.into(),
            email: email.into(),
            roles: map_roles(raw_roles),
        }
    }

    /// Build a profile from already-mapped roles (empty falls back to the default).
    pub fn with_roles(id: UserId, display_name: impl Into<String>, email: impl Into<String>, roles: RoleSet) -> Self {
        Self::new(id, display_name, email, roles.iter().map(Role::as_str))
    }

    pub fn id(&self) -> &UserId {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn roles(&self) -> &RoleSet {
        &self.roles
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn has_any_role(&self, roles: &RoleSet) -> bool {
        !self.roles.is_disjoint(roles)
    }
}

/// Persisted/wire shape of a profile. Roles are re-mapped on the way in so a
/// hand-edited or stale record can never produce an empty role set.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProfileRecord {
    id: UserId,
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    roles: Vec<String>,
}

impl From<ProfileRecord> for UserProfile {
    fn from(record: ProfileRecord) -> Self {
        UserProfile::new(record.id, record.name, record.email, record.roles)
    }
}

impl From<UserProfile> for ProfileRecord {
    fn from(profile: UserProfile) -> Self {
        ProfileRecord {
            id: profile.id,
            name: profile.display_name,
            email: profile.email,
            roles: profile.roles.iter().map(|r| r.as_str().to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn roles_are_mapped_and_never_empty() {
        let profile = UserProfile::new(UserId::from(1), "Demo", "demo@blasmusik.com", ["ROLE_ADMIN", "ROLE_USER"]);
        assert_eq!(profile.roles(), &RoleSet::from([Role::Admin]));

        let bare = UserProfile::with_roles(UserId::from(2), "Bare", "bare@blasmusik.com", RoleSet::new());
        assert_eq!(bare.roles(), &RoleSet::from([Role::Musician]));
    }

    #[test]
    fn stored_record_round_trips_with_canonical_names() {
        let profile = UserProfile::new(UserId::from(3), "Anna", "anna@blasmusik.com", ["conductor", "read:reporter"]);
        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(value["name"], "Anna");
        assert_eq!(value["roles"], json!(["REPORTER", "CONDUCTOR"]));

        let back: UserProfile = serde_json::from_value(value).unwrap();
        assert_eq!(back, profile);
    }

    #[test]
    fn record_without_roles_gets_default() {
        let profile: UserProfile = serde_json::from_value(json!({ "id": 9, "name": "Max" })).unwrap();
        assert!(profile.has_role(Role::Musician));
        assert_eq!(profile.email(), "");
    }

    #[test]
    fn membership_checks() {
        let profile = UserProfile::new(UserId::from(4), "Lea", "lea@blasmusik.com", ["SECTION_LEADER"]);
        assert!(profile.has_any_role(&RoleSet::from([Role::Admin, Role::SectionLeader])));
        assert!(!profile.has_any_role(&RoleSet::from([Role::Admin])));
    }
}
