use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::Permission;

/// Prefix convention used by the identity service for role authorities.
pub const ROLE_PREFIX: &str = "ROLE_";

/// Set of roles held by a user. Never empty once produced by [`map_roles`].
pub type RoleSet = BTreeSet<Role>;

/// Role identifier used for route- and UI-level gating.
///
/// The enumeration is closed. The hierarchy exposed by [`Role::rank`] is
/// advisory (display ordering only); access checks are set-membership.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Admin,
    Reporter,
    Conductor,
    SectionLeader,
    Musician,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Admin,
        Role::Reporter,
        Role::Conductor,
        Role::SectionLeader,
        Role::Musician,
    ];

    /// Assigned when nothing maps to a known role.
    pub const DEFAULT: Role = Role::Musician;

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Reporter => "REPORTER",
            Role::Conductor => "CONDUCTOR",
            Role::SectionLeader => "SECTION_LEADER",
            Role::Musician => "MUSICIAN",
        }
    }

    /// Authority string in the identity service's `ROLE_` convention.
    pub fn authority(&self) -> String {
        format!("{ROLE_PREFIX}{}", self.as_str())
    }

    /// Advisory privilege rank, lowest first.
    pub fn rank(&self) -> u8 {
        match self {
            Role::Musician => 0,
            Role::Conductor => 1,
            Role::Reporter | Role::SectionLeader => 2,
            Role::Admin => 3,
        }
    }

    /// Human-readable label shown in member dashboards.
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Admin => "Administrator",
            Role::Reporter => "Reporter",
            Role::Conductor => "Kapellmeister",
            Role::SectionLeader => "Registerführer",
            Role::Musician => "Musiker",
        }
    }

    /// Resolve a raw role or permission string to a known role.
    ///
    /// Accepts plain names (`"admin"`), authorities (`"ROLE_ADMIN"`) and
    /// role-scoped permissions (`"read:admin"`). Separators inside a name are
    /// not significant, so `"sectionleader"` and `"SECTION_LEADER"` agree.
    pub fn normalize(raw: &str) -> Option<Role> {
        let raw = raw.trim();
        let permission = Permission::new(raw.to_string());
        let candidate = if permission.is_scoped() {
            permission.role_scope()?.to_string()
        } else {
            raw.to_string()
        };

        let upper = candidate.to_ascii_uppercase().replace(['-', ' '], "_");
        if upper.is_empty() {
            return None;
        }
        let authority = if upper.starts_with(ROLE_PREFIX) {
            upper
        } else {
            format!("{ROLE_PREFIX}{upper}")
        };

        let key = compact(&authority);
        Role::ALL
            .into_iter()
            .find(|role| compact(&role.authority()) == key)
    }
}

fn compact(authority: &str) -> String {
    authority.chars().filter(|c| *c != '_').collect()
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::normalize(s).ok_or_else(|| format!("unknown role '{s}'"))
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Map raw role/permission strings to the canonical role set.
///
/// Unknown entries are dropped silently. The result is never empty: with no
/// recognized entry the user gets [`Role::DEFAULT`]. Mapping the output's own
/// names again yields the same set.
pub fn map_roles<I, S>(raw: I) -> RoleSet
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut roles: RoleSet = raw
        .into_iter()
        .filter_map(|entry| Role::normalize(entry.as_ref()))
        .collect();

    if roles.is_empty() {
        roles.insert(Role::DEFAULT);
    }
    roles
}

/// Roles ordered for display, most privileged first.
pub fn display_order(roles: &RoleSet) -> Vec<Role> {
    let mut ordered: Vec<Role> = roles.iter().copied().collect();
    ordered.sort_by(|a, b| b.rank().cmp(&a.rank()).then(a.cmp(b)));
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spellings_of_the_same_role_agree() {
        for raw in ["admin", "ADMIN", "ROLE_ADMIN", " role_admin ", "read:admin", "WRITE:ADMIN"] {
            assert_eq!(Role::normalize(raw), Some(Role::Admin), "{raw}");
        }
        for raw in ["sectionleader", "SECTION_LEADER", "section-leader", "write:sectionleader"] {
            assert_eq!(Role::normalize(raw), Some(Role::SectionLeader), "{raw}");
        }
    }

    #[test]
    fn unknown_strings_do_not_resolve() {
        for raw in ["", "user", "bogus:permission", "read:data", "delete:admin", "ROLE_"] {
            assert_eq!(Role::normalize(raw), None, "{raw}");
        }
    }

    #[test]
    fn admin_permission_maps_to_admin() {
        assert!(map_roles(["read:admin"]).contains(&Role::Admin));
    }

    #[test]
    fn unknown_permission_gets_only_the_default() {
        let roles = map_roles(["bogus:permission"]);
        assert_eq!(roles, RoleSet::from([Role::Musician]));
    }

    #[test]
    fn empty_input_gets_the_default() {
        assert_eq!(map_roles(Vec::<String>::new()), RoleSet::from([Role::DEFAULT]));
    }

    #[test]
    fn known_and_unknown_entries_mix() {
        let roles = map_roles(["ROLE_REPORTER", "read:data", "conductor", "ROLE_USER"]);
        assert_eq!(roles, RoleSet::from([Role::Reporter, Role::Conductor]));
    }

    #[test]
    fn display_order_puts_admin_first_and_musician_last() {
        let roles = RoleSet::from(Role::ALL);
        let ordered = display_order(&roles);
        assert_eq!(ordered.first(), Some(&Role::Admin));
        assert_eq!(ordered.last(), Some(&Role::Musician));
        assert_eq!(ordered[3], Role::Conductor);
    }

    #[test]
    fn serde_uses_bare_names_and_accepts_authorities() {
        assert_eq!(serde_json::to_string(&Role::SectionLeader).unwrap(), "\"SECTION_LEADER\"");
        let role: Role = serde_json::from_str("\"ROLE_CONDUCTOR\"").unwrap();
        assert_eq!(role, Role::Conductor);
        assert!(serde_json::from_str::<Role>("\"ROLE_USER\"").is_err());
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn raw_entry() -> impl Strategy<Value = String> {
            prop_oneof![
                "[a-zA-Z_:\\- ]{0,24}",
                prop::sample::select(vec![
                    "admin", "ROLE_REPORTER", "read:conductor", "write:sectionleader",
                    "musician", "read:admin", "bogus:permission", "user",
                ])
                .prop_map(str::to_string),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// Property: every input maps to at least one role.
            #[test]
            fn mapping_is_never_empty(raw in prop::collection::vec(raw_entry(), 0..8)) {
                prop_assert!(!map_roles(&raw).is_empty());
            }

            /// Property: mapping the mapper's own output is a fixpoint.
            #[test]
            fn mapping_is_idempotent(raw in prop::collection::vec(raw_entry(), 0..8)) {
                let once = map_roles(&raw);
                let twice = map_roles(once.iter().map(Role::as_str));
                prop_assert_eq!(&once, &twice);

                let via_authorities = map_roles(once.iter().map(Role::authority));
                prop_assert_eq!(once, via_authorities);
            }
        }
    }
}
