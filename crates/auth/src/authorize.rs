use thiserror::Error;

use crate::{Role, RoleSet, UserProfile};

/// Authorization requirement attached to a navigable route.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RouteRequirement {
    /// No authentication required.
    Public,

    /// Any authenticated user.
    #[default]
    Authenticated,

    /// Authenticated and holding at least one of the roles.
    AnyOf(RoleSet),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequirementError {
    #[error("route metadata names unknown role '{0}'")]
    UnknownRole(String),
}

impl RouteRequirement {
    /// Requirement for the given roles; an empty set means any authenticated user.
    pub fn any_of(roles: impl IntoIterator<Item = Role>) -> Self {
        let roles: RoleSet = roles.into_iter().collect();
        if roles.is_empty() {
            Self::Authenticated
        } else {
            Self::AnyOf(roles)
        }
    }

    /// Parse the optional role list declared as route data.
    ///
    /// Absent or empty means any authenticated user. Unlike token roles,
    /// route declarations are strict: an unknown name is a configuration
    /// error rather than being dropped, which would silently widen access.
    pub fn from_metadata<S: AsRef<str>>(roles: Option<&[S]>) -> Result<Self, RequirementError> {
        let Some(roles) = roles else {
            return Ok(Self::Authenticated);
        };

        let parsed = roles
            .iter()
            .map(|raw| Role::normalize(raw.as_ref()).ok_or_else(|| RequirementError::UnknownRole(raw.as_ref().to_string())))
            .collect::<Result<RoleSet, _>>()?;

        Ok(Self::any_of(parsed))
    }

    pub fn is_public(&self) -> bool {
        matches!(self, Self::Public)
    }

    pub fn required_roles(&self) -> Option<&RoleSet> {
        match self {
            Self::AnyOf(roles) => Some(roles),
            _ => None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("forbidden: requires one of {required:?}")]
    Forbidden { required: Vec<Role> },
}

/// Decide whether `user` (if signed in) satisfies `requirement`.
///
/// - No IO
/// - No panics
/// - Set-membership only; the role hierarchy is not consulted
pub fn authorize(user: Option<&UserProfile>, requirement: &RouteRequirement) -> Result<(), AuthzError> {
    match (requirement, user) {
        (RouteRequirement::Public, _) => Ok(()),
        (_, None) => Err(AuthzError::Unauthenticated),
        (RouteRequirement::Authenticated, Some(_)) => Ok(()),
        (RouteRequirement::AnyOf(required), Some(user)) => {
            if user.has_any_role(required) {
                Ok(())
            } else {
                Err(AuthzError::Forbidden {
                    required: required.iter().copied().collect(),
                })
            }
        }
    }
}
