//! `bandportal-auth`: pure authorization boundary for the portal.
//!
//! This crate is intentionally decoupled from HTTP and storage: it decodes
//! access-token claims, maps permissions to roles, and answers set-membership
//! questions about route requirements.

pub mod authorize;
pub mod claims;
pub mod permissions;
pub mod profile;
pub mod roles;

pub use authorize::{AuthzError, RequirementError, RouteRequirement, authorize};
pub use claims::{AccessClaims, ClaimsError, decode_claims, permissions_from_token};
pub use permissions::Permission;
pub use profile::UserProfile;
pub use roles::{Role, RoleSet, map_roles};
