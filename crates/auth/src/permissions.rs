use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission claim carried in an access token.
///
/// Permissions are modeled as opaque strings (e.g. `"read:admin"`). Scoped
/// permissions follow the `<action>:<scope>` convention used by the identity
/// service; only the `read` and `write` actions name a role scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the scope of a `read:`/`write:` permission, if it is one.
    ///
    /// ```
    /// use bandportal_auth::Permission;
    ///
    /// assert_eq!(Permission::new("write:conductor").role_scope(), Some("conductor"));
    /// assert_eq!(Permission::new("delete:conductor").role_scope(), None);
    /// assert_eq!(Permission::new("admin").role_scope(), None);
    /// ```
    pub fn role_scope(&self) -> Option<&str> {
        let (action, scope) = self.as_str().split_once(':')?;
        let action = action.trim();
        if action.eq_ignore_ascii_case("read") || action.eq_ignore_ascii_case("write") {
            Some(scope.trim())
        } else {
            None
        }
    }

    /// Whether the string uses the `<action>:<scope>` shape at all.
    pub fn is_scoped(&self) -> bool {
        self.as_str().contains(':')
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Permission {
    fn from(value: String) -> Self {
        Self(Cow::Owned(value))
    }
}

impl From<&'static str> for Permission {
    fn from(value: &'static str) -> Self {
        Self(Cow::Borrowed(value))
    }
}
