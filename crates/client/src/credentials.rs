//! Credential Store: durable persistence of tokens and the cached profile.
//!
//! Never fails towards the caller. A missing storage medium reads as empty
//! and ignores writes; storage errors are logged and swallowed; a corrupt
//! cached profile is purged and reads as absent.

use std::sync::Arc;

use bandportal_auth::UserProfile;

use crate::storage::KeyValueStorage;

/// Bearer credentials issued by the identity service.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    access_token: String,
    refresh_token: String,
}

impl Credentials {
    /// `refresh_token` may be empty when the service issues none.
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> Option<&str> {
        Some(self.refresh_token.as_str()).filter(|t| !t.is_empty())
    }
}

impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &if self.refresh_token.is_empty() { "<none>" } else { "<redacted>" })
            .finish()
    }
}

/// The three persisted entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    pub access_token: String,
    pub refresh_token: String,
    pub user: String,
}

impl StorageKeys {
    pub fn namespaced(namespace: &str) -> Self {
        Self {
            access_token: format!("{namespace}_token"),
            refresh_token: format!("{namespace}_refresh_token"),
            user: format!("{namespace}_user"),
        }
    }
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self::namespaced("blasmusik")
    }
}

/// Everything needed to resume a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub credentials: Credentials,
    pub profile: UserProfile,
}

#[derive(Debug, Clone)]
pub struct CredentialStore {
    storage: Option<Arc<dyn KeyValueStorage>>,
    keys: StorageKeys,
}

impl CredentialStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>, keys: StorageKeys) -> Self {
        Self {
            storage: Some(storage),
            keys,
        }
    }

    /// A store with no medium behind it (reads empty, writes are no-ops).
    pub fn detached(keys: StorageKeys) -> Self {
        Self { storage: None, keys }
    }

    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    pub fn save(&self, credentials: &Credentials, profile: &UserProfile) {
        self.write(&self.keys.access_token, &credentials.access_token);
        self.write(&self.keys.refresh_token, &credentials.refresh_token);
        self.save_profile(profile);
    }

    pub fn save_profile(&self, profile: &UserProfile) {
        match serde_json::to_string(profile) {
            Ok(json) => self.write(&self.keys.user, &json),
            Err(err) => tracing::warn!(error = %err, "failed to serialize profile; not persisted"),
        }
    }

    /// Stored session, if both an access token and a readable profile exist.
    pub fn load(&self) -> Option<StoredSession> {
        let access_token = self.access_token()?;
        let profile = self.profile()?;
        let refresh_token = self.read(&self.keys.refresh_token).unwrap_or_default();

        Some(StoredSession {
            credentials: Credentials::new(access_token, refresh_token),
            profile,
        })
    }

    pub fn clear(&self) {
        self.delete(&self.keys.access_token);
        self.delete(&self.keys.refresh_token);
        self.delete(&self.keys.user);
    }

    pub fn access_token(&self) -> Option<String> {
        self.read(&self.keys.access_token).filter(|t| !t.is_empty())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read(&self.keys.refresh_token).filter(|t| !t.is_empty())
    }

    /// Cached profile. Corrupt JSON is removed and reads as absent.
    pub fn profile(&self) -> Option<UserProfile> {
        let raw = self.read(&self.keys.user)?;
        match serde_json::from_str(&raw) {
            Ok(profile) => Some(profile),
            Err(err) => {
                tracing::warn!(error = %err, key = %self.keys.user, "purging corrupt cached profile");
                self.delete(&self.keys.user);
                None
            }
        }
    }

    fn read(&self, key: &str) -> Option<String> {
        let storage = self.storage.as_ref()?;
        match storage.get(key) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(error = %err, key, "credential storage read failed; treating as empty");
                None
            }
        }
    }

    fn write(&self, key: &str, value: &str) {
        let Some(storage) = self.storage.as_ref() else {
            return;
        };
        if let Err(err) = storage.set(key, value) {
            tracing::warn!(error = %err, key, "credential storage write failed");
        }
    }

    fn delete(&self, key: &str) {
        let Some(storage) = self.storage.as_ref() else {
            return;
        };
        if let Err(err) = storage.remove(key) {
            tracing::warn!(error = %err, key, "credential storage remove failed");
        }
    }
}
