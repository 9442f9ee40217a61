//! Credential and destination value types shared across crates.

use std::fmt;

/// Access credentials for an object store account.
///
/// Compared by value. The secret is never printed by [`fmt::Debug`].
#[derive(Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessProfile {
    /// Public access key identifier.
    pub access_key_id: String,
    /// Secret access key used as the HMAC key.
    pub secret_access_key: String,
}

impl AccessProfile {
    /// Create a new access profile.
    #[must_use]
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }

    /// Whether both the key id and the secret are present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.access_key_id.is_empty() && !self.secret_access_key.is_empty()
    }
}

impl fmt::Debug for AccessProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessProfile")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Where objects for a destination identifier live: a bucket and a key prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    /// Bucket (or container) name.
    pub bucket: String,
    /// Prefix prepended to every object key. May be empty.
    #[serde(default)]
    pub key_prefix: String,
}

impl Destination {
    /// Create a new destination.
    #[must_use]
    pub fn new(bucket: impl Into<String>, key_prefix: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key_prefix: key_prefix.into(),
        }
    }

    /// Join the key prefix and `key` with exactly one `/` between them.
    ///
    /// # Examples
    ///
    /// ```
    /// use prism_core::Destination;
    ///
    /// let dest = Destination::new("photos", "nested/prefix/");
    /// assert_eq!(dest.object_path("a.jpg"), "nested/prefix/a.jpg");
    /// assert_eq!(Destination::new("photos", "").object_path("/a.jpg"), "a.jpg");
    /// ```
    #[must_use]
    pub fn object_path(&self, key: &str) -> String {
        let prefix = self.key_prefix.trim_matches('/');
        let key = key.trim_start_matches('/');
        match (prefix.is_empty(), key.is_empty()) {
            (true, _) => key.to_owned(),
            (false, true) => prefix.to_owned(),
            (false, false) => format!("{prefix}/{key}"),
        }
    }
}
