//! Destination profiles file loader.
//!
//! The file names access profiles and destinations that refer to them:
//!
//! ```json
//! {
//!   "accessProfiles": {
//!     "main": { "accessKeyId": "AKID", "secretAccessKey": "SECRET" }
//!   },
//!   "destinations": {
//!     "previews": { "bucket": "my-photos", "key": "nested/key", "profile": "main" }
//!   }
//! }
//! ```
//!
//! Entries with missing fields or an unknown profile are logged and skipped.

use std::collections::BTreeMap;
use std::path::Path;

use prism_core::{AccessProfile, Destination};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::client::ObjectStoreClient;
use crate::error::ProfilesError;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfilesFile {
    #[serde(default)]
    access_profiles: BTreeMap<String, ProfileEntry>,
    #[serde(default)]
    destinations: BTreeMap<String, DestinationEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileEntry {
    access_key_id: Option<String>,
    secret_access_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DestinationEntry {
    bucket: Option<String>,
    key: Option<String>,
    profile: Option<String>,
}

/// Load the profiles file at `path` and register every complete destination
/// with `client`.
///
/// Returns the number of destinations registered.
pub fn load_profiles(path: &Path, client: &ObjectStoreClient) -> Result<usize, ProfilesError> {
    let contents = std::fs::read_to_string(path).inspect_err(|err| {
        error!(path = %path.display(), error = %err, "failed to read profiles file");
    })?;
    let file: ProfilesFile = serde_json::from_str(&contents).inspect_err(|err| {
        error!(path = %path.display(), error = %err, "failed to parse profiles file");
    })?;

    let profiles = parse_profiles(file.access_profiles);
    let mut registered = 0;

    for (name, entry) in file.destinations {
        let (Some(bucket), Some(key), Some(profile_name)) = (
            require(&name, "bucket", entry.bucket),
            require(&name, "key", entry.key),
            require(&name, "profile", entry.profile),
        ) else {
            continue;
        };

        let Some(profile) = profiles.get(&profile_name) else {
            error!(destination = %name, profile = %profile_name, "failed to find access profile for destination");
            continue;
        };

        if client
            .register_destination(&name, profile.clone(), Destination::new(bucket, key))
            .is_ok()
        {
            registered += 1;
        }
    }

    info!(path = %path.display(), registered, "loaded destination profiles");
    Ok(registered)
}

fn parse_profiles(entries: BTreeMap<String, ProfileEntry>) -> BTreeMap<String, AccessProfile> {
    entries
        .into_iter()
        .filter_map(|(name, entry)| {
            let access_key_id = require(&name, "accessKeyId", entry.access_key_id)?;
            let secret = require(&name, "secretAccessKey", entry.secret_access_key)?;
            Some((name, AccessProfile::new(access_key_id, secret)))
        })
        .collect()
}

fn require(object: &str, field: &str, value: Option<String>) -> Option<String> {
    if value.is_none() {
        warn!(object, field, "missing field, skipping entry");
    }
    value
}
