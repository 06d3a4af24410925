//! Immutable registry of Slack apps allowed to talk to the relay.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
/// Errors raised while loading the Slack app registry.
pub enum AppRegistryError {
    #[error("failed to read slack app registry {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse slack app registry: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("slack app registry entry {index} has an empty appID")]
    EmptyAppId { index: usize },
    #[error("slack app registry contains duplicate appID '{0}'")]
    DuplicateAppId(String),
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Credentials for one Slack app that sends slash commands to the relay.
pub struct AppRegistration {
    #[serde(rename = "appID")]
    pub app_id: String,
    /// Secret used to verify inbound request signatures.
    #[serde(rename = "appSigningSecret")]
    pub signing_secret: String,
    /// Bearer token used to post messages back to Slack.
    #[serde(rename = "apiToken")]
    pub api_token: String,
}

impl fmt::Debug for AppRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppRegistration")
            .field("app_id", &self.app_id)
            .field("signing_secret", &"<redacted>")
            .field("api_token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
/// Lookup of [`AppRegistration`] by app id. Never mutated after construction.
pub struct AppRegistry {
    apps: HashMap<String, AppRegistration>,
}

impl AppRegistry {
    pub fn from_registrations(
        registrations: impl IntoIterator<Item = AppRegistration>,
    ) -> Result<Self, AppRegistryError> {
        let mut apps = HashMap::new();
        for (index, registration) in registrations.into_iter().enumerate() {
            if registration.app_id.trim().is_empty() {
                return Err(AppRegistryError::EmptyAppId { index });
            }
            if apps.contains_key(&registration.app_id) {
                return Err(AppRegistryError::DuplicateAppId(registration.app_id));
            }
            apps.insert(registration.app_id.clone(), registration);
        }
        Ok(Self { apps })
    }

    pub fn get(&self, app_id: &str) -> Option<&AppRegistration> {
        self.apps.get(app_id)
    }

    /// Returns the signing secret for `app_id`, or `None` when the app is
    /// unknown or registered with an empty secret.
    pub fn signing_secret(&self, app_id: &str) -> Option<&str> {
        self.apps
            .get(app_id)
            .map(|app| app.signing_secret.as_str())
            .filter(|secret| !secret.is_empty())
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    pub fn app_ids(&self) -> Vec<&str> {
        let mut ids = self.apps.keys().map(String::as_str).collect::<Vec<_>>();
        ids.sort_unstable();
        ids
    }
}

/// Parses a JSON array of `{appID, appSigningSecret, apiToken}` records.
pub fn parse_app_registry(raw: &str) -> Result<AppRegistry, AppRegistryError> {
    let registrations = serde_json::from_str::<Vec<AppRegistration>>(raw)?;
    AppRegistry::from_registrations(registrations)
}

pub fn load_app_registry(path: &Path) -> Result<AppRegistry, AppRegistryError> {
    let raw = std::fs::read_to_string(path).map_err(|source| AppRegistryError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_app_registry(&raw)
}
