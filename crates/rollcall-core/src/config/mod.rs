//! Remote collection configuration.
//!
//! Shared by the CLI config file and environment overrides. Values are public
//! project identifiers; the optional API key and bearer token are transport
//! credentials only.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

pub const DEFAULT_ENDPOINT: &str = "https://firestore.googleapis.com";
pub const DEFAULT_DATABASE: &str = "(default)";
pub const DEFAULT_COLLECTION: &str = "guests";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Where the shared guest collection lives.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RemoteConfig {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub collection: Option<String>,
    /// Firestore endpoint; point at an emulator with `http://localhost:8080`
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
}

impl RemoteConfig {
    /// Read overrides from `ROLLCALL_*` environment variables.
    pub fn from_env() -> Self {
        let var = |name: &str| normalize_text_option(std::env::var(name).ok());
        Self {
            project_id: var("ROLLCALL_FIRESTORE_PROJECT"),
            database: var("ROLLCALL_FIRESTORE_DATABASE"),
            collection: var("ROLLCALL_COLLECTION"),
            endpoint: var("ROLLCALL_FIRESTORE_ENDPOINT"),
            api_key: var("ROLLCALL_FIRESTORE_API_KEY"),
            auth_token: var("ROLLCALL_FIRESTORE_TOKEN"),
            poll_interval_secs: var("ROLLCALL_POLL_INTERVAL_SECS")
                .and_then(|value| value.parse().ok()),
        }
    }

    /// Fill every unset field from `fallback`.
    #[must_use]
    pub fn or(self, fallback: Self) -> Self {
        Self {
            project_id: self.project_id.or(fallback.project_id),
            database: self.database.or(fallback.database),
            collection: self.collection.or(fallback.collection),
            endpoint: self.endpoint.or(fallback.endpoint),
            api_key: self.api_key.or(fallback.api_key),
            auth_token: self.auth_token.or(fallback.auth_token),
            poll_interval_secs: self.poll_interval_secs.or(fallback.poll_interval_secs),
        }
    }

    /// Trim every text field and drop empty values.
    pub fn normalize(&mut self) {
        self.project_id = normalize_text_option(self.project_id.take());
        self.database = normalize_text_option(self.database.take());
        self.collection = normalize_text_option(self.collection.take());
        self.endpoint = normalize_text_option(self.endpoint.take())
            .map(|endpoint| endpoint.trim_end_matches('/').to_string());
        self.api_key = normalize_text_option(self.api_key.take());
        self.auth_token = normalize_text_option(self.auth_token.take());
        self.poll_interval_secs = self.poll_interval_secs.filter(|secs| *secs > 0);
    }

    pub fn is_configured(&self) -> bool {
        normalize_text_option(self.project_id.clone()).is_some()
    }

    pub fn validate(&self) -> Result<()> {
        if !self.is_configured() {
            return Err(Error::InvalidInput(
                "remote project_id is required".to_string(),
            ));
        }
        if !is_http_url(&self.endpoint()) {
            return Err(Error::InvalidInput(
                "remote endpoint must include http:// or https://".to_string(),
            ));
        }
        if self.collection().contains('/') {
            return Err(Error::InvalidInput(
                "remote collection must be a top-level collection name".to_string(),
            ));
        }
        Ok(())
    }

    pub fn project_id(&self) -> String {
        normalize_text_option(self.project_id.clone()).unwrap_or_default()
    }

    pub fn database(&self) -> String {
        normalize_text_option(self.database.clone()).unwrap_or_else(|| DEFAULT_DATABASE.into())
    }

    pub fn collection(&self) -> String {
        normalize_text_option(self.collection.clone())
            .unwrap_or_else(|| DEFAULT_COLLECTION.into())
    }

    pub fn endpoint(&self) -> String {
        normalize_text_option(self.endpoint.clone())
            .map_or_else(|| DEFAULT_ENDPOINT.into(), |endpoint| {
                endpoint.trim_end_matches('/').to_string()
            })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(
            self.poll_interval_secs
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
        )
    }
}
