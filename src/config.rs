//! Client configuration.

use std::time::Duration;

use crate::error::ArmoryError;
use crate::locator::{build_url, build_url_with_base};

/// Firefox user agent; the Armory only serves raw XML to browsers it
/// recognises, and falls back to an HTML shell otherwise.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows; U; Windows NT 5.1; en-GB; rv:1.9.0.4) Gecko/2008102920 Firefox/3.0.4";

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Settings for the HTTP document source and URL construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ArmoryConfig {
    /// Replaces the regional Armory host, e.g. for a local mirror
    pub base_url: Option<String>,
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for ArmoryConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("ARMORY_BASE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            user_agent: std::env::var("ARMORY_USER_AGENT")
                .unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string()),
            timeout: Duration::from_secs(
                std::env::var("ARMORY_TIMEOUT_SECS")
                    .ok()
                    .and_then(|secs| secs.parse().ok())
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
        }
    }
}

impl ArmoryConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// URL of `file` for a character, on `base_url` when one is configured.
    pub fn url_for(
        &self,
        location: &str,
        realm: &str,
        name: &str,
        file: &str,
    ) -> Result<String, ArmoryError> {
        match &self.base_url {
            Some(base) => build_url_with_base(base, realm, name, file),
            None => build_url(location, realm, name, file),
        }
    }
}
