//! Auth flow configuration parsed from environment variables.

use std::time::Duration;

use crate::navigation::Route;
use crate::provider::OAuthProvider;

pub const DEFAULT_SITE_URL: &str = "http://localhost:3000";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown DJWYA_OAUTH_PROVIDER: {0}")]
    UnknownProvider(String),
    #[error("DJWYA_SITE_URL must be an absolute http(s) URL, got '{0}'")]
    InvalidSiteUrl(String),
    #[error("invalid DJWYA_CALLBACK_TIMEOUT_SECS: {0}")]
    InvalidTimeout(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    /// Public origin of the site, without a trailing slash.
    pub site_url: String,
    pub oauth_provider: OAuthProvider,
    /// How long the callback page may stay pending. `None` waits forever.
    pub callback_timeout: Option<Duration>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            site_url: DEFAULT_SITE_URL.to_owned(),
            oauth_provider: OAuthProvider::Google,
            callback_timeout: None,
        }
    }
}

impl AuthConfig {
    /// Build config from environment variables.
    ///
    /// Optional:
    /// - `DJWYA_SITE_URL`: default `http://localhost:3000`
    /// - `DJWYA_OAUTH_PROVIDER`: `google` (default)
    /// - `DJWYA_CALLBACK_TIMEOUT_SECS`: unset or `0` disables the timeout
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any variable is present but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let site_url = parse_site_url(std::env::var("DJWYA_SITE_URL").ok().as_deref())?;
        let oauth_provider = parse_provider(std::env::var("DJWYA_OAUTH_PROVIDER").ok().as_deref())?;
        let callback_timeout = parse_timeout(std::env::var("DJWYA_CALLBACK_TIMEOUT_SECS").ok().as_deref())?;
        Ok(Self { site_url, oauth_provider, callback_timeout })
    }

    /// Absolute URL the identity provider redirects back to.
    #[must_use]
    pub fn callback_url(&self) -> String {
        Route::AuthCallback.absolute_url(&self.site_url)
    }
}

fn parse_site_url(raw: Option<&str>) -> Result<String, ConfigError> {
    let url = raw.map_or(DEFAULT_SITE_URL, str::trim).trim_end_matches('/');
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(url.to_owned())
    } else {
        Err(ConfigError::InvalidSiteUrl(url.to_owned()))
    }
}

fn parse_provider(raw: Option<&str>) -> Result<OAuthProvider, ConfigError> {
    let raw = raw.unwrap_or("google");
    OAuthProvider::parse(raw).ok_or_else(|| ConfigError::UnknownProvider(raw.to_owned()))
}

fn parse_timeout(raw: Option<&str>) -> Result<Option<Duration>, ConfigError> {
    let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    match raw.parse::<u64>() {
        Ok(0) => Ok(None),
        Ok(secs) => Ok(Some(Duration::from_secs(secs))),
        Err(_) => Err(ConfigError::InvalidTimeout(raw.to_owned())),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
