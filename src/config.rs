//! Edit service configuration.

use std::fmt;

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";

/// Public Gemini REST endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";

/// Connection settings for [`GeminiClient`](crate::client::GeminiClient).
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Credential sent with every request. A missing key fails the request, not startup.
    pub api_key: Option<String>,
    /// Model name, e.g. `gemini-2.5-flash-image`.
    pub model: String,
    /// Base URL of the service, without the `/v1beta/...` path.
    pub endpoint: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }
}

impl ServiceConfig {
    /// Read settings from the process environment.
    ///
    /// - `GEMINI_API_KEY` (falls back to `API_KEY`)
    /// - `NEON_ERASER_MODEL`
    /// - `NEON_ERASER_ENDPOINT`
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup. Empty values count as unset.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            api_key: get("GEMINI_API_KEY").or_else(|| get("API_KEY")),
            model: get("NEON_ERASER_MODEL").unwrap_or(defaults.model),
            endpoint: get("NEON_ERASER_ENDPOINT").unwrap_or(defaults.endpoint),
        }
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}
