//! Typed configuration. Where the values come from (files, environment,
//! a secrets manager) is up to the caller.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Remote API environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Sandbox,
    Development,
    Production,
}

impl Environment {
    pub fn base_url(&self) -> &'static str {
        match self {
            Environment::Sandbox => "https://sandbox.plaid.com",
            Environment::Development => "https://development.plaid.com",
            Environment::Production => "https://production.plaid.com",
        }
    }
}

/// Credentials and transport settings for calls to the remote API.
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub environment: Environment,
    /// Overrides the environment's base URL (proxies, test servers).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub client_id: String,
    pub secret: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl ClientConfig {
    pub fn new(environment: Environment, client_id: &str, secret: &str) -> Self {
        Self {
            environment,
            base_url: None,
            client_id: client_id.to_string(),
            secret: secret.to_string(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = Some(base_url.trim_end_matches('/').to_string());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = timeout.as_secs().max(1);
        self
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.environment.base_url())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("environment", &self.environment)
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("secret", &"<REDACTED>")
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Settings for [`WebhookAuthenticator`](crate::webhook::WebhookAuthenticator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatorConfig {
    /// Accepted clock difference, either direction, between a token's
    /// `iat` and local time.
    #[serde(default = "default_tolerance_secs")]
    pub tolerance_secs: u64,
    /// Bound on a single key fetch.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

fn default_tolerance_secs() -> u64 {
    5 * 60
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

impl Default for AuthenticatorConfig {
    fn default() -> Self {
        Self {
            tolerance_secs: default_tolerance_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

impl AuthenticatorConfig {
    pub fn with_tolerance(mut self, tolerance: Duration) -> Self {
        self.tolerance_secs = tolerance.as_secs();
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout_secs = timeout.as_secs();
        self
    }

    pub fn tolerance(&self) -> Duration {
        Duration::from_secs(self.tolerance_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}
