//! HTTP retrieval of verification keys from `/webhook_verification_key/get`.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::Error;
use crate::key_store::KeyFetcher;
use crate::types::key::{GetVerificationKeyRequest, GetVerificationKeyResponse, VerificationKey};

/// Path of the key retrieval endpoint.
pub const VERIFICATION_KEY_PATH: &str = "/webhook_verification_key/get";

/// API error code for a `key_id` the service does not know.
pub const UNKNOWN_KEY_ERROR_CODE: &str = "INVALID_WEBHOOK_VERIFICATION_KEY_ID";

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
}

/// Map a non-success response to the error the key store expects.
fn classify_failure(status: StatusCode, body: &str, kid: &str) -> Error {
    let api_error = serde_json::from_str::<ApiErrorBody>(body).ok();
    let code = api_error.as_ref().and_then(|e| e.error_code.as_deref());

    if code == Some(UNKNOWN_KEY_ERROR_CODE) {
        return Error::KeyNotFound {
            kid: kid.to_string(),
        };
    }

    let detail = api_error
        .and_then(|e| e.error_message)
        .or_else(|| status.canonical_reason().map(str::to_string))
        .unwrap_or_default();
    Error::KeyFetchFailed(format!("HTTP {}: {}", status.as_u16(), detail))
}

/// [`KeyFetcher`] backed by the remote key retrieval endpoint.
pub struct PlaidKeyFetcher {
    client: reqwest::Client,
    endpoint: String,
    client_id: String,
    secret: String,
}

impl PlaidKeyFetcher {
    /// Build a fetcher for the configured environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyFetchFailed`] if the HTTP client cannot be
    /// constructed.
    pub fn new(config: &ClientConfig) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::KeyFetchFailed(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}{}", config.base_url(), VERIFICATION_KEY_PATH),
            client_id: config.client_id.clone(),
            secret: config.secret.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl KeyFetcher for PlaidKeyFetcher {
    async fn fetch_key(&self, kid: &str) -> Result<VerificationKey, Error> {
        if kid.is_empty() {
            return Err(Error::KeyFetchFailed(
                "key ID must be specified".to_string(),
            ));
        }

        let request = GetVerificationKeyRequest {
            client_id: &self.client_id,
            secret: &self.secret,
            key_id: kid,
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                Error::KeyFetchFailed(format!("Failed to fetch {}: {}", self.endpoint, e))
            })?;

        let status = resp.status();
        debug!(%status, "key endpoint responded");

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_failure(status, &body, kid));
        }

        let body: GetVerificationKeyResponse = resp.json().await.map_err(|e| {
            Error::KeyFetchFailed(format!("Invalid JSON from {}: {}", self.endpoint, e))
        })?;

        VerificationKey::try_from(body.key)
    }
}
