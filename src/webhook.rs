use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, TimeZone, Utc};
use tracing::{debug, instrument, warn, Span};

use crate::config::AuthenticatorConfig;
use crate::crypto;
use crate::error::Error;
use crate::key_store::{KeyFetcher, KeyStore};
use crate::token;
use crate::types::webhook::{VerifiedWebhook, WebhookClaims};

/// Header carrying the signed verification token.
pub const VERIFICATION_HEADER: &str = "Plaid-Verification";

/// Default accepted clock difference between `iat` and local time.
pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(5 * 60);

/// Authenticates inbound webhook deliveries.
///
/// Share one instance (behind an `Arc`) across request handlers so that the
/// key cache is shared too.
pub struct WebhookAuthenticator<F> {
    keys: KeyStore<F>,
    tolerance: Duration,
}

impl<F: KeyFetcher> WebhookAuthenticator<F> {
    pub fn new(keys: KeyStore<F>) -> Self {
        Self {
            keys,
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    pub fn from_config(fetcher: F, config: &AuthenticatorConfig) -> Self {
        let keys = KeyStore::new(fetcher).with_fetch_timeout(config.fetch_timeout());
        Self::new(keys).with_tolerance(config.tolerance())
    }

    pub fn with_tolerance(mut self, tolerance: Duration) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn key_store(&self) -> &KeyStore<F> {
        &self.keys
    }

    /// Authenticate a delivery given its token and the raw body bytes as
    /// received, before any JSON decoding.
    ///
    /// Implements a 6-step flow:
    /// 1. Decode the token
    /// 2. Resolve the signing key
    /// 3. Verify the ES256 signature
    /// 4. Match the body digest (constant time)
    /// 5. Check `iat` freshness
    /// 6. Parse the notification
    ///
    /// Every failure is logged here with its detail; the returned error kind
    /// is what the caller acts on.
    ///
    /// # Errors
    ///
    /// * [`Error::MalformedToken`] if the token cannot be decoded
    /// * [`Error::KeyNotFound`], [`Error::KeyExpired`] or
    ///   [`Error::KeyFetchFailed`] from key resolution
    /// * [`Error::SignatureInvalid`] if the signature does not verify
    /// * [`Error::BodyMismatch`] if the body digest differs
    /// * [`Error::StaleToken`] if `iat` is outside the tolerance window
    /// * [`Error::MalformedBody`] if the verified body is not a webhook
    #[instrument(skip_all, fields(kid))]
    pub async fn authenticate(
        &self,
        token: &str,
        raw_body: &[u8],
    ) -> Result<VerifiedWebhook, Error> {
        let result = self.run(token, raw_body).await;
        match &result {
            Ok(webhook) => debug!(
                webhook_type = %webhook.claims.webhook_type,
                webhook_code = %webhook.claims.webhook_code,
                "webhook authenticated"
            ),
            Err(e) => warn!(code = %e.code(), error = %e, "webhook rejected"),
        }
        result
    }

    /// Like [`authenticate`](Self::authenticate), reading the token from
    /// the [`VERIFICATION_HEADER`] (case-insensitive).
    pub async fn authenticate_headers(
        &self,
        headers: &[(String, String)],
        raw_body: &[u8],
    ) -> Result<VerifiedWebhook, Error> {
        let token = find_header(headers, VERIFICATION_HEADER).ok_or_else(|| {
            Error::MalformedToken(format!("missing {} header", VERIFICATION_HEADER))
        })?;
        self.authenticate(token, raw_body).await
    }

    async fn run(&self, token: &str, raw_body: &[u8]) -> Result<VerifiedWebhook, Error> {
        // Step 1: Decode the token
        let decoded = token::decode(token)?;
        Span::current().record("kid", decoded.kid.as_str());

        // Step 2: Resolve the signing key
        let key = self.keys.resolve(&decoded.kid).await?;

        // Step 3: Verify the signature before reading any claim
        if let Err(reason) = crypto::verify_detailed(
            &decoded.header_bytes,
            &decoded.payload_bytes,
            &decoded.signature,
            &key,
        ) {
            warn!(%reason, "signature check failed");
            return Err(Error::SignatureInvalid);
        }
        let claims = decoded.claims()?;

        // Step 4: Bind the token to this body
        let declared = decode_digest(&claims.request_body_sha256).ok_or(Error::BodyMismatch)?;
        let actual = crypto::sha256_digest(raw_body);
        if !crypto::digests_match(&declared, &actual) {
            return Err(Error::BodyMismatch);
        }

        // Step 5: Freshness
        let now = Utc::now();
        let issued_at = iat_timestamp(claims.iat);
        check_freshness(issued_at, now, self.tolerance)?;

        // Step 6: Parse the now-authentic body
        let webhook: WebhookClaims = serde_json::from_slice(raw_body)
            .map_err(|e| Error::MalformedBody(e.to_string()))?;

        Ok(VerifiedWebhook {
            claims: webhook,
            issued_at,
            key_id: decoded.kid,
        })
    }
}

/// Reject `issued_at` further than `tolerance` from `now` in either direction.
pub fn check_freshness(
    issued_at: DateTime<Utc>,
    now: DateTime<Utc>,
    tolerance: Duration,
) -> Result<(), Error> {
    let skew = (now - issued_at).num_seconds().unsigned_abs();
    if skew > tolerance.as_secs() {
        return Err(Error::StaleToken { issued_at, now });
    }
    Ok(())
}

/// `iat` as a timestamp, clamped to the representable range so that
/// out-of-range values still fail the freshness check.
fn iat_timestamp(iat: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(iat, 0).single().unwrap_or(if iat < 0 {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}

/// Declared body digest: hex as the service sends it, or standard base64.
fn decode_digest(declared: &str) -> Option<Vec<u8>> {
    hex::decode(declared)
        .ok()
        .or_else(|| STANDARD.decode(declared).ok())
}

/// Find a header value by name (case-insensitive).
fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}
