//! Fixtures for exercising webhook verification without the remote service.
//!
//! Available to this crate's tests and, with the `testutil` feature, to
//! downstream tests that need to mint signed deliveries.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, TimeZone, Utc};
use p256::ecdsa::{signature::Signer, Signature, SigningKey};
use parking_lot::Mutex;
use rand::rngs::OsRng;
use serde_json::json;

use crate::crypto::{self, ALGORITHM, CURVE};
use crate::error::Error;
use crate::key_store::KeyFetcher;
use crate::types::key::VerificationKey;

/// A freshly generated P-256 key that signs tokens the way the remote
/// service does.
pub struct TestSigner {
    kid: String,
    signing_key: SigningKey,
    created_at: DateTime<Utc>,
    expired_at: Option<DateTime<Utc>>,
}

impl TestSigner {
    pub fn new(kid: &str) -> Self {
        let created_at = Utc
            .timestamp_opt(Utc::now().timestamp(), 0)
            .single()
            .unwrap_or_else(Utc::now);
        Self {
            kid: kid.to_string(),
            signing_key: SigningKey::random(&mut OsRng),
            created_at,
            expired_at: None,
        }
    }

    pub fn with_expiry(mut self, expired_at: DateTime<Utc>) -> Self {
        self.expired_at = Some(expired_at);
        self
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// The public half, as the key endpoint would return it.
    pub fn verification_key(&self) -> VerificationKey {
        let point = self.signing_key.verifying_key().to_encoded_point(false);
        VerificationKey {
            kid: self.kid.clone(),
            alg: ALGORITHM.to_string(),
            crv: CURVE.to_string(),
            x: point.x().map(|x| x.to_vec()).unwrap_or_default(),
            y: point.y().map(|y| y.to_vec()).unwrap_or_default(),
            created_at: self.created_at,
            expired_at: self.expired_at,
        }
    }

    /// Raw `r || s` signature over the signing input of `header.payload`.
    pub fn sign_raw(&self, header: &[u8], payload: &[u8]) -> Vec<u8> {
        let message = crypto::signing_input(header, payload);
        let signature: Signature = self.signing_key.sign(message.as_bytes());
        signature.to_bytes().to_vec()
    }

    /// Assemble a compact token from raw header and payload JSON.
    pub fn token_from_parts(&self, header: &[u8], payload: &[u8]) -> String {
        let signature = self.sign_raw(header, payload);
        format!(
            "{}.{}",
            crypto::signing_input(header, payload),
            URL_SAFE_NO_PAD.encode(signature)
        )
    }

    /// Token for `body` issued at `iat` (Unix seconds).
    pub fn token_for_body(&self, body: &[u8], iat: i64) -> String {
        self.token_with_digest(&hex::encode(crypto::sha256_digest(body)), iat)
    }

    /// Token declaring an arbitrary body digest.
    pub fn token_with_digest(&self, digest: &str, iat: i64) -> String {
        let header = json!({ "alg": ALGORITHM, "kid": self.kid, "typ": "JWT" });
        let payload = json!({ "iat": iat, "request_body_sha256": digest });
        self.token_from_parts(header.to_string().as_bytes(), payload.to_string().as_bytes())
    }
}

/// In-memory [`KeyFetcher`] that counts calls and can be told to fail or
/// stall.
#[derive(Default)]
pub struct CountingFetcher {
    keys: Mutex<HashMap<String, VerificationKey>>,
    calls: AtomicUsize,
    failing: AtomicBool,
    delay: Option<Duration>,
}

impl CountingFetcher {
    pub fn new(keys: impl IntoIterator<Item = VerificationKey>) -> Self {
        Self {
            keys: Mutex::new(keys.into_iter().map(|k| (k.kid.clone(), k)).collect()),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn insert(&self, key: VerificationKey) {
        self.keys.lock().insert(key.kid.clone(), key);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyFetcher for CountingFetcher {
    async fn fetch_key(&self, kid: &str) -> Result<VerificationKey, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::KeyFetchFailed("HTTP 500 Internal Server Error".to_string()));
        }
        self.keys
            .lock()
            .get(kid)
            .cloned()
            .ok_or_else(|| Error::KeyNotFound {
                kid: kid.to_string(),
            })
    }
}
