//! Verification key retrieval and caching.
//!
//! [`KeyStore`] keeps the keys it has fetched in memory, keyed by `kid`.
//! A lookup that misses goes to a [`KeyFetcher`] (normally the remote key
//! endpoint, see `client::PlaidKeyFetcher`). Key material only ever enters
//! the cache from a fetcher; nothing in a token can add to it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::Error;
use crate::types::key::{JsonWebKey, VerificationKey};

/// Default bound on a single remote key fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of authoritative verification keys.
///
/// Implementations return [`Error::KeyNotFound`] when the source positively
/// reports the key as unknown. Any other error is treated as a transient
/// fetch failure.
#[async_trait]
pub trait KeyFetcher: Send + Sync {
    async fn fetch_key(&self, kid: &str) -> Result<VerificationKey, Error>;
}

#[async_trait]
impl<T: KeyFetcher + ?Sized> KeyFetcher for Arc<T> {
    async fn fetch_key(&self, kid: &str) -> Result<VerificationKey, Error> {
        (**self).fetch_key(kid).await
    }
}

/// Serves keys from a fixed, pre-loaded set. For offline verification or
/// deployments that distribute keys out of band.
#[derive(Debug, Clone, Default)]
pub struct StaticKeyFetcher {
    keys: HashMap<String, VerificationKey>,
}

impl StaticKeyFetcher {
    pub fn new(keys: impl IntoIterator<Item = VerificationKey>) -> Self {
        Self {
            keys: keys.into_iter().map(|k| (k.kid.clone(), k)).collect(),
        }
    }

    /// Build from a JSON array of key objects in the remote wire format.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let jwks: Vec<JsonWebKey> = serde_json::from_str(json)
            .map_err(|e| Error::KeyFetchFailed(format!("invalid key set: {}", e)))?;
        let keys = jwks
            .into_iter()
            .map(VerificationKey::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(keys))
    }
}

#[async_trait]
impl KeyFetcher for StaticKeyFetcher {
    async fn fetch_key(&self, kid: &str) -> Result<VerificationKey, Error> {
        self.keys.get(kid).cloned().ok_or_else(|| Error::KeyNotFound {
            kid: kid.to_string(),
        })
    }
}

#[derive(Debug, Default)]
struct KeyCache {
    keys: HashMap<String, VerificationKey>,
    last_refreshed: Option<DateTime<Utc>>,
}

/// In-memory cache of verification keys in front of a [`KeyFetcher`].
///
/// The map sits behind one lock that is never held across an `.await`:
/// the remote fetch runs unlocked and its result is inserted afterwards.
/// Two callers missing on the same `kid` at once may both fetch; the later
/// insert wins and the map still holds one entry for that `kid`. Dropping
/// a `resolve` future mid-fetch leaves the cache untouched.
///
/// Fetches use `tokio::time::timeout`, so `resolve` must run inside a Tokio
/// runtime with the time driver enabled.
pub struct KeyStore<F> {
    fetcher: F,
    cache: Mutex<KeyCache>,
    fetch_timeout: Duration,
}

impl<F: KeyFetcher> KeyStore<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            cache: Mutex::new(KeyCache::default()),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Resolve `kid` to a usable key.
    ///
    /// # Errors
    ///
    /// * [`Error::KeyExpired`] if the key (cached or just fetched) has an
    ///   expiration in the past. A cached expired key is not refetched.
    /// * [`Error::KeyNotFound`] if the fetcher reports the key as unknown.
    /// * [`Error::KeyFetchFailed`] on any other fetch problem, including
    ///   timeout. Neither this nor `KeyNotFound` is cached.
    #[instrument(skip(self))]
    pub async fn resolve(&self, kid: &str) -> Result<VerificationKey, Error> {
        if let Some(key) = self.get(kid) {
            if key.is_expired_at(Utc::now()) {
                warn!(expired_at = ?key.expired_at, "cached verification key has expired");
                return Err(Error::KeyExpired {
                    kid: kid.to_string(),
                });
            }
            debug!("verification key cache hit");
            return Ok(key);
        }

        debug!("verification key cache miss, fetching");
        let key = match tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch_key(kid)).await
        {
            Ok(Ok(key)) => key,
            Ok(Err(e @ Error::KeyNotFound { .. })) | Ok(Err(e @ Error::KeyFetchFailed(_))) => {
                warn!(error = %e, "verification key fetch failed");
                return Err(e);
            }
            Ok(Err(e)) => {
                warn!(error = %e, "verification key fetch failed");
                return Err(Error::KeyFetchFailed(e.to_string()));
            }
            Err(_) => {
                warn!(timeout = ?self.fetch_timeout, "verification key fetch timed out");
                return Err(Error::KeyFetchFailed(format!(
                    "timed out after {:?}",
                    self.fetch_timeout
                )));
            }
        };

        if key.kid != kid {
            warn!(returned = %key.kid, "key endpoint returned a different kid");
            return Err(Error::KeyFetchFailed(format!(
                "requested key '{}' but received '{}'",
                kid, key.kid
            )));
        }

        let expired = key.is_expired_at(Utc::now());
        self.insert(key.clone());
        info!(created_at = %key.created_at, expired, "cached verification key");

        if expired {
            return Err(Error::KeyExpired {
                kid: kid.to_string(),
            });
        }
        Ok(key)
    }

    /// Cached entry for `kid`, expired or not. Never fetches.
    pub fn get(&self, kid: &str) -> Option<VerificationKey> {
        self.cache.lock().keys.get(kid).cloned()
    }

    fn insert(&self, key: VerificationKey) {
        let mut cache = self.cache.lock();
        cache.keys.insert(key.kid.clone(), key);
        cache.last_refreshed = Some(Utc::now());
    }

    /// Drop every entry whose expiration has passed. Returns how many went.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut cache = self.cache.lock();
        let before = cache.keys.len();
        cache.keys.retain(|_, key| !key.is_expired_at(now));
        let removed = before - cache.keys.len();
        if removed > 0 {
            debug!(removed, "purged expired verification keys");
        }
        removed
    }

    /// Forget `kid` so the next lookup refetches it.
    pub fn invalidate(&self, kid: &str) -> bool {
        self.cache.lock().keys.remove(kid).is_some()
    }

    /// Forget every cached key.
    pub fn clear(&self) {
        let mut cache = self.cache.lock();
        cache.keys.clear();
        cache.last_refreshed = None;
    }

    pub fn len(&self) -> usize {
        self.cache.lock().keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// When a fetched key was last inserted.
    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.cache.lock().last_refreshed
    }
}
