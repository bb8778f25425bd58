use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Length in bytes of a P-256 affine coordinate.
pub const COORDINATE_LEN: usize = 32;

/// Key object as returned by `/webhook_verification_key/get`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct JsonWebKey {
    pub alg: String,
    pub created_at: i64,
    pub crv: String,
    /// Unix seconds; `null` or `0` while the key is active.
    #[serde(default)]
    pub expired_at: Option<i64>,
    pub kid: String,
    pub kty: String,
    #[serde(rename = "use")]
    pub use_field: String,
    pub x: String,
    pub y: String,
}

/// Request body for the key retrieval endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct GetVerificationKeyRequest<'a> {
    pub client_id: &'a str,
    pub secret: &'a str,
    pub key_id: &'a str,
}

/// Response body from the key retrieval endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct GetVerificationKeyResponse {
    pub key: JsonWebKey,
    #[serde(default)]
    pub request_id: Option<String>,
}

/// A rotating public key used to check webhook signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationKey {
    pub kid: String,
    pub alg: String,
    pub crv: String,
    /// Big-endian affine x coordinate.
    pub x: Vec<u8>,
    /// Big-endian affine y coordinate.
    pub y: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub expired_at: Option<DateTime<Utc>>,
}

impl VerificationKey {
    /// True once the key's expiration has passed.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expired_at, Some(t) if t <= now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

fn timestamp(secs: i64, field: &str) -> Result<DateTime<Utc>, Error> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| Error::KeyFetchFailed(format!("{} out of range: {}", field, secs)))
}

fn coordinate(encoded: &str, field: &str) -> Result<Vec<u8>, Error> {
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|e| Error::KeyFetchFailed(format!("invalid {} coordinate: {}", field, e)))?;
    if bytes.len() != COORDINATE_LEN {
        return Err(Error::KeyFetchFailed(format!(
            "{} coordinate must be {} bytes, got {}",
            field,
            COORDINATE_LEN,
            bytes.len()
        )));
    }
    Ok(bytes)
}

impl TryFrom<JsonWebKey> for VerificationKey {
    type Error = Error;

    fn try_from(jwk: JsonWebKey) -> Result<Self, Self::Error> {
        if jwk.kty != "EC" {
            return Err(Error::KeyFetchFailed(format!(
                "unsupported key type '{}'",
                jwk.kty
            )));
        }
        if jwk.use_field != "sig" {
            return Err(Error::KeyFetchFailed(format!(
                "key use must be 'sig', got '{}'",
                jwk.use_field
            )));
        }
        let expired_at = match jwk.expired_at {
            None | Some(0) => None,
            Some(secs) => Some(timestamp(secs, "expired_at")?),
        };
        Ok(Self {
            x: coordinate(&jwk.x, "x")?,
            y: coordinate(&jwk.y, "y")?,
            created_at: timestamp(jwk.created_at, "created_at")?,
            expired_at,
            kid: jwk.kid,
            alg: jwk.alg,
            crv: jwk.crv,
        })
    }
}

impl From<&VerificationKey> for JsonWebKey {
    fn from(key: &VerificationKey) -> Self {
        Self {
            alg: key.alg.clone(),
            created_at: key.created_at.timestamp(),
            crv: key.crv.clone(),
            expired_at: key.expired_at.map(|t| t.timestamp()),
            kid: key.kid.clone(),
            kty: "EC".to_string(),
            use_field: "sig".to_string(),
            x: URL_SAFE_NO_PAD.encode(&key.x),
            y: URL_SAFE_NO_PAD.encode(&key.y),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_jwk() -> JsonWebKey {
        JsonWebKey {
            alg: "ES256".to_string(),
            created_at: 1_560_466_150,
            crv: "P-256".to_string(),
            expired_at: None,
            kid: "bfbd5111-8e33-4643-8ced-b2e642a72f3c".to_string(),
            kty: "EC".to_string(),
            use_field: "sig".to_string(),
            x: URL_SAFE_NO_PAD.encode([1u8; 32]),
            y: URL_SAFE_NO_PAD.encode([2u8; 32]),
        }
    }

    #[test]
    fn test_response_parses_remote_shape() {
        let json = r#"{
            "key": {
                "alg": "ES256",
                "created_at": 1560466150,
                "crv": "P-256",
                "expired_at": null,
                "kid": "bfbd5111-8e33-4643-8ced-b2e642a72f3c",
                "kty": "EC",
                "use": "sig",
                "x": "hKXLGIjWvCBv-cP5euCTxl8g9GLG9zHo_3pO5NN1DwQ",
                "y": "shhexqPB7YffGn6fR6h2UhTSuCtPmfzQJ6ENVIoO4Ys"
            },
            "request_id": "RZ6Omi1bzzwDaLo"
        }"#;
        let resp: GetVerificationKeyResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.request_id.as_deref(), Some("RZ6Omi1bzzwDaLo"));

        let key = VerificationKey::try_from(resp.key).unwrap();
        assert_eq!(key.kid, "bfbd5111-8e33-4643-8ced-b2e642a72f3c");
        assert_eq!(key.x.len(), COORDINATE_LEN);
        assert!(key.expired_at.is_none());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let json = r#"{
            "alg": "ES256", "created_at": 1, "crv": "P-256", "kid": "k",
            "kty": "EC", "use": "sig", "x": "AA", "y": "AA", "extra": true
        }"#;
        assert!(serde_json::from_str::<JsonWebKey>(json).is_err());
    }

    #[test]
    fn test_missing_field_rejected() {
        let json = r#"{"alg": "ES256", "created_at": 1, "crv": "P-256", "kid": "k"}"#;
        assert!(serde_json::from_str::<JsonWebKey>(json).is_err());
    }

    #[test]
    fn test_zero_expiry_means_active() {
        let mut jwk = sample_jwk();
        jwk.expired_at = Some(0);
        let key = VerificationKey::try_from(jwk).unwrap();
        assert!(key.expired_at.is_none());
        assert!(!key.is_expired());
    }

    #[test]
    fn test_past_expiry_is_expired() {
        let mut jwk = sample_jwk();
        jwk.expired_at = Some(1_600_000_000);
        let key = VerificationKey::try_from(jwk).unwrap();
        assert!(key.is_expired());
        assert!(!key.is_expired_at(Utc.timestamp_opt(1_599_999_999, 0).unwrap()));
    }

    #[test]
    fn test_short_coordinate_rejected() {
        let mut jwk = sample_jwk();
        jwk.y = URL_SAFE_NO_PAD.encode([2u8; 31]);
        assert!(matches!(
            VerificationKey::try_from(jwk),
            Err(Error::KeyFetchFailed(_))
        ));
    }

    #[test]
    fn test_wrong_key_type_rejected() {
        let mut jwk = sample_jwk();
        jwk.kty = "RSA".to_string();
        assert!(VerificationKey::try_from(jwk).is_err());
    }

    #[test]
    fn test_request_serializes_remote_field_names() {
        let req = GetVerificationKeyRequest {
            client_id: "client",
            secret: "secret",
            key_id: "kid-1",
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["key_id"], "kid-1");
        assert_eq!(json["client_id"], "client");
    }
}
