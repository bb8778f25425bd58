//! Signature and digest checks for webhook tokens, pinned to ES256.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use p256::{
    ecdsa::{signature::Verifier, Signature, VerifyingKey},
    EncodedPoint, FieldBytes,
};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fmt;
use subtle::ConstantTimeEq;

use crate::types::key::{VerificationKey, COORDINATE_LEN};

/// The only token algorithm accepted: ECDSA over P-256 with SHA-256.
pub const ALGORITHM: &str = "ES256";

/// The only curve accepted for verification keys.
pub const CURVE: &str = "P-256";

/// Length of a fixed-size `r || s` ES256 signature.
pub const SIGNATURE_LEN: usize = 64;

/// Why a signature check failed. Kept for logging only; callers see a
/// single invalid-signature outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureFailure {
    /// Header is not JSON or carries no `alg`.
    MalformedHeader,
    /// Header declares an algorithm other than [`ALGORITHM`].
    AlgorithmNotAllowed(String),
    /// Key is tagged with a different algorithm or curve.
    KeyAlgorithmMismatch { alg: String, crv: String },
    /// Coordinates are not a point on P-256.
    InvalidKey,
    /// Signature bytes are not a valid `r || s` pair.
    MalformedSignature,
    /// Well-formed signature that does not match.
    Mismatch,
}

impl fmt::Display for SignatureFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignatureFailure::MalformedHeader => write!(f, "malformed header"),
            SignatureFailure::AlgorithmNotAllowed(alg) => {
                write!(f, "algorithm '{}' not allowed", alg)
            }
            SignatureFailure::KeyAlgorithmMismatch { alg, crv } => {
                write!(f, "key is {}/{}, expected {}/{}", alg, crv, ALGORITHM, CURVE)
            }
            SignatureFailure::InvalidKey => write!(f, "invalid public key"),
            SignatureFailure::MalformedSignature => write!(f, "malformed signature"),
            SignatureFailure::Mismatch => write!(f, "signature mismatch"),
        }
    }
}

#[derive(Deserialize)]
struct AlgOnly {
    alg: Option<String>,
}

/// Reconstruct the signed input `base64url(header) + "." + base64url(payload)`.
pub fn signing_input(header_bytes: &[u8], payload_bytes: &[u8]) -> String {
    format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header_bytes),
        URL_SAFE_NO_PAD.encode(payload_bytes)
    )
}

/// Build a P-256 verifying key from a key's affine coordinates.
pub fn verifying_key(key: &VerificationKey) -> Result<VerifyingKey, SignatureFailure> {
    if key.x.len() != COORDINATE_LEN || key.y.len() != COORDINATE_LEN {
        return Err(SignatureFailure::InvalidKey);
    }
    let point = EncodedPoint::from_affine_coordinates(
        FieldBytes::from_slice(&key.x),
        FieldBytes::from_slice(&key.y),
        false,
    );
    VerifyingKey::from_encoded_point(&point).map_err(|_| SignatureFailure::InvalidKey)
}

/// Verify a token signature, reporting the reason on failure.
///
/// The header's declared algorithm and the key's algorithm and curve must
/// all be the pinned ES256 / P-256 pair before any curve arithmetic runs.
pub fn verify_detailed(
    header_bytes: &[u8],
    payload_bytes: &[u8],
    signature: &[u8],
    key: &VerificationKey,
) -> Result<(), SignatureFailure> {
    let header: AlgOnly =
        serde_json::from_slice(header_bytes).map_err(|_| SignatureFailure::MalformedHeader)?;
    match header.alg.as_deref() {
        Some(ALGORITHM) => {}
        Some(other) => return Err(SignatureFailure::AlgorithmNotAllowed(other.to_string())),
        None => return Err(SignatureFailure::MalformedHeader),
    }

    if key.alg != ALGORITHM || key.crv != CURVE {
        return Err(SignatureFailure::KeyAlgorithmMismatch {
            alg: key.alg.clone(),
            crv: key.crv.clone(),
        });
    }

    let verifying_key = verifying_key(key)?;

    if signature.len() != SIGNATURE_LEN {
        return Err(SignatureFailure::MalformedSignature);
    }
    let signature =
        Signature::from_slice(signature).map_err(|_| SignatureFailure::MalformedSignature)?;

    let message = signing_input(header_bytes, payload_bytes);
    verifying_key
        .verify(message.as_bytes(), &signature)
        .map_err(|_| SignatureFailure::Mismatch)
}

/// Verify a token signature against `key`.
///
/// Malformed input of any kind is a `false`, never an error or a panic.
pub fn verify(
    header_bytes: &[u8],
    payload_bytes: &[u8],
    signature: &[u8],
    key: &VerificationKey,
) -> bool {
    verify_detailed(header_bytes, payload_bytes, signature, key).is_ok()
}

/// SHA-256 of `data`.
pub fn sha256_digest(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Constant-time equality for digests. Different lengths never match.
pub fn digests_match(expected: &[u8], actual: &[u8]) -> bool {
    expected.ct_eq(actual).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::TestSigner;

    const HEADER: &[u8] = br#"{"alg":"ES256","kid":"key-1","typ":"JWT"}"#;
    const PAYLOAD: &[u8] = br#"{"iat":1700000000,"request_body_sha256":"00"}"#;

    #[test]
    fn test_sign_and_verify() {
        let signer = TestSigner::new("key-1");
        let signature = signer.sign_raw(HEADER, PAYLOAD);

        assert!(verify(HEADER, PAYLOAD, &signature, &signer.verification_key()));
    }

    #[test]
    fn test_tampered_payload_fails() {
        let signer = TestSigner::new("key-1");
        let signature = signer.sign_raw(HEADER, PAYLOAD);
        let tampered = br#"{"iat":1700000001,"request_body_sha256":"00"}"#;

        assert_eq!(
            verify_detailed(HEADER, tampered, &signature, &signer.verification_key()),
            Err(SignatureFailure::Mismatch)
        );
    }

    #[test]
    fn test_other_key_fails() {
        let signer = TestSigner::new("key-1");
        let other = TestSigner::new("key-1");
        let signature = signer.sign_raw(HEADER, PAYLOAD);

        assert!(!verify(HEADER, PAYLOAD, &signature, &other.verification_key()));
    }

    #[test]
    fn test_none_algorithm_rejected() {
        let signer = TestSigner::new("key-1");
        let header = br#"{"alg":"none","kid":"key-1"}"#;
        let signature = signer.sign_raw(header, PAYLOAD);

        assert_eq!(
            verify_detailed(header, PAYLOAD, &signature, &signer.verification_key()),
            Err(SignatureFailure::AlgorithmNotAllowed("none".to_string()))
        );
    }

    #[test]
    fn test_hmac_algorithm_rejected() {
        let signer = TestSigner::new("key-1");
        let header = br#"{"alg":"HS256","kid":"key-1"}"#;
        let signature = signer.sign_raw(header, PAYLOAD);

        assert!(!verify(header, PAYLOAD, &signature, &signer.verification_key()));
    }

    #[test]
    fn test_key_with_other_curve_rejected() {
        let signer = TestSigner::new("key-1");
        let signature = signer.sign_raw(HEADER, PAYLOAD);
        let mut key = signer.verification_key();
        key.crv = "P-384".to_string();

        assert!(matches!(
            verify_detailed(HEADER, PAYLOAD, &signature, &key),
            Err(SignatureFailure::KeyAlgorithmMismatch { .. })
        ));
    }

    #[test]
    fn test_malformed_signature_is_false_not_panic() {
        let signer = TestSigner::new("key-1");
        let key = signer.verification_key();

        assert_eq!(
            verify_detailed(HEADER, PAYLOAD, &[1, 2, 3], &key),
            Err(SignatureFailure::MalformedSignature)
        );
        // r = s = 0 is out of range for the scalar field.
        assert!(!verify(HEADER, PAYLOAD, &[0u8; SIGNATURE_LEN], &key));
        assert!(!verify(HEADER, PAYLOAD, &[], &key));
    }

    #[test]
    fn test_off_curve_key_rejected() {
        let signer = TestSigner::new("key-1");
        let signature = signer.sign_raw(HEADER, PAYLOAD);
        let mut key = signer.verification_key();
        key.y = vec![0u8; COORDINATE_LEN];

        assert_eq!(
            verify_detailed(HEADER, PAYLOAD, &signature, &key),
            Err(SignatureFailure::InvalidKey)
        );
    }

    #[test]
    fn test_header_bytes_are_signed_not_reserialized() {
        let signer = TestSigner::new("key-1");
        let spaced = br#"{ "alg": "ES256", "kid": "key-1" }"#;
        let compact = br#"{"alg":"ES256","kid":"key-1"}"#;
        let signature = signer.sign_raw(spaced, PAYLOAD);

        assert!(verify(spaced, PAYLOAD, &signature, &signer.verification_key()));
        assert!(!verify(compact, PAYLOAD, &signature, &signer.verification_key()));
    }

    #[test]
    fn test_digest_comparison() {
        let digest = sha256_digest(b"{\"webhook_type\":\"ITEM\"}");
        let mut other = digest;
        other[31] ^= 0x01;

        assert!(digests_match(&digest, &digest));
        assert!(!digests_match(&digest, &other));
        assert!(!digests_match(&digest, &digest[..31]));
    }

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            hex::encode(sha256_digest(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
