//! Syntactic decoding of compact signed tokens.
//!
//! Nothing here decides trust: [`decode`] only splits the three
//! `header.payload.signature` segments, base64url-decodes them and reads the
//! header. The payload stays opaque bytes until the signature has been
//! checked.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

use crate::error::Error;
use crate::types::webhook::{TokenHeader, TokenPayload};

/// A token split into its parts. Built per verification call, never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedToken {
    pub kid: String,
    pub header: TokenHeader,
    pub header_bytes: Vec<u8>,
    pub payload_bytes: Vec<u8>,
    pub signature: Vec<u8>,
}

impl DecodedToken {
    /// Algorithm declared by the header.
    pub fn alg(&self) -> &str {
        self.header.alg.as_deref().unwrap_or_default()
    }

    /// Parse the payload claims. Only meaningful after the signature verified.
    pub fn claims(&self) -> Result<TokenPayload, Error> {
        serde_json::from_slice(&self.payload_bytes)
            .map_err(|e| Error::MalformedToken(format!("invalid payload: {}", e)))
    }
}

fn segment(encoded: &str, name: &str) -> Result<Vec<u8>, Error> {
    URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|e| Error::MalformedToken(format!("{} is not base64url: {}", name, e)))
}

/// Decode a compact `header.payload.signature` token.
///
/// # Errors
///
/// Returns [`Error::MalformedToken`] unless the token has exactly three
/// base64url segments and a JSON header with non-empty `alg` and `kid`.
pub fn decode(token: &str) -> Result<DecodedToken, Error> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(Error::MalformedToken(format!(
            "expected 3 segments, found {}",
            parts.len()
        )));
    }

    let header_bytes = segment(parts[0], "header")?;
    let payload_bytes = segment(parts[1], "payload")?;
    let signature = segment(parts[2], "signature")?;

    let header: TokenHeader = serde_json::from_slice(&header_bytes)
        .map_err(|e| Error::MalformedToken(format!("invalid header: {}", e)))?;

    if header.alg.as_deref().map_or(true, str::is_empty) {
        return Err(Error::MalformedToken("header has no alg".to_string()));
    }
    let kid = match header.kid.as_deref() {
        Some(kid) if !kid.is_empty() => kid.to_string(),
        _ => return Err(Error::MalformedToken("header has no kid".to_string())),
    };

    Ok(DecodedToken {
        kid,
        header,
        header_bytes,
        payload_bytes,
        signature,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b64(data: &[u8]) -> String {
        URL_SAFE_NO_PAD.encode(data)
    }

    fn token(header: &str, payload: &str, signature: &[u8]) -> String {
        format!(
            "{}.{}.{}",
            b64(header.as_bytes()),
            b64(payload.as_bytes()),
            b64(signature)
        )
    }

    #[test]
    fn test_decode_valid_token() {
        let t = token(
            r#"{"alg":"ES256","kid":"key-1","typ":"JWT"}"#,
            r#"{"iat":1700000000,"request_body_sha256":"abcd"}"#,
            &[7u8; 64],
        );
        let decoded = decode(&t).unwrap();
        assert_eq!(decoded.kid, "key-1");
        assert_eq!(decoded.alg(), "ES256");
        assert_eq!(decoded.signature.len(), 64);

        let claims = decoded.claims().unwrap();
        assert_eq!(claims.iat, 1_700_000_000);
        assert_eq!(claims.request_body_sha256, "abcd");
    }

    #[test]
    fn test_two_segments_rejected() {
        let t = format!("{}.{}", b64(b"{}"), b64(b"{}"));
        assert!(matches!(decode(&t), Err(Error::MalformedToken(_))));
    }

    #[test]
    fn test_four_segments_rejected() {
        let t = token(r#"{"alg":"ES256","kid":"k"}"#, "{}", b"sig") + ".extra";
        assert!(matches!(decode(&t), Err(Error::MalformedToken(_))));
    }

    #[test]
    fn test_bad_base64_rejected() {
        let t = format!("{}.!!!.{}", b64(br#"{"alg":"ES256","kid":"k"}"#), b64(b"s"));
        assert!(matches!(decode(&t), Err(Error::MalformedToken(_))));
    }

    #[test]
    fn test_padded_segment_rejected() {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"ES256","kid":"k"}"#);
        let t = format!("{}.{}=.{}", header, b64(b"{}"), b64(b"s"));
        assert!(matches!(decode(&t), Err(Error::MalformedToken(_))));
    }

    #[test]
    fn test_header_not_json_rejected() {
        let t = token("not json", "{}", b"sig");
        assert!(matches!(decode(&t), Err(Error::MalformedToken(_))));
    }

    #[test]
    fn test_missing_alg_rejected() {
        let t = token(r#"{"kid":"key-1"}"#, "{}", b"sig");
        assert!(matches!(decode(&t), Err(Error::MalformedToken(_))));
    }

    #[test]
    fn test_missing_kid_rejected() {
        let t = token(r#"{"alg":"ES256"}"#, "{}", b"sig");
        assert!(matches!(decode(&t), Err(Error::MalformedToken(_))));
    }

    #[test]
    fn test_unverified_alg_is_not_judged_here() {
        // Algorithm pinning belongs to the signature check.
        let t = token(r#"{"alg":"none","kid":"key-1"}"#, "{}", b"");
        assert_eq!(decode(&t).unwrap().alg(), "none");
    }

    #[test]
    fn test_malformed_payload_claims() {
        let t = token(r#"{"alg":"ES256","kid":"key-1"}"#, r#"{"iat":"soon"}"#, b"sig");
        let decoded = decode(&t).unwrap();
        assert!(matches!(decoded.claims(), Err(Error::MalformedToken(_))));
    }
}
