use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("Verification key not found: {kid}")]
    KeyNotFound { kid: String },

    #[error("Verification key expired: {kid}")]
    KeyExpired { kid: String },

    #[error("Verification key fetch failed: {0}")]
    KeyFetchFailed(String),

    #[error("Signature invalid")]
    SignatureInvalid,

    #[error("Request body does not match the signed digest")]
    BodyMismatch,

    #[error("Token issued at {issued_at} is outside the accepted window (now {now})")]
    StaleToken {
        issued_at: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    #[error("Malformed webhook body: {0}")]
    MalformedBody(String),
}

impl Error {
    /// Stable code for this failure.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::MalformedToken(_) => ErrorCode::MalformedToken,
            Error::KeyNotFound { .. } => ErrorCode::KeyNotFound,
            Error::KeyExpired { .. } => ErrorCode::KeyExpired,
            Error::KeyFetchFailed(_) => ErrorCode::KeyFetchFailed,
            Error::SignatureInvalid => ErrorCode::SignatureInvalid,
            Error::BodyMismatch => ErrorCode::BodyMismatch,
            Error::StaleToken { .. } => ErrorCode::StaleToken,
            Error::MalformedBody(_) => ErrorCode::MalformedBody,
        }
    }

    /// Whether a later delivery (or the caller) may retry.
    ///
    /// Only fetch failures qualify: they are never cached, so the next
    /// attempt reaches the key endpoint again.
    pub fn is_retryable(&self) -> bool {
        self.code() == ErrorCode::KeyFetchFailed
    }

    /// Text safe to send back to the webhook sender. It is the same for
    /// every failure kind so that probing key ids or timing reveals nothing.
    pub fn public_message(&self) -> &'static str {
        "webhook verification failed"
    }
}

/// Error codes for structured verification results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "MALFORMED_TOKEN")]
    MalformedToken,
    #[serde(rename = "KEY_NOT_FOUND")]
    KeyNotFound,
    #[serde(rename = "KEY_EXPIRED")]
    KeyExpired,
    #[serde(rename = "KEY_FETCH_FAILED")]
    KeyFetchFailed,
    #[serde(rename = "SIGNATURE_INVALID")]
    SignatureInvalid,
    #[serde(rename = "BODY_MISMATCH")]
    BodyMismatch,
    #[serde(rename = "STALE_TOKEN")]
    StaleToken,
    #[serde(rename = "MALFORMED_BODY")]
    MalformedBody,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorCode::MalformedToken => "MALFORMED_TOKEN",
            ErrorCode::KeyNotFound => "KEY_NOT_FOUND",
            ErrorCode::KeyExpired => "KEY_EXPIRED",
            ErrorCode::KeyFetchFailed => "KEY_FETCH_FAILED",
            ErrorCode::SignatureInvalid => "SIGNATURE_INVALID",
            ErrorCode::BodyMismatch => "BODY_MISMATCH",
            ErrorCode::StaleToken => "STALE_TOKEN",
            ErrorCode::MalformedBody => "MALFORMED_BODY",
        };
        write!(f, "{}", s)
    }
}
