use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Protected header of a webhook verification token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenHeader {
    #[serde(default)]
    pub alg: Option<String>,
    #[serde(default)]
    pub kid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

/// Claims carried in the token payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenPayload {
    /// Issued-at, Unix seconds.
    pub iat: i64,
    /// SHA-256 of the raw request body, hex encoded.
    pub request_body_sha256: String,
}

/// Error object included in some notifications.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebhookError {
    #[serde(default)]
    pub display_message: Option<String>,
    pub error_code: String,
    pub error_message: String,
    pub error_type: String,
}

/// Parsed webhook notification.
///
/// `webhook_type` and `webhook_code` are present on every notification; the
/// remaining identifiers depend on the product that sent it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebhookClaims {
    pub webhook_type: String,
    pub webhook_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WebhookError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_report_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_webhook_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consent_expiration_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_transactions: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed_transactions: Option<Vec<String>>,
}

/// An authenticated delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedWebhook {
    pub claims: WebhookClaims,
    pub issued_at: DateTime<Utc>,
    /// Identifier of the key that signed the token.
    pub key_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transactions_webhook_parses() {
        let json = r#"{
            "webhook_type": "TRANSACTIONS",
            "webhook_code": "TRANSACTIONS_REMOVED",
            "item_id": "wz666MBjYWTp2PDzzggYhM6oWWmBb",
            "removed_transactions": ["yBVBEwrPyJs8GvR77N7QTxnGg6wG74H7dEDN6", "kgygNvAVPzSX9KkddNdWHaVGRVex1MHm3k9no"],
            "error": null
        }"#;
        let claims: WebhookClaims = serde_json::from_str(json).unwrap();
        assert_eq!(claims.webhook_type, "TRANSACTIONS");
        assert_eq!(claims.removed_transactions.as_ref().map(Vec::len), Some(2));
        assert!(claims.error.is_none());
        assert!(claims.asset_report_id.is_none());
    }

    #[test]
    fn test_error_webhook_parses() {
        let json = r#"{
            "webhook_type": "ITEM",
            "webhook_code": "ERROR",
            "item_id": "wz666MBjYWTp2PDzzggYhM6oWWmBb",
            "error": {
                "display_message": null,
                "error_code": "ITEM_LOGIN_REQUIRED",
                "error_message": "the login details of this item have changed",
                "error_type": "ITEM_ERROR"
            }
        }"#;
        let claims: WebhookClaims = serde_json::from_str(json).unwrap();
        let err = claims.error.unwrap();
        assert_eq!(err.error_code, "ITEM_LOGIN_REQUIRED");
        assert!(err.display_message.is_none());
    }

    #[test]
    fn test_header_without_kid_parses() {
        let header: TokenHeader = serde_json::from_str(r#"{"alg":"ES256"}"#).unwrap();
        assert_eq!(header.alg.as_deref(), Some("ES256"));
        assert!(header.kid.is_none());
    }
}
