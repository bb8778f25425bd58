//! # plaid-webhook
//!
//! Authenticity verification for Plaid webhook deliveries.
//!
//! Each delivery carries an ES256 signed token in the `Plaid-Verification`
//! header. [`WebhookAuthenticator`] checks it end to end:
//!
//! - **Token decoding**: split and base64url-decode the compact token
//! - **Key resolution**: look the `kid` up in an in-memory cache, fetching it
//!   from `/webhook_verification_key/get` on a miss; expired keys are refused
//! - **Signature verification**: ECDSA P-256 with SHA-256 only; any other
//!   declared algorithm fails
//! - **Body binding**: SHA-256 of the raw body compared in constant time with
//!   the token's `request_body_sha256`
//! - **Freshness**: `iat` must be within a tolerance window (5 minutes by
//!   default)
//!
//! ## Quick Start
//!
//! ```no_run
//! use plaid_webhook::client::PlaidKeyFetcher;
//! use plaid_webhook::config::{AuthenticatorConfig, ClientConfig, Environment};
//! use plaid_webhook::WebhookAuthenticator;
//!
//! # async fn example(token: &str, raw_body: &[u8]) -> Result<(), plaid_webhook::Error> {
//! let client = ClientConfig::new(Environment::Sandbox, "client-id", "secret");
//! let fetcher = PlaidKeyFetcher::new(&client)?;
//! let auth = WebhookAuthenticator::from_config(fetcher, &AuthenticatorConfig::default());
//!
//! let webhook = auth.authenticate(token, raw_body).await?;
//! println!("{} {}", webhook.claims.webhook_type, webhook.claims.webhook_code);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every failure is an [`Error`] value. Only
//! [`Error::KeyFetchFailed`] is worth retrying; everything else means the
//! delivery must be rejected. Use [`Error::public_message`] for the HTTP
//! response so that the sender cannot tell failure kinds apart.

#[cfg(feature = "fetch")]
pub mod client;
pub mod config;
pub mod crypto;
pub mod currency;
pub mod error;
pub mod key_store;
#[cfg(any(test, feature = "testutil"))]
pub mod testutil;
pub mod token;
pub mod types;
pub mod webhook;

pub use error::{Error, ErrorCode};
pub use key_store::{KeyFetcher, KeyStore, StaticKeyFetcher};
pub use types::key::VerificationKey;
pub use types::webhook::{VerifiedWebhook, WebhookClaims};
pub use webhook::WebhookAuthenticator;
