//! OAuth credential management for the financial data feed
//!
//! The provider issues OAuth 1.0a tokens in exchange for a signed SAML 2.0
//! bearer assertion. Those tokens live for an hour and come with no lifetime
//! information, so this crate keeps a single credential per
//! [`TokenManager`], leases it for a configurable period (58 minutes by
//! default), and transparently performs a new exchange when a caller asks for
//! a credential after the lease has run out.
//!
//! # General Flow
//!
//! On application start-up, load the application's identity and set up a
//! credential source that signs a fresh assertion for each exchange. Wrap the
//! source in a token manager and share it with whatever makes requests to the
//! API.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use cadfeed_saml::{
//!     AssertionBuilder, ConsumerKey, ConsumerSecret, CustomerId, Identity, IssuerId, SigningKey,
//! };
//! use cadfeed_tokens::{
//!     sources::saml_bearer::{SamlBearerCredentialSource, DEFAULT_TOKEN_URL},
//!     CredentialLifetimeConfig, TokenManager,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let identity = Arc::new(Identity::new(
//!     IssuerId::from_static("my-issuer"),
//!     CustomerId::from_display(42),
//!     ConsumerKey::from_static("consumer-key"),
//!     ConsumerSecret::from_static("consumer-secret"),
//!     SigningKey::from_pem_file("app.key")?,
//! ));
//!
//! let source = SamlBearerCredentialSource::new(
//!     reqwest::Client::new(),
//!     DEFAULT_TOKEN_URL.parse()?,
//!     identity,
//!     AssertionBuilder::new("my-app.audience"),
//!     CredentialLifetimeConfig::default(),
//! );
//!
//! let manager = TokenManager::new(source);
//!
//! let credential = manager.get_valid_token().await?;
//! tracing::info!(
//!     token = format_args!("{:#?}", credential.token()),
//!     expires_at = credential.expires_at().0,
//!     "obtained credential"
//! );
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! * `default-tls` (default): use the platform TLS implementation for exchanges.
//! * `rustls-tls`: use `rustls` for exchanges.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

mod braids;
mod credential;
mod manager;
pub mod sources;

pub use braids::*;
pub use credential::{Credential, CredentialLifetimeConfig, CredentialStatus, DEFAULT_LEASE};
pub use manager::{CredentialState, TokenManager};
