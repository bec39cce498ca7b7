//! Client for the financial data feed aggregation API
//!
//! The aggregation API authenticates applications with OAuth 1.0a, but its
//! tokens are never granted interactively. Instead, the application signs a
//! SAML 2.0 bearer assertion for the customer it acts for and exchanges that
//! assertion for a token and secret that live for about an hour.
//!
//! A [`Client`] takes care of all of that. It loads the application's signing
//! key when constructed, performs the exchange lazily on the first request,
//! and signs every request with the current credential, renewing it once its
//! lease runs out.
//!
//! ```no_run
//! use cadfeed::{Client, ClientConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), cadfeed::Error> {
//! let client = Client::new(ClientConfig::from_env()?)?;
//!
//! let accounts = client.customer_accounts().await?;
//! for account in accounts["accounts"].as_array().into_iter().flatten() {
//!     println!("{}", account["accountNickname"]);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! The building blocks are available separately: [`cadfeed_saml`] builds the
//! signed assertions, [`cadfeed_tokens`] exchanges and caches credentials, and
//! [`cadfeed_reqwest`] signs requests made through a `reqwest` middleware
//! stack.
//!
//! # Features
//!
//! * `default-tls` (default): use the platform TLS implementation.
//! * `rustls-tls`: use `rustls`.

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

mod client;
mod config;
pub mod dto;
pub mod error;

pub use cadfeed_reqwest;
pub use cadfeed_saml;
pub use cadfeed_tokens;

pub use cadfeed_saml::{AssertionWindow, ConsumerKey, ConsumerSecret, CustomerId, IssuerId};
pub use cadfeed_tokens::Credential;
pub use client::Client;
pub use config::{ClientConfig, DEFAULT_BASE_URL, DEFAULT_TOKEN_URL};
pub use error::{ApiError, ConfigError, Error};
