//! Signed SAML 2.0 bearer assertions
//!
//! The financial data feed does not accept user credentials directly. Instead,
//! the calling application proves who it is acting for by presenting a SAML 2.0
//! bearer assertion, signed with the application's RSA key, to the provider's
//! OAuth endpoint, which answers with a short-lived OAuth token and secret.
//!
//! This crate builds those assertions. An [`Identity`] bundles the issuer and
//! customer identifiers, the OAuth consumer credentials, and the
//! [`SigningKey`]; an [`AssertionBuilder`] turns that identity into a
//! base64-encoded [`SignedAssertion`] with a fresh ID and validity window.
//!
//! ```no_run
//! use cadfeed_saml::{
//!     AssertionBuilder, ConsumerKey, ConsumerSecret, CustomerId, Identity, IssuerId, SigningKey,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let identity = Identity::new(
//!     IssuerId::from_static("my-issuer"),
//!     CustomerId::from_display(42),
//!     ConsumerKey::from_static("consumer-key"),
//!     ConsumerSecret::from_static("consumer-secret"),
//!     SigningKey::from_pem_file("app.key")?,
//! );
//!
//! let assertion = AssertionBuilder::new("my-app.audience").build_signed_assertion(&identity)?;
//! # let _ = assertion;
//! # Ok(())
//! # }
//! ```
//!
//! The assertion body is digested with SHA-1 and the `SignedInfo` signed with
//! RSA-SHA1, as required by the provider's validator.

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

mod assertion;
mod braids;
pub mod error;
mod identity;
mod key;
mod splice;
mod template;

pub use assertion::{AssertionBuilder, AssertionDocument, AssertionWindow};
pub use braids::*;
pub use identity::Identity;
pub use key::SigningKey;
