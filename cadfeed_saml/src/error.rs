//! Errors raised while loading identity material or building assertions

use std::{io, path::PathBuf};

use thiserror::Error;

/// The identity or key material could not be loaded
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The private key file could not be read
    #[error("unable to read private key from '{}'", path.display())]
    KeyUnreadable {
        /// The path that was read
        path: PathBuf,
        /// The underlying I/O error
        source: io::Error,
    },
    /// The private key was readable but is not a usable RSA key
    #[error("private key rejected")]
    KeyRejected(#[source] openssl::error::ErrorStack),
    /// The private key is not an RSA key
    #[error("private key is not an RSA key")]
    NotRsa,
    /// A required identity field was missing or empty
    #[error("missing required identity field '{0}'")]
    MissingField(&'static str),
}

/// Signing the assertion failed
#[derive(Debug, Error)]
#[error("unable to sign assertion")]
pub struct SigningError {
    #[from]
    source: openssl::error::ErrorStack,
}

/// The assertion could not be rendered
#[derive(Debug, Error)]
pub enum TemplateRenderError {
    /// A value required by the assertion template was missing or empty
    #[error("missing required assertion field '{0}'")]
    MissingField(&'static str),
    /// A timestamp cannot be represented in the required format
    #[error("timestamp {0} cannot be rendered")]
    TimestampOutOfRange(u64),
    /// The rendered assertion could not be parsed for signature insertion
    #[error("rendered assertion is not well-formed")]
    MalformedXml(#[from] quick_xml::Error),
    /// The rendered assertion could not be written back out
    #[error("unable to write signed assertion")]
    Write(#[from] io::Error),
    /// The `Issuer` element was not followed by a `Subject` element
    #[error("no insertion point for the signature after the issuer")]
    MissingAnchor,
}

/// Building a signed assertion failed
#[derive(Debug, Error)]
pub enum AssertionError {
    /// The assertion could not be rendered
    #[error(transparent)]
    Template(#[from] TemplateRenderError),
    /// The assertion could not be signed
    #[error(transparent)]
    Signing(#[from] SigningError),
}
