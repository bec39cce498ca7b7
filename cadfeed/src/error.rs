//! Errors raised by the client

use cadfeed_saml::error::{AssertionError, SigningError, TemplateRenderError};
use cadfeed_tokens::sources::saml_bearer::{CredentialRequestError, ExchangeError};
use reqwest::StatusCode;
use thiserror::Error;

/// The client could not be configured
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The identity or its signing key could not be loaded
    #[error(transparent)]
    Identity(#[from] cadfeed_saml::error::ConfigError),
    /// A required setting was not provided
    #[error("missing required setting '{0}'")]
    Missing(&'static str),
    /// A setting was provided but could not be interpreted
    #[error("invalid value for setting '{name}': {reason}")]
    Invalid {
        /// The setting
        name: &'static str,
        /// What was wrong with the value
        reason: String,
    },
    /// A URL setting could not be parsed or cannot carry a path
    #[error("invalid URL for setting '{name}'")]
    InvalidUrl {
        /// The setting
        name: &'static str,
        /// The underlying parse error, if the URL did not parse at all
        #[source]
        source: Option<url::ParseError>,
    },
    /// The HTTP client could not be constructed
    #[error("unable to construct HTTP client")]
    HttpClient(#[source] reqwest::Error),
}

/// A call to the aggregation API failed
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request could not be built
    #[error("unable to build request")]
    Build(#[source] reqwest::Error),
    /// The request could not be sent or was aborted by middleware
    #[error("unable to send request")]
    Request(#[source] reqwest_middleware::Error),
    /// The response body could not be read
    #[error("unable to read response body")]
    BodyRead(#[source] reqwest::Error),
    /// The API answered with a non-success status
    #[error("API responded with status {status}")]
    Status {
        /// The status returned
        status: StatusCode,
        /// The body returned, lossily decoded
        body: String,
    },
    /// The response body was not the expected JSON
    #[error("unable to decode response body")]
    Decode(#[source] serde_json::Error),
}

impl ApiError {
    /// The HTTP status, if the API answered with a non-success status
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Any failure of the client
#[derive(Debug, Error)]
pub enum Error {
    /// The client could not be configured
    #[error("invalid configuration")]
    Config(#[from] ConfigError),
    /// An assertion could not be signed
    #[error("unable to sign assertion")]
    Signing(#[source] SigningError),
    /// An assertion could not be rendered
    #[error("unable to render assertion")]
    TemplateRender(#[source] TemplateRenderError),
    /// The assertion could not be exchanged for a credential
    #[error("unable to obtain credential")]
    Exchange(#[source] ExchangeError),
    /// A call to the aggregation API failed
    #[error("API call failed")]
    Api(#[from] ApiError),
}

impl From<cadfeed_saml::error::ConfigError> for Error {
    fn from(err: cadfeed_saml::error::ConfigError) -> Self {
        Self::Config(err.into())
    }
}

impl From<CredentialRequestError> for Error {
    fn from(err: CredentialRequestError) -> Self {
        match err {
            CredentialRequestError::Assertion(AssertionError::Signing(err)) => Self::Signing(err),
            CredentialRequestError::Assertion(AssertionError::Template(err)) => {
                Self::TemplateRender(err)
            }
            CredentialRequestError::Exchange(err) => Self::Exchange(err),
        }
    }
}

impl From<reqwest_middleware::Error> for Error {
    /// Recovers credential failures raised inside the signing middleware
    fn from(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Middleware(inner) => {
                match inner.downcast::<CredentialRequestError>() {
                    Ok(err) => err.into(),
                    Err(inner) => {
                        ApiError::Request(reqwest_middleware::Error::Middleware(inner)).into()
                    }
                }
            }
            err => ApiError::Request(err).into(),
        }
    }
}
