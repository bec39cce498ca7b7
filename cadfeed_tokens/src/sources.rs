//! Credential sources

use crate::Credential;
use async_trait::async_trait;
use std::error;

mod constant;
pub mod saml_bearer;

pub use constant::ConstCredentialSource;

/// An asynchronous source for credentials
#[async_trait]
pub trait AsyncCredentialSource: Send + Sync {
    /// The error type returned in the event that obtaining a credential fails
    type Error: error::Error + Send + Sync + 'static;

    /// Obtains a freshly issued credential
    async fn request_credential(&self) -> Result<Credential, Self::Error>;
}
