use std::convert::Infallible;

use async_trait::async_trait;

use super::AsyncCredentialSource;
use crate::{Credential, CredentialLifetimeConfig, OAuthToken, OAuthTokenSecret};

/// A credential source that always issues the same token and secret
///
/// Each request yields a credential leased from the time of the request.
/// Useful for tests and for environments with a fixed, pre-issued token.
#[derive(Debug)]
pub struct ConstCredentialSource<C = aliri_clock::System> {
    token: OAuthToken,
    token_secret: OAuthTokenSecret,
    lifetime_config: CredentialLifetimeConfig<C>,
}

impl ConstCredentialSource {
    /// Constructs a new constant credential source
    pub fn new(token: impl Into<String>, token_secret: impl Into<String>) -> Self {
        Self {
            token: OAuthToken::new(token.into()),
            token_secret: OAuthTokenSecret::new(token_secret.into()),
            lifetime_config: CredentialLifetimeConfig::default(),
        }
    }
}

impl<C> ConstCredentialSource<C> {
    /// Replaces the lifetime configuration used for issued credentials
    pub fn with_lifetime_config<D>(
        self,
        lifetime_config: CredentialLifetimeConfig<D>,
    ) -> ConstCredentialSource<D> {
        ConstCredentialSource {
            token: self.token,
            token_secret: self.token_secret,
            lifetime_config,
        }
    }
}

#[async_trait]
impl<C: aliri_clock::Clock + Send + Sync> AsyncCredentialSource for ConstCredentialSource<C> {
    type Error = Infallible;

    async fn request_credential(&self) -> Result<Credential, Self::Error> {
        Ok(self
            .lifetime_config
            .create_credential(self.token.clone(), self.token_secret.clone()))
    }
}
