//! A credential source that exchanges signed SAML assertions for OAuth credentials

use std::{sync::Arc, time::Duration};

use aliri_clock::{Clock, System};
use async_trait::async_trait;
use cadfeed_saml::{error::AssertionError, AssertionBuilder, Identity, SignedAssertionRef};
use reqwest::{header, StatusCode};
use thiserror::Error;

use super::AsyncCredentialSource;
use crate::{Credential, CredentialLifetimeConfig};

mod response;

/// The provider's SAML bearer token exchange endpoint
pub const DEFAULT_TOKEN_URL: &str = "https://oauth.intuit.com/oauth/v1/get_access_token_by_saml";

/// Default bound on a single exchange, including reading the response body
pub const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(30);

/// An error while exchanging an assertion for a credential
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// Unable to send the exchange request to the provider
    #[error("error sending assertion to token endpoint")]
    RequestSend(#[source] reqwest::Error),
    /// The exchange did not complete in time
    #[error("token exchange timed out after {0:?}")]
    Timeout(Duration),
    /// Unable to read the response
    #[error("error reading token exchange response body")]
    BodyReadError(#[source] reqwest::Error),
    /// The provider answered with an unsuccessful status
    #[error("token endpoint responded with {status}: {body}")]
    ErrorWithBody {
        /// The response status
        status: StatusCode,
        /// The body of the error
        body: String,
    },
    /// The provider rejected the SAML assertion
    #[error("assertion rejected by provider: {problem}")]
    SamlRejected {
        /// The problem reported by the provider
        problem: String,
    },
    /// The response did not have the expected shape
    #[error("malformed token exchange response: {reason}")]
    MalformedResponse {
        /// What was wrong with the response
        reason: &'static str,
    },
}

/// An error while obtaining a credential through the SAML bearer flow
#[derive(Debug, Error)]
pub enum CredentialRequestError {
    /// The assertion could not be built
    #[error("unable to build signed assertion")]
    Assertion(#[from] AssertionError),
    /// The assertion could not be exchanged
    #[error("unable to exchange signed assertion")]
    Exchange(#[from] ExchangeError),
}

/// A credential source that signs a fresh assertion for every request and
/// exchanges it at the provider's token endpoint
#[derive(Debug)]
pub struct SamlBearerCredentialSource<C = System> {
    client: reqwest::Client,
    token_url: reqwest::Url,
    identity: Arc<Identity>,
    assertions: AssertionBuilder<C>,
    lifetime_config: CredentialLifetimeConfig<C>,
    timeout: Duration,
}

impl<C> SamlBearerCredentialSource<C> {
    /// Constructs a new SAML bearer credential source
    pub fn new(
        client: reqwest::Client,
        token_url: reqwest::Url,
        identity: Arc<Identity>,
        assertions: AssertionBuilder<C>,
        lifetime_config: CredentialLifetimeConfig<C>,
    ) -> Self {
        Self {
            client,
            token_url,
            identity,
            assertions,
            lifetime_config,
            timeout: DEFAULT_EXCHANGE_TIMEOUT,
        }
    }

    /// Replaces the default bound on a single exchange
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The identity assertions are issued for
    #[inline]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }
}

impl<C: Clock> SamlBearerCredentialSource<C> {
    /// Exchanges a signed assertion for a credential
    ///
    /// # Errors
    ///
    /// The request fails or times out, the provider rejects the assertion, or
    /// the response cannot be parsed.
    #[tracing::instrument(
        err,
        skip(self, assertion),
        fields(
            token_url = %self.token_url,
            consumer_key = %self.identity.consumer_key(),
        ),
    )]
    pub async fn exchange_assertion(
        &self,
        assertion: &SignedAssertionRef,
    ) -> Result<Credential, ExchangeError> {
        tracing::trace!("exchanging assertion at token endpoint");

        let req = self
            .client
            .post(self.token_url.clone())
            .header(header::CONTENT_LANGUAGE, "en-US")
            .header(
                header::AUTHORIZATION,
                format!(
                    r#"OAuth oauth_consumer_key="{}""#,
                    self.identity.consumer_key()
                ),
            )
            .form(&[("saml_assertion", assertion.as_str())]);

        let exchange = async {
            let resp = req.send().await.map_err(ExchangeError::RequestSend)?;
            let status = resp.status();
            let body = resp.text().await.map_err(ExchangeError::BodyReadError)?;
            Ok::<_, ExchangeError>((status, body))
        };

        let (status, body) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| ExchangeError::Timeout(self.timeout))??;

        tracing::debug!(
            response.status = status.as_u16(),
            "received token exchange response"
        );

        if !status.is_success() {
            if let Some(problem) = response::problem(&body) {
                return Err(ExchangeError::SamlRejected { problem });
            }
            return Err(ExchangeError::ErrorWithBody { status, body });
        }

        let parsed = response::parse(&body)?;
        let credential = self
            .lifetime_config
            .create_credential(parsed.token, parsed.token_secret);

        tracing::info!(
            issued = credential.issued().0,
            expires_at = credential.expires_at().0,
            "received new OAuth credential"
        );

        Ok(credential)
    }
}

#[async_trait]
impl<C: Clock + Send + Sync> AsyncCredentialSource for SamlBearerCredentialSource<C> {
    type Error = CredentialRequestError;

    async fn request_credential(&self) -> Result<Credential, Self::Error> {
        let assertion = self.assertions.build_signed_assertion(&self.identity)?;
        Ok(self.exchange_assertion(&assertion).await?)
    }
}
