//! Middleware to sign outgoing requests with managed OAuth 1.0a credentials
//!
//! When using [`ClientWithMiddleware`](reqwest_middleware::ClientWithMiddleware),
//! include the [`OAuth1Middleware`] in the middleware stack to sign each
//! outbound request with the credential currently held by a
//! [`TokenManager`]. If the manager holds no valid credential, the middleware
//! waits while a new one is exchanged.
//!
//! If a request already has specified an `Authorization` header value by
//! the time that the middleware executes, the existing value will be left
//! in place, allowing overrides to be specified as required.
//!
//! ```
//! use cadfeed_reqwest::OAuth1Middleware;
//! use cadfeed_saml::{ConsumerKey, ConsumerSecret};
//! use cadfeed_tokens::{sources::ConstCredentialSource, TokenManager};
//! use reqwest::Client;
//! use reqwest_middleware::ClientBuilder;
//!
//! let token_manager = TokenManager::new(ConstCredentialSource::new("token", "secret"));
//!
//! let client = ClientBuilder::new(Client::default())
//!     .with(OAuth1Middleware::new(
//!         token_manager,
//!         ConsumerKey::from_static("consumer-key"),
//!         ConsumerSecret::from_static("consumer-secret"),
//!     ))
//!     .build();
//! ```
//!
//! The middleware can also be configured to sign requests only
//! conditionally. Credentials for the feed should only ever be sent to the
//! feed's host, so the predicates can be composed to require both HTTPS and
//! that host.
//!
//! ```
//! use cadfeed_reqwest::{ExactHostMatch, HttpsOnly, OAuth1Middleware};
//! use cadfeed_saml::{ConsumerKey, ConsumerSecret};
//! use cadfeed_tokens::{sources::ConstCredentialSource, TokenManager};
//! use predicates::prelude::PredicateBooleanExt;
//!
//! # let token_manager = TokenManager::new(ConstCredentialSource::new("token", "secret"));
//! OAuth1Middleware::new(
//!     token_manager,
//!     ConsumerKey::from_static("consumer-key"),
//!     ConsumerSecret::from_static("consumer-secret"),
//! )
//! .with_predicate(HttpsOnly.and(ExactHostMatch::new("financialdatafeed.platform.intuit.com")));
//! ```

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

use std::fmt;

use aliri_clock::{Clock, System};
use cadfeed_saml::{ConsumerKey, ConsumerSecret};
use cadfeed_tokens::{sources::AsyncCredentialSource, Credential, TokenManager};
use predicates::{prelude::*, reflection};
use reqwest::{header, Request, Response};
use reqwest_middleware::{Middleware, Next, Result};

pub mod oauth1;

use oauth1::SigningCredentials;

/// A middleware that signs outgoing requests with OAuth 1.0a
#[derive(Debug)]
pub struct OAuth1Middleware<S, C = System, P = HttpsOnly> {
    token_manager: TokenManager<S, C>,
    consumer_key: ConsumerKey,
    consumer_secret: ConsumerSecret,
    predicate: P,
}

impl<S, C, P: Clone> Clone for OAuth1Middleware<S, C, P> {
    fn clone(&self) -> Self {
        Self {
            token_manager: self.token_manager.clone(),
            consumer_key: self.consumer_key.clone(),
            consumer_secret: self.consumer_secret.clone(),
            predicate: self.predicate.clone(),
        }
    }
}

impl<S, C> OAuth1Middleware<S, C, HttpsOnly> {
    /// Construct a new middleware from a token manager and the application's
    /// consumer credentials
    ///
    /// By default, this middleware will only sign a request if it is being
    /// sent via HTTPS. To change this behavior, provide a custom predicate
    /// with [`with_predicate()`][Self::with_predicate()].
    pub fn new(
        token_manager: TokenManager<S, C>,
        consumer_key: ConsumerKey,
        consumer_secret: ConsumerSecret,
    ) -> Self {
        Self {
            token_manager,
            consumer_key,
            consumer_secret,
            predicate: HttpsOnly,
        }
    }

    /// Replaces the default predicate with a custom predicate
    pub fn with_predicate<P>(self, predicate: P) -> OAuth1Middleware<S, C, P> {
        OAuth1Middleware {
            token_manager: self.token_manager,
            consumer_key: self.consumer_key,
            consumer_secret: self.consumer_secret,
            predicate,
        }
    }
}

impl<S, C, P> OAuth1Middleware<S, C, P> {
    /// The token manager supplying credentials to this middleware
    pub fn token_manager(&self) -> &TokenManager<S, C> {
        &self.token_manager
    }

    fn authorization_for(
        &self,
        req: &Request,
        credential: &Credential,
    ) -> Result<header::HeaderValue> {
        let now = System.now();

        if tracing::enabled!(tracing::Level::TRACE) {
            tracing::trace!(
                credential.status = ?credential.status_at(now),
                credential.issued = credential.issued().0,
                credential.expires_at = credential.expires_at().0,
                credential.until_expired = credential.until_expired_at(now).0,
                "signing request"
            );
        }

        let signer = SigningCredentials {
            consumer_key: &self.consumer_key,
            consumer_secret: &self.consumer_secret,
            token: credential.token(),
            token_secret: credential.token_secret(),
        };

        let authorization = signer.authorization(
            req.method(),
            req.url(),
            &form_params(req).map_err(reqwest_middleware::Error::middleware)?,
            &oauth1::generate_nonce(),
            now.0,
        );

        let mut value = header::HeaderValue::try_from(authorization)
            .map_err(reqwest_middleware::Error::middleware)?;
        value.set_sensitive(true);
        Ok(value)
    }
}

fn form_params(
    req: &Request,
) -> std::result::Result<Vec<(String, String)>, serde_urlencoded::de::Error> {
    let is_form = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map_or(false, |value| {
            value.starts_with("application/x-www-form-urlencoded")
        });

    match req.body().and_then(|body| body.as_bytes()) {
        Some(body) if is_form => oauth1::parse_form_body(body),
        _ => Ok(Vec::new()),
    }
}

#[async_trait::async_trait]
impl<S, C, P> Middleware for OAuth1Middleware<S, C, P>
where
    S: AsyncCredentialSource + 'static,
    C: Clock + Send + Sync + 'static,
    P: Predicate<Request> + Send + Sync + 'static,
{
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        if self.predicate.eval(&req) && !req.headers().contains_key(header::AUTHORIZATION) {
            let credential = self
                .token_manager
                .get_valid_token()
                .await
                .map_err(reqwest_middleware::Error::middleware)?;

            let value = self.authorization_for(&req, &credential)?;

            req.headers_mut().insert(header::AUTHORIZATION, value);
        }

        next.run(req, extensions).await
    }
}

/// Only sign a request if it is being sent over HTTPS
#[derive(Clone, Copy, Debug)]
pub struct HttpsOnly;

impl Predicate<Request> for HttpsOnly {
    #[inline]
    fn eval(&self, req: &Request) -> bool {
        req.url().scheme() == "https"
    }

    fn find_case(&self, expected: bool, req: &Request) -> Option<reflection::Case<'_>> {
        let result = self.eval(req);
        if result != expected {
            Some(
                reflection::Case::new(Some(self), result).add_product(reflection::Product::new(
                    "scheme",
                    req.url().scheme().to_owned(),
                )),
            )
        } else {
            None
        }
    }
}

impl reflection::PredicateReflection for HttpsOnly {}
impl fmt::Display for HttpsOnly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("scheme is https")
    }
}

/// Only sign a request if it is being sent to the exact host specified
#[derive(Clone, Debug)]
pub struct ExactHostMatch {
    host: String,
}

impl ExactHostMatch {
    /// Construct a new predicate from a host string
    pub fn new<S>(host: S) -> Self
    where
        S: ToString,
    {
        Self {
            host: host.to_string(),
        }
    }

    /// The host that requests must be sent to
    pub fn host(&self) -> &str {
        &self.host
    }
}

impl Predicate<Request> for ExactHostMatch {
    #[inline]
    fn eval(&self, req: &Request) -> bool {
        req.url().host_str() == Some(&self.host)
    }

    fn find_case(&self, expected: bool, req: &Request) -> Option<reflection::Case<'_>> {
        let result = self.eval(req);
        if result != expected {
            Some(
                reflection::Case::new(Some(self), result).add_product(reflection::Product::new(
                    "host",
                    req.url().host_str().unwrap_or("<no host>").to_owned(),
                )),
            )
        } else {
            None
        }
    }
}

impl reflection::PredicateReflection for ExactHostMatch {}
impl fmt::Display for ExactHostMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("host == ")?;
        f.write_str(&self.host)
    }
}
