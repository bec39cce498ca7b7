use std::{error, sync::Arc};

use aliri_clock::{Clock, System};
use arc_swap::ArcSwapOption;
use tokio::sync::Mutex;

use crate::{sources::AsyncCredentialSource, Credential};

/// The state of a token manager's credential slot
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CredentialState {
    /// No credential has been obtained yet
    NoCredential,
    /// The current credential may be used
    Valid,
    /// The current credential's lease has run out
    Stale,
}

#[derive(Debug)]
struct Inner<S, C> {
    source: S,
    current: ArcSwapOption<Credential>,
    exchange: Mutex<()>,
    clock: C,
}

/// Owns the current credential and hands out valid ones on demand
///
/// Cloning a manager is cheap; all clones share the same credential slot.
///
/// A credential is obtained lazily: the first call to
/// [`get_valid_token()`][Self::get_valid_token()] performs an exchange, and
/// later calls reuse the result until its lease runs out. Callers that find
/// the slot stale while an exchange is already underway wait for that exchange
/// and share its credential rather than starting their own.
///
/// A failed exchange never disturbs the slot. The error goes to the caller that
/// triggered the exchange, and the next call starts over.
#[derive(Debug)]
pub struct TokenManager<S, C = System> {
    inner: Arc<Inner<S, C>>,
}

impl<S, C> Clone for TokenManager<S, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> TokenManager<S, System> {
    /// Constructs a new token manager with an empty credential slot
    pub fn new(source: S) -> Self {
        Self::with_clock(source, System)
    }
}

impl<S, C> TokenManager<S, C> {
    /// Constructs a new token manager that judges validity using `clock`
    pub fn with_clock(source: S, clock: C) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                current: ArcSwapOption::empty(),
                exchange: Mutex::new(()),
                clock,
            }),
        }
    }

    /// The current credential, valid or not, without triggering an exchange
    pub fn current(&self) -> Option<Arc<Credential>> {
        self.inner.current.load_full()
    }

    /// The source used to obtain new credentials
    pub fn source(&self) -> &S {
        &self.inner.source
    }
}

impl<S, C> TokenManager<S, C>
where
    S: AsyncCredentialSource,
    C: Clock + Send + Sync,
{
    /// Reports the state of the credential slot
    pub fn state(&self) -> CredentialState {
        let now = self.inner.clock.now();
        match self.inner.current.load().as_deref() {
            None => CredentialState::NoCredential,
            Some(credential) if credential.is_valid_at(now) => CredentialState::Valid,
            Some(_) => CredentialState::Stale,
        }
    }

    /// Returns a valid credential, exchanging for a new one only if necessary
    ///
    /// # Errors
    ///
    /// The slot held no valid credential and obtaining a new one failed.
    pub async fn get_valid_token(&self) -> Result<Arc<Credential>, S::Error> {
        if let Some(credential) = self.valid_credential() {
            tracing::trace!(
                expires_at = credential.expires_at().0,
                "using cached credential"
            );
            return Ok(credential);
        }

        let _exchange = self.inner.exchange.lock().await;

        if let Some(credential) = self.valid_credential() {
            tracing::debug!(
                expires_at = credential.expires_at().0,
                "credential renewed by a concurrent caller"
            );
            return Ok(credential);
        }

        self.renew().await
    }

    /// Unconditionally obtains and stores a new credential
    ///
    /// # Errors
    ///
    /// Obtaining a new credential failed. The slot is left as it was.
    pub async fn authenticate(&self) -> Result<Arc<Credential>, S::Error> {
        let _exchange = self.inner.exchange.lock().await;
        self.renew().await
    }

    fn valid_credential(&self) -> Option<Arc<Credential>> {
        let now = self.inner.clock.now();
        self.inner
            .current
            .load_full()
            .filter(|credential| credential.is_valid_at(now))
    }

    /// Must be called with the exchange lock held
    async fn renew(&self) -> Result<Arc<Credential>, S::Error> {
        tracing::debug!(prior_state = ?self.state(), "requesting new credential");

        match self.inner.source.request_credential().await {
            Ok(credential) => {
                let credential = Arc::new(credential);
                self.inner.current.store(Some(Arc::clone(&credential)));
                Ok(credential)
            }
            Err(error) => {
                tracing::warn!(
                    error = (&error as &dyn error::Error),
                    "unable to obtain credential"
                );
                Err(error)
            }
        }
    }
}
