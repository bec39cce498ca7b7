use aliri_clock::{Clock, DurationSecs, System, UnixTime};

use crate::{OAuthToken, OAuthTokenRef, OAuthTokenSecret, OAuthTokenSecretRef};

/// An OAuth token and secret as issued by the provider, with lease information
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credential {
    token: OAuthToken,
    token_secret: OAuthTokenSecret,
    issued: UnixTime,
    expires_at: UnixTime,
}

/// A credential's lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CredentialStatus {
    /// The credential may be used
    Valid,
    /// The credential's lease has run out
    Expired,
}

impl Credential {
    /// Gets the OAuth token
    #[inline]
    pub fn token(&self) -> &OAuthTokenRef {
        &self.token
    }

    /// Gets the OAuth token secret
    #[inline]
    pub fn token_secret(&self) -> &OAuthTokenSecretRef {
        &self.token_secret
    }

    /// Gets the time that the credential was issued
    #[inline]
    pub fn issued(&self) -> UnixTime {
        self.issued
    }

    /// Gets the time that the credential's lease runs out
    #[inline]
    pub fn expires_at(&self) -> UnixTime {
        self.expires_at
    }

    /// Gets the credential's lease
    #[inline]
    pub fn lifetime(&self) -> DurationSecs {
        self.expires_at - self.issued
    }

    /// Whether the credential may still be used at `time`
    #[inline]
    pub fn is_valid_at(&self, time: UnixTime) -> bool {
        time < self.expires_at
    }

    /// Gets the credential's current status
    #[inline]
    pub fn status(&self) -> CredentialStatus {
        self.status_with_clock(&System)
    }

    /// Gets the credential's status based on the current time
    /// as reported by the provided clock
    #[inline]
    pub fn status_with_clock<C: Clock>(&self, clock: &C) -> CredentialStatus {
        self.status_at(clock.now())
    }

    /// Gets the credential's status as of the provided time
    #[inline]
    pub fn status_at(&self, time: UnixTime) -> CredentialStatus {
        if self.is_valid_at(time) {
            CredentialStatus::Valid
        } else {
            CredentialStatus::Expired
        }
    }

    /// Gets a duration for how much longer the credential would be valid as of the
    /// provided time
    #[inline]
    pub fn until_expired_at(&self, time: UnixTime) -> DurationSecs {
        if time < self.expires_at {
            self.expires_at - time
        } else {
            DurationSecs(0)
        }
    }
}

/// The lease granted to new credentials unless configured otherwise
pub const DEFAULT_LEASE: DurationSecs = DurationSecs(58 * 60);

/// Configuration for the lease granted to newly issued credentials
///
/// The provider does not report a lifetime with its tokens. Its tokens live
/// for one hour, so credentials are treated as expired somewhat before that.
#[derive(Clone, Debug)]
pub struct CredentialLifetimeConfig<C = System> {
    lease: DurationSecs,
    clock: C,
}

impl Default for CredentialLifetimeConfig {
    /// Default lifetime configuration
    ///
    /// Uses a lease of 58 minutes and the system clock.
    fn default() -> Self {
        Self {
            lease: DEFAULT_LEASE,
            clock: System,
        }
    }
}

impl CredentialLifetimeConfig {
    /// Constructs a new lifetime configuration with the given lease
    pub fn new(lease: DurationSecs) -> Self {
        Self {
            lease,
            clock: System,
        }
    }
}

impl<C> CredentialLifetimeConfig<C> {
    /// Sets a custom clock to be used
    ///
    /// Useful for testing purposes
    pub fn with_clock<D>(self, clock: D) -> CredentialLifetimeConfig<D> {
        CredentialLifetimeConfig {
            lease: self.lease,
            clock,
        }
    }

    /// The lease granted to new credentials
    #[inline]
    pub fn lease(&self) -> DurationSecs {
        self.lease
    }
}

impl<C: Clock> CredentialLifetimeConfig<C> {
    /// Given a token and secret, constructs a credential leased from now
    pub fn create_credential(
        &self,
        token: OAuthToken,
        token_secret: OAuthTokenSecret,
    ) -> Credential {
        let issued = self.clock.now();
        Credential {
            token,
            token_secret,
            issued,
            expires_at: UnixTime(issued.0.saturating_add(self.lease.0)),
        }
    }
}
