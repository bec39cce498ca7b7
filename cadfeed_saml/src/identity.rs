use crate::{ConsumerKey, ConsumerSecret, CustomerId, IssuerId, SigningKey};

/// The caller's identity as presented to the token-issuing service
///
/// An identity is immutable once constructed and is typically shared behind
/// an [`Arc`][std::sync::Arc] for the lifetime of a client.
#[derive(Clone, Debug)]
pub struct Identity {
    issuer_id: IssuerId,
    customer_id: CustomerId,
    consumer_key: ConsumerKey,
    consumer_secret: ConsumerSecret,
    signing_key: SigningKey,
}

impl Identity {
    /// Constructs a new identity
    pub fn new(
        issuer_id: IssuerId,
        customer_id: CustomerId,
        consumer_key: ConsumerKey,
        consumer_secret: ConsumerSecret,
        signing_key: SigningKey,
    ) -> Self {
        Self {
            issuer_id,
            customer_id,
            consumer_key,
            consumer_secret,
            signing_key,
        }
    }

    /// The issuer ID
    #[inline]
    pub fn issuer_id(&self) -> &IssuerId {
        &self.issuer_id
    }

    /// The customer ID
    #[inline]
    pub fn customer_id(&self) -> &CustomerId {
        &self.customer_id
    }

    /// The OAuth consumer key
    #[inline]
    pub fn consumer_key(&self) -> &ConsumerKey {
        &self.consumer_key
    }

    /// The OAuth consumer secret
    #[inline]
    pub fn consumer_secret(&self) -> &ConsumerSecret {
        &self.consumer_secret
    }

    /// The key used to sign assertions
    #[inline]
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }
}
