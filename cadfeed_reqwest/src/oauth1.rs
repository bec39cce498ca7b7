//! OAuth 1.0a request signatures using HMAC-SHA1
//!
//! Implements the signature base string and header construction of RFC 5849.
//! The middleware in this crate drives these functions, but they are exposed
//! for callers that need to sign requests outside of a `reqwest` client.

use base64::{engine::general_purpose::STANDARD, Engine};
use cadfeed_saml::{ConsumerKeyRef, ConsumerSecretRef};
use cadfeed_tokens::{OAuthTokenRef, OAuthTokenSecretRef};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rand::{distributions::Alphanumeric, Rng};
use reqwest::{Method, Url};
use ring::hmac;

/// The signature method advertised in `oauth_signature_method`
pub const SIGNATURE_METHOD: &str = "HMAC-SHA1";

/// The protocol version advertised in `oauth_version`
pub const VERSION: &str = "1.0";

const NONCE_LEN: usize = 32;

/// Everything but the RFC 3986 unreserved characters
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encodes a value as required for OAuth 1.0a parameters
pub fn encode(value: &str) -> String {
    utf8_percent_encode(value, UNRESERVED).to_string()
}

/// Generates a random alphanumeric nonce
pub fn generate_nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NONCE_LEN)
        .map(char::from)
        .collect()
}

/// The credentials that contribute to a request signature
#[derive(Clone, Copy, Debug)]
pub struct SigningCredentials<'a> {
    /// The application's consumer key
    pub consumer_key: &'a ConsumerKeyRef,
    /// The application's consumer secret
    pub consumer_secret: &'a ConsumerSecretRef,
    /// The OAuth token obtained from the exchange
    pub token: &'a OAuthTokenRef,
    /// The secret paired with the OAuth token
    pub token_secret: &'a OAuthTokenSecretRef,
}

impl<'a> SigningCredentials<'a> {
    /// Computes the value of the `Authorization` header for a request
    ///
    /// Query parameters are taken from `url`. `form_params` must hold the
    /// decoded pairs of an `application/x-www-form-urlencoded` body, if the
    /// request has one.
    pub fn authorization(
        &self,
        method: &Method,
        url: &Url,
        form_params: &[(String, String)],
        nonce: &str,
        timestamp: u64,
    ) -> String {
        let timestamp = timestamp.to_string();
        let protocol_params = [
            ("oauth_consumer_key", self.consumer_key.as_str()),
            ("oauth_nonce", nonce),
            ("oauth_signature_method", SIGNATURE_METHOD),
            ("oauth_timestamp", timestamp.as_str()),
            ("oauth_token", self.token.as_str()),
            ("oauth_version", VERSION),
        ];

        let base_string = signature_base_string(
            method,
            url,
            protocol_params.iter().copied().chain(
                form_params
                    .iter()
                    .map(|(name, value)| (name.as_str(), value.as_str())),
            ),
        );
        let signature = sign(&base_string, self.consumer_secret, self.token_secret);

        let (before, after) = protocol_params.split_at(2);
        let header_params = before
            .iter()
            .copied()
            .chain(std::iter::once(("oauth_signature", signature.as_str())))
            .chain(after.iter().copied());

        let mut header = String::from("OAuth ");
        for (idx, (name, value)) in header_params.enumerate() {
            if idx > 0 {
                header.push_str(", ");
            }
            header.push_str(name);
            header.push_str("=\"");
            header.push_str(&encode(value));
            header.push('"');
        }
        header
    }
}

/// Builds the signature base string for a request
///
/// `params` holds the protocol and body parameters, unencoded. Query
/// parameters are read from `url`.
pub fn signature_base_string<'p>(
    method: &Method,
    url: &Url,
    params: impl IntoIterator<Item = (&'p str, &'p str)>,
) -> String {
    let mut encoded: Vec<(String, String)> = url
        .query_pairs()
        .map(|(name, value)| (encode(&name), encode(&value)))
        .chain(
            params
                .into_iter()
                .map(|(name, value)| (encode(name), encode(value))),
        )
        .collect();
    encoded.sort();

    let mut normalized = String::new();
    for (idx, (name, value)) in encoded.iter().enumerate() {
        if idx > 0 {
            normalized.push('&');
        }
        normalized.push_str(name);
        normalized.push('=');
        normalized.push_str(value);
    }

    format!(
        "{}&{}&{}",
        method.as_str().to_ascii_uppercase(),
        encode(&base_url(url)),
        encode(&normalized)
    )
}

/// Signs a base string with HMAC-SHA1, returning the base64-encoded digest
pub fn sign(
    base_string: &str,
    consumer_secret: &ConsumerSecretRef,
    token_secret: &OAuthTokenSecretRef,
) -> String {
    let key = format!(
        "{}&{}",
        encode(consumer_secret.as_str()),
        encode(token_secret.as_str())
    );
    let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, key.as_bytes());
    STANDARD.encode(hmac::sign(&key, base_string.as_bytes()))
}

/// Decodes the pairs of an `application/x-www-form-urlencoded` body
pub fn parse_form_body(
    body: &[u8],
) -> Result<Vec<(String, String)>, serde_urlencoded::de::Error> {
    serde_urlencoded::from_bytes(body)
}

/// Scheme, host, non-default port, and path
fn base_url(url: &Url) -> String {
    let mut base = String::new();
    base.push_str(url.scheme());
    base.push_str("://");
    base.push_str(&url.host_str().unwrap_or_default().to_ascii_lowercase());
    if let Some(port) = url.port() {
        base.push(':');
        base.push_str(&port.to_string());
    }
    base.push_str(url.path());
    base
}
