//! Client configuration
//!
//! A [`ClientConfig`] is either built in code or read from the environment
//! with [`ClientConfig::from_env()`]:
//!
//! | Variable                         | Default                                            |
//! |----------------------------------|----------------------------------------------------|
//! | `CADFEED_ISSUER_ID`              | required                                           |
//! | `CADFEED_CUSTOMER_ID`            | required                                           |
//! | `CADFEED_CONSUMER_KEY`           | required                                           |
//! | `CADFEED_CONSUMER_SECRET`        | required                                           |
//! | `CADFEED_PRIVATE_KEY_PATH`       | required                                           |
//! | `CADFEED_AUDIENCE`               | required                                           |
//! | `CADFEED_TOKEN_URL`              | [`DEFAULT_TOKEN_URL`]                              |
//! | `CADFEED_BASE_URL`               | [`DEFAULT_BASE_URL`]                               |
//! | `CADFEED_EXCHANGE_TIMEOUT_SECS`  | 30                                                 |
//! | `CADFEED_CREDENTIAL_LEASE_SECS`  | 3480 (58 minutes)                                  |
//! | `CADFEED_ASSERTION_DUMP`         | unset; each signed assertion is written here       |

use std::{path::PathBuf, time::Duration};

use aliri_clock::DurationSecs;
use cadfeed_saml::{AssertionWindow, ConsumerKey, ConsumerSecret, CustomerId, IssuerId};
use cadfeed_tokens::{sources::saml_bearer::DEFAULT_EXCHANGE_TIMEOUT, DEFAULT_LEASE};
use url::Url;

use crate::error::ConfigError;

pub use cadfeed_tokens::sources::saml_bearer::DEFAULT_TOKEN_URL;

/// The base URL of the aggregation API
pub const DEFAULT_BASE_URL: &str = "https://financialdatafeed.platform.intuit.com/v1";

const ISSUER_ID: &str = "CADFEED_ISSUER_ID";
const CUSTOMER_ID: &str = "CADFEED_CUSTOMER_ID";
const CONSUMER_KEY: &str = "CADFEED_CONSUMER_KEY";
const CONSUMER_SECRET: &str = "CADFEED_CONSUMER_SECRET";
const PRIVATE_KEY_PATH: &str = "CADFEED_PRIVATE_KEY_PATH";
const AUDIENCE: &str = "CADFEED_AUDIENCE";
const TOKEN_URL: &str = "CADFEED_TOKEN_URL";
const BASE_URL: &str = "CADFEED_BASE_URL";
const EXCHANGE_TIMEOUT_SECS: &str = "CADFEED_EXCHANGE_TIMEOUT_SECS";
const CREDENTIAL_LEASE_SECS: &str = "CADFEED_CREDENTIAL_LEASE_SECS";
const ASSERTION_DUMP: &str = "CADFEED_ASSERTION_DUMP";

/// Everything needed to construct a [`Client`](crate::Client)
#[derive(Clone, Debug)]
pub struct ClientConfig {
    issuer_id: IssuerId,
    customer_id: CustomerId,
    consumer_key: ConsumerKey,
    consumer_secret: ConsumerSecret,
    private_key_path: PathBuf,
    audience: String,
    token_url: Url,
    base_url: Url,
    exchange_timeout: Duration,
    credential_lease: DurationSecs,
    assertion_window: AssertionWindow,
    assertion_dump: Option<PathBuf>,
}

impl ClientConfig {
    /// Constructs a configuration for the production endpoints
    ///
    /// The private key is not read until a client is constructed.
    pub fn new(
        issuer_id: IssuerId,
        customer_id: CustomerId,
        consumer_key: ConsumerKey,
        consumer_secret: ConsumerSecret,
        private_key_path: impl Into<PathBuf>,
        audience: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            issuer_id,
            customer_id,
            consumer_key,
            consumer_secret,
            private_key_path: private_key_path.into(),
            audience: audience.into(),
            token_url: parse_url("token_url", DEFAULT_TOKEN_URL)?,
            base_url: parse_url("base_url", DEFAULT_BASE_URL)?,
            exchange_timeout: DEFAULT_EXCHANGE_TIMEOUT,
            credential_lease: DEFAULT_LEASE,
            assertion_window: AssertionWindow::default(),
            assertion_dump: None,
        })
    }

    /// Reads the configuration from `CADFEED_*` environment variables
    ///
    /// # Errors
    ///
    /// A required variable is unset or a variable holds an unusable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, which resolves a
    /// `CADFEED_*` variable name to its value
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let mut config = Self::new(
            IssuerId::new(required(ISSUER_ID)?),
            CustomerId::new(required(CUSTOMER_ID)?),
            ConsumerKey::new(required(CONSUMER_KEY)?),
            ConsumerSecret::new(required(CONSUMER_SECRET)?),
            required(PRIVATE_KEY_PATH)?,
            required(AUDIENCE)?,
        )?;

        if let Some(url) = lookup(TOKEN_URL) {
            config.token_url = parse_url(TOKEN_URL, &url)?;
        }

        if let Some(url) = lookup(BASE_URL) {
            config = config.with_base_url(parse_url(BASE_URL, &url)?)?;
        }

        if let Some(secs) = lookup(EXCHANGE_TIMEOUT_SECS) {
            config.exchange_timeout =
                Duration::from_secs(parse_secs(EXCHANGE_TIMEOUT_SECS, &secs)?);
        }

        if let Some(secs) = lookup(CREDENTIAL_LEASE_SECS) {
            config.credential_lease = DurationSecs(parse_secs(CREDENTIAL_LEASE_SECS, &secs)?);
        }

        config.assertion_dump = lookup(ASSERTION_DUMP)
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);

        Ok(config)
    }

    /// Replaces the token exchange endpoint
    pub fn with_token_url(mut self, token_url: Url) -> Self {
        self.token_url = token_url;
        self
    }

    /// Replaces the base URL of the aggregation API
    ///
    /// # Errors
    ///
    /// The URL cannot carry a path, such as a `mailto:` URL.
    pub fn with_base_url(mut self, base_url: Url) -> Result<Self, ConfigError> {
        if base_url.cannot_be_a_base() || base_url.host_str().is_none() {
            return Err(ConfigError::InvalidUrl {
                name: "base_url",
                source: None,
            });
        }
        self.base_url = base_url;
        Ok(self)
    }

    /// Replaces the bound on a single token exchange
    pub fn with_exchange_timeout(mut self, timeout: Duration) -> Self {
        self.exchange_timeout = timeout;
        self
    }

    /// Replaces how long an obtained credential is considered valid
    pub fn with_credential_lease(mut self, lease: DurationSecs) -> Self {
        self.credential_lease = lease;
        self
    }

    /// Replaces the validity window of signed assertions
    pub fn with_assertion_window(mut self, window: AssertionWindow) -> Self {
        self.assertion_window = window;
        self
    }

    /// Writes each signed assertion to `path` for troubleshooting
    pub fn with_assertion_dump(mut self, path: impl Into<PathBuf>) -> Self {
        self.assertion_dump = Some(path.into());
        self
    }

    /// The issuer ID assigned to the application
    pub fn issuer_id(&self) -> &IssuerId {
        &self.issuer_id
    }

    /// The customer requests are made on behalf of
    pub fn customer_id(&self) -> &CustomerId {
        &self.customer_id
    }

    /// The application's consumer key
    pub fn consumer_key(&self) -> &ConsumerKey {
        &self.consumer_key
    }

    /// The application's consumer secret
    pub fn consumer_secret(&self) -> &ConsumerSecret {
        &self.consumer_secret
    }

    /// The path of the PEM-encoded RSA signing key
    pub fn private_key_path(&self) -> &std::path::Path {
        &self.private_key_path
    }

    /// The audience assertions are issued for
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// The token exchange endpoint
    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    /// The base URL of the aggregation API
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The bound on a single token exchange
    pub fn exchange_timeout(&self) -> Duration {
        self.exchange_timeout
    }

    /// How long an obtained credential is considered valid
    pub fn credential_lease(&self) -> DurationSecs {
        self.credential_lease
    }

    /// The validity window of signed assertions
    pub fn assertion_window(&self) -> AssertionWindow {
        self.assertion_window
    }

    /// Where signed assertions are written, if anywhere
    pub fn assertion_dump(&self) -> Option<&std::path::Path> {
        self.assertion_dump.as_deref()
    }

    /// Checks that no identity field is empty
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("issuer_id", self.issuer_id.as_str()),
            ("customer_id", self.customer_id.as_str()),
            ("consumer_key", self.consumer_key.as_str()),
            ("consumer_secret", self.consumer_secret.as_str()),
            ("audience", self.audience.as_str()),
        ];

        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(cadfeed_saml::error::ConfigError::MissingField(name).into());
            }
        }

        if self.private_key_path.as_os_str().is_empty() {
            return Err(cadfeed_saml::error::ConfigError::MissingField("private_key_path").into());
        }

        Ok(())
    }
}

fn parse_url(name: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|err| ConfigError::InvalidUrl {
        name,
        source: Some(err),
    })
}

fn parse_secs(name: &'static str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|err: std::num::ParseIntError| ConfigError::Invalid {
            name,
            reason: err.to_string(),
        })
}
