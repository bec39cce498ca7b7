use std::{fmt, sync::Arc};

use bytes::Bytes;
use cadfeed_reqwest::{ExactHostMatch, OAuth1Middleware};
use cadfeed_saml::{AssertionBuilder, Identity, SigningKey};
use cadfeed_tokens::{
    sources::saml_bearer::SamlBearerCredentialSource, Credential, CredentialLifetimeConfig,
    TokenManager,
};
use chrono::NaiveDate;
use reqwest::{header, Method};
use reqwest_middleware::{ClientWithMiddleware, RequestBuilder};
use serde_json::Value;
use tracing::Instrument;
use url::Url;

use crate::{
    dto::{AccountTypeBody, CredentialsBody},
    error::{ApiError, ConfigError, Error},
    ClientConfig,
};

/// A client for the aggregation API
///
/// Every request is signed with the credential held by the client's
/// [`TokenManager`]. The first request performs the SAML bearer exchange;
/// later requests reuse the credential until its lease runs out. Cloning a
/// client is cheap, and clones share the same credential.
///
/// Responses are returned as untyped JSON.
#[derive(Clone, Debug)]
pub struct Client {
    http: ClientWithMiddleware,
    base_url: Url,
    token_manager: TokenManager<SamlBearerCredentialSource>,
}

impl Client {
    /// Constructs a client from its configuration
    ///
    /// The private key is read here; no network call is made.
    ///
    /// # Errors
    ///
    /// An identity field is empty or the private key cannot be loaded.
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(ConfigError::HttpClient)?;

        Self::with_http_client(config, http)
    }

    /// Constructs a client that sends its requests through `http`
    ///
    /// # Errors
    ///
    /// An identity field is empty or the private key cannot be loaded.
    #[tracing::instrument(
        err,
        skip_all,
        fields(
            issuer_id = %config.issuer_id(),
            customer_id = %config.customer_id(),
            base_url = %config.base_url(),
        ),
    )]
    pub fn with_http_client(config: ClientConfig, http: reqwest::Client) -> Result<Self, Error> {
        config.validate()?;

        let signing_key = SigningKey::from_pem_file(config.private_key_path())?;

        let identity = Arc::new(Identity::new(
            config.issuer_id().clone(),
            config.customer_id().clone(),
            config.consumer_key().clone(),
            config.consumer_secret().clone(),
            signing_key,
        ));

        let mut assertions =
            AssertionBuilder::new(config.audience()).with_window(config.assertion_window());
        if let Some(path) = config.assertion_dump() {
            assertions = assertions.with_debug_dump(path);
        }

        let source = SamlBearerCredentialSource::new(
            http.clone(),
            config.token_url().clone(),
            identity,
            assertions,
            CredentialLifetimeConfig::new(config.credential_lease()),
        )
        .with_timeout(config.exchange_timeout());

        let token_manager = TokenManager::new(source);

        let host = config
            .base_url()
            .host_str()
            .ok_or(ConfigError::InvalidUrl {
                name: "base_url",
                source: None,
            })?;

        let middleware = OAuth1Middleware::new(
            token_manager.clone(),
            config.consumer_key().clone(),
            config.consumer_secret().clone(),
        )
        .with_predicate(ExactHostMatch::new(host));

        let http = reqwest_middleware::ClientBuilder::new(http)
            .with(middleware)
            .build();

        tracing::debug!("client ready");

        Ok(Self {
            http,
            base_url: config.base_url().clone(),
            token_manager,
        })
    }

    /// The manager holding this client's credential
    pub fn token_manager(&self) -> &TokenManager<SamlBearerCredentialSource> {
        &self.token_manager
    }

    /// Returns a valid credential, exchanging for a new one only if necessary
    pub async fn get_valid_token(&self) -> Result<Arc<Credential>, Error> {
        Ok(self.token_manager.get_valid_token().await?)
    }

    /// Unconditionally exchanges a new assertion for a new credential
    pub async fn authenticate(&self) -> Result<Arc<Credential>, Error> {
        Ok(self.token_manager.authenticate().await?)
    }

    /// Lists the institutions the feed supports
    pub async fn institutions(&self) -> Result<Value, Error> {
        self.execute_json(self.request(Method::GET, &["institutions"]))
            .await
    }

    /// Describes a single institution, including the credentials it requires
    pub async fn institution_details(
        &self,
        institution_id: impl fmt::Display,
    ) -> Result<Value, Error> {
        let institution_id = institution_id.to_string();
        self.execute_json(self.request(Method::GET, &["institutions", &institution_id]))
            .await
    }

    /// Logs in to an institution and adds the accounts found there
    pub async fn discover_and_add_accounts(
        &self,
        username: &str,
        password: &str,
        institution_id: impl fmt::Display,
    ) -> Result<Value, Error> {
        let institution_id = institution_id.to_string();
        let request = self
            .request(Method::POST, &["institutions", &institution_id, "logins"])
            .json(&CredentialsBody::banking(username, password));

        self.execute_json(request).await
    }

    /// Lists every account of the customer
    pub async fn customer_accounts(&self) -> Result<Value, Error> {
        self.execute_json(self.request(Method::GET, &["accounts"]))
            .await
    }

    /// Lists the accounts reached through a single institution login
    pub async fn login_accounts(&self, login_id: impl fmt::Display) -> Result<Value, Error> {
        let login_id = login_id.to_string();
        self.execute_json(self.request(Method::GET, &["logins", &login_id, "accounts"]))
            .await
    }

    /// Describes a single account
    pub async fn account(&self, account_id: impl fmt::Display) -> Result<Value, Error> {
        let account_id = account_id.to_string();
        self.execute_json(self.request(Method::GET, &["accounts", &account_id]))
            .await
    }

    /// Lists an account's transactions between two dates, inclusive
    pub async fn account_transactions(
        &self,
        account_id: impl fmt::Display,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Value, Error> {
        let account_id = account_id.to_string();
        let request = self
            .request(Method::GET, &["accounts", &account_id, "transactions"])
            .query(&[
                ("txnStartDate", start.to_string()),
                ("txnEndDate", end.to_string()),
            ]);

        self.execute_json(request).await
    }

    /// Replaces the credentials of an institution login and refreshes its
    /// accounts
    pub async fn update_institution_login(
        &self,
        login_id: impl fmt::Display,
        username: &str,
        new_password: &str,
    ) -> Result<Value, Error> {
        let login_id = login_id.to_string();
        let request = self
            .request(Method::PUT, &["logins", &login_id])
            .query(&[("refresh", "true")])
            .json(&CredentialsBody::banking(username, new_password));

        self.execute_json(request).await
    }

    /// Changes the type of an investment account, such as to `401K`
    pub async fn update_account_type(
        &self,
        account_id: impl fmt::Display,
        investment_account_type: &str,
    ) -> Result<Value, Error> {
        let account_id = account_id.to_string();
        let request = self
            .request(Method::PUT, &["accounts", &account_id])
            .json(&AccountTypeBody::investment(investment_account_type));

        self.execute_json(request).await
    }

    /// Deletes an account
    pub async fn delete_account(&self, account_id: impl fmt::Display) -> Result<(), Error> {
        let account_id = account_id.to_string();
        self.execute(self.request(Method::DELETE, &["accounts", &account_id]))
            .await?;
        Ok(())
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        self.http
            .request(method, self.endpoint(segments))
            .header(header::ACCEPT, "application/json")
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Bytes, Error> {
        let request = request.build().map_err(ApiError::Build)?;

        let span = tracing::debug_span!(
            "api_call",
            method = %request.method(),
            path = request.url().path(),
            status = tracing::field::Empty,
        );

        self.send(request).instrument(span).await
    }

    async fn send(&self, request: reqwest::Request) -> Result<Bytes, Error> {
        let response = self.http.execute(request).await?;

        let status = response.status();
        tracing::Span::current().record("status", status.as_u16());

        let body = response.bytes().await.map_err(ApiError::BodyRead)?;

        if !status.is_success() {
            tracing::warn!("API responded with an unsuccessful status");
            return Err(ApiError::Status {
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            }
            .into());
        }

        tracing::debug!(len = body.len(), "API call succeeded");
        Ok(body)
    }

    async fn execute_json(&self, request: RequestBuilder) -> Result<Value, Error> {
        let body = self.execute(request).await?;

        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }

        serde_json::from_slice(&body).map_err(|err| ApiError::Decode(err).into())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use cadfeed_saml::{ConsumerKey, ConsumerSecret, CustomerId, IssuerId};
    use cadfeed_tokens::{sources::saml_bearer::ExchangeError, CredentialState};
    use color_eyre::Result;
    use openssl::{pkey::PKey, rsa::Rsa};
    use serde_json::json;
    use tempfile::NamedTempFile;
    use wiremock::{
        matchers::{body_json, body_string_contains, header_regex, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;

    const TOKEN_PATH: &str = "/oauth/v1/get_access_token_by_saml";
    const SIGNED_HEADER: &str = concat!(
        r#"^OAuth oauth_consumer_key="CONSUMERKEY", "#,
        r#"oauth_nonce="[A-Za-z0-9]+", "#,
        r#"oauth_signature="[A-Za-z0-9%]+", "#,
        r#"oauth_signature_method="HMAC-SHA1", "#,
        r#"oauth_timestamp="[0-9]+", "#,
        r#"oauth_token="TOKEN456", "#,
        r#"oauth_version="1.0"$"#,
    );

    fn key_file() -> Result<NamedTempFile> {
        let key = PKey::from_rsa(Rsa::generate(2048)?)?;
        let file = NamedTempFile::new()?;
        std::fs::write(file.path(), key.private_key_to_pem_pkcs8()?)?;
        Ok(file)
    }

    fn config(server: &MockServer, key_path: &std::path::Path) -> Result<ClientConfig> {
        Ok(ClientConfig::new(
            IssuerId::from_static("my-issuer"),
            CustomerId::from_static("blah321"),
            ConsumerKey::from_static("CONSUMERKEY"),
            ConsumerSecret::from_static("CONSUMERSECRET"),
            key_path,
            "mytestapp.191934.cc.dev-intuit.ipp.prod",
        )?
        .with_token_url(format!("{}{}", server.uri(), TOKEN_PATH).parse()?)
        .with_base_url(format!("{}/v1", server.uri()).parse()?)?
        .with_exchange_timeout(Duration::from_secs(5)))
    }

    async fn mount_token_endpoint(server: &MockServer, expected_exchanges: u64) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(body_string_contains("saml_assertion="))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("oauth_token_secret=SECRET123&oauth_token=TOKEN456"),
            )
            .expect(expected_exchanges)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn missing_key_file_fails_before_any_network_call() -> Result<()> {
        let server = MockServer::start().await;
        mount_token_endpoint(&server, 0).await;

        let dir = tempfile::tempdir()?;
        let err = Client::new(config(&server, &dir.path().join("missing.key"))?).unwrap_err();

        assert!(
            matches!(
                err,
                Error::Config(ConfigError::Identity(
                    cadfeed_saml::error::ConfigError::KeyUnreadable { .. }
                ))
            ),
            "unexpected error: {:?}",
            err
        );
        Ok(())
    }

    #[tokio::test]
    async fn empty_identity_field_is_a_configuration_error() -> Result<()> {
        let server = MockServer::start().await;
        let key = key_file()?;

        let config = ClientConfig::new(
            IssuerId::from_static(""),
            CustomerId::from_static("blah321"),
            ConsumerKey::from_static("CONSUMERKEY"),
            ConsumerSecret::from_static("CONSUMERSECRET"),
            key.path(),
            "audience",
        )?
        .with_base_url(format!("{}/v1", server.uri()).parse()?)?;

        let err = Client::new(config).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::Identity(
                cadfeed_saml::error::ConfigError::MissingField("issuer_id")
            ))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn requests_are_signed_and_share_one_exchange() -> Result<()> {
        let server = MockServer::start().await;
        let key = key_file()?;
        mount_token_endpoint(&server, 1).await;

        Mock::given(method("GET"))
            .and(path("/v1/accounts"))
            .and(header_regex("authorization", SIGNED_HEADER))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "accounts": [{ "accountId": 75000033008_u64 }]
            })))
            .expect(2)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1/institutions"))
            .and(header_regex("authorization", SIGNED_HEADER))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "institution": [] })))
            .expect(1)
            .mount(&server)
            .await;

        let client = Client::new(config(&server, key.path())?)?;
        assert_eq!(client.token_manager().state(), CredentialState::NoCredential);

        let accounts = client.customer_accounts().await?;
        assert_eq!(accounts["accounts"][0]["accountId"], 75000033008_u64);

        client.customer_accounts().await?;
        client.institutions().await?;

        assert_eq!(client.token_manager().state(), CredentialState::Valid);
        Ok(())
    }

    #[tokio::test]
    async fn discovering_accounts_posts_credentials() -> Result<()> {
        let server = MockServer::start().await;
        let key = key_file()?;
        mount_token_endpoint(&server, 1).await;

        Mock::given(method("POST"))
            .and(path("/v1/institutions/100000/logins"))
            .and(header_regex("authorization", SIGNED_HEADER))
            .and(body_json(json!({
                "credentials": {
                    "credential": [
                        { "name": "Banking Userid", "value": "direct" },
                        { "name": "Banking Password", "value": "blah" },
                    ]
                }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "accounts": [] })))
            .expect(1)
            .mount(&server)
            .await;

        let client = Client::new(config(&server, key.path())?)?;
        let added = client
            .discover_and_add_accounts("direct", "blah", 100000)
            .await?;

        assert_eq!(added, json!({ "accounts": [] }));
        Ok(())
    }

    #[tokio::test]
    async fn transactions_are_requested_for_a_date_range() -> Result<()> {
        let server = MockServer::start().await;
        let key = key_file()?;
        mount_token_endpoint(&server, 1).await;

        Mock::given(method("GET"))
            .and(path("/v1/accounts/400/transactions"))
            .and(query_param("txnStartDate", "2014-01-01"))
            .and(query_param("txnEndDate", "2014-01-31"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "bankingTransactions": [] })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = Client::new(config(&server, key.path())?)?;
        let transactions = client
            .account_transactions(
                400,
                NaiveDate::from_ymd_opt(2014, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2014, 1, 31).unwrap(),
            )
            .await?;

        assert_eq!(transactions, json!({ "bankingTransactions": [] }));
        Ok(())
    }

    #[tokio::test]
    async fn updating_a_login_refreshes_it() -> Result<()> {
        let server = MockServer::start().await;
        let key = key_file()?;
        mount_token_endpoint(&server, 1).await;

        Mock::given(method("PUT"))
            .and(path("/v1/logins/123"))
            .and(query_param("refresh", "true"))
            .and(body_json(json!({
                "credentials": {
                    "credential": [
                        { "name": "Banking Userid", "value": "direct" },
                        { "name": "Banking Password", "value": "new-pass" },
                    ]
                }
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = Client::new(config(&server, key.path())?)?;
        let updated = client
            .update_institution_login(123, "direct", "new-pass")
            .await?;

        assert_eq!(updated, Value::Null);
        Ok(())
    }

    #[tokio::test]
    async fn account_type_and_deletion() -> Result<()> {
        let server = MockServer::start().await;
        let key = key_file()?;
        mount_token_endpoint(&server, 1).await;

        Mock::given(method("PUT"))
            .and(path("/v1/accounts/400"))
            .and(body_json(
                json!({ "investmentAccount": { "investmentAccountType": "401K" } }),
            ))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .and(path("/v1/accounts/400"))
            .and(header_regex("authorization", SIGNED_HEADER))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = Client::new(config(&server, key.path())?)?;
        client.update_account_type(400, "401K").await?;
        client.delete_account(400).await?;
        Ok(())
    }

    #[tokio::test]
    async fn unsuccessful_status_keeps_the_body() -> Result<()> {
        let server = MockServer::start().await;
        let key = key_file()?;
        mount_token_endpoint(&server, 1).await;

        Mock::given(method("GET"))
            .and(path("/v1/accounts/999"))
            .respond_with(ResponseTemplate::new(404).set_body_string(r#"{"code":"404"}"#))
            .mount(&server)
            .await;

        let client = Client::new(config(&server, key.path())?)?;
        let err = client.account(999).await.unwrap_err();

        match err {
            Error::Api(ApiError::Status { status, body }) => {
                assert_eq!(status, reqwest::StatusCode::NOT_FOUND);
                assert_eq!(body, r#"{"code":"404"}"#);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        Ok(())
    }

    #[tokio::test]
    async fn unparsable_body_is_a_decode_error() -> Result<()> {
        let server = MockServer::start().await;
        let key = key_file()?;
        mount_token_endpoint(&server, 1).await;

        Mock::given(method("GET"))
            .and(path("/v1/institutions/100000"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<institution/>"))
            .mount(&server)
            .await;

        let client = Client::new(config(&server, key.path())?)?;
        let err = client.institution_details(100000).await.unwrap_err();

        assert!(matches!(err, Error::Api(ApiError::Decode(_))));
        Ok(())
    }

    #[tokio::test]
    async fn rejected_assertion_surfaces_as_an_exchange_error() -> Result<()> {
        let server = MockServer::start().await;
        let key = key_file()?;

        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(
                ResponseTemplate::new(401).set_body_string("oauth_problem=signature_invalid"),
            )
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(path("/v1/logins/123/accounts"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = Client::new(config(&server, key.path())?)?;
        let err = client.login_accounts(123).await.unwrap_err();

        match err {
            Error::Exchange(ExchangeError::SamlRejected { problem }) => {
                assert_eq!(problem, "signature_invalid")
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(client.token_manager().state(), CredentialState::NoCredential);
        Ok(())
    }

    #[tokio::test]
    async fn requests_to_other_hosts_are_not_signed() -> Result<()> {
        let server = MockServer::start().await;
        let key = key_file()?;
        mount_token_endpoint(&server, 0).await;

        Mock::given(path("/elsewhere"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let config = config(&server, key.path())?
            .with_base_url("https://financialdatafeed.platform.intuit.com/v1".parse()?)?;
        let client = Client::new(config)?;

        client
            .http
            .get(format!("{}/elsewhere", server.uri()))
            .send()
            .await?;

        let received = server.received_requests().await.unwrap_or_default();
        assert_eq!(received.len(), 1);
        assert!(received[0].headers.get(header::AUTHORIZATION).is_none());
        assert_eq!(client.token_manager().state(), CredentialState::NoCredential);
        Ok(())
    }

    #[test]
    fn endpoints_extend_the_base_path() -> Result<()> {
        let key = key_file()?;
        let config = ClientConfig::new(
            IssuerId::from_static("my-issuer"),
            CustomerId::from_static("blah321"),
            ConsumerKey::from_static("CONSUMERKEY"),
            ConsumerSecret::from_static("CONSUMERSECRET"),
            key.path(),
            "audience",
        )?;
        let client = Client::new(config)?;

        assert_eq!(
            client
                .endpoint(&["accounts", "75000033008", "transactions"])
                .as_str(),
            "https://financialdatafeed.platform.intuit.com/v1/accounts/75000033008/transactions"
        );
        assert_eq!(
            client.endpoint(&["logins", "a/b c"]).as_str(),
            "https://financialdatafeed.platform.intuit.com/v1/logins/a%2Fb%20c"
        );
        Ok(())
    }
}
