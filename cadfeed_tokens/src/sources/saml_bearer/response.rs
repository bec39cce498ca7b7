//! Parsing of the provider's token exchange response
//!
//! A successful exchange answers with exactly
//! `oauth_token_secret=<secret>&oauth_token=<token>`, in that order.

use percent_encoding::percent_decode_str;

use super::ExchangeError;
use crate::{OAuthToken, OAuthTokenSecret};

/// Marker the provider includes in bodies describing a rejected assertion
pub(super) const PROBLEM_MARKER: &str = "oauth_problem";

const MAX_PROBLEM_LEN: usize = 256;

#[derive(Debug)]
pub(super) struct TokenResponse {
    pub token: OAuthToken,
    pub token_secret: OAuthTokenSecret,
}

pub(super) fn parse(body: &str) -> Result<TokenResponse, ExchangeError> {
    let body = body.trim();

    if let Some(problem) = problem(body) {
        return Err(ExchangeError::SamlRejected { problem });
    }

    let mut fields = body.split('&');
    let (secret_field, token_field) = match (fields.next(), fields.next(), fields.next()) {
        (Some(secret), Some(token), None) => (secret, token),
        _ => return Err(malformed("expected exactly two fields")),
    };

    let token_secret = field_value(secret_field, "oauth_token_secret")?;
    let token = field_value(token_field, "oauth_token")?;

    Ok(TokenResponse {
        token: OAuthToken::new(token),
        token_secret: OAuthTokenSecret::new(token_secret),
    })
}

/// Extracts the provider's description of a problem, if the body reports one
pub(super) fn problem(body: &str) -> Option<String> {
    if !body.contains(PROBLEM_MARKER) {
        return None;
    }

    let described = body
        .split('&')
        .find_map(|field| field.trim().strip_prefix("oauth_problem="))
        .map(|value| percent_decode_str(value).decode_utf8_lossy().into_owned())
        .unwrap_or_else(|| body.to_owned());

    Some(described.chars().take(MAX_PROBLEM_LEN).collect())
}

fn field_value(field: &str, expected_key: &'static str) -> Result<String, ExchangeError> {
    let (key, value) = field
        .split_once('=')
        .ok_or_else(|| malformed("field is not a key/value pair"))?;

    if key != expected_key {
        return Err(malformed("unexpected field or field order"));
    }

    if value.is_empty() {
        return Err(malformed("field has an empty value"));
    }

    percent_decode_str(value)
        .decode_utf8()
        .map(|v| v.into_owned())
        .map_err(|_| malformed("field value is not valid UTF-8"))
}

fn malformed(reason: &'static str) -> ExchangeError {
    ExchangeError::MalformedResponse { reason }
}
