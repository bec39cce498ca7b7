//! Request bodies sent to the aggregation API

use std::fmt;

use serde::Serialize;

/// The credential name the API uses for the institution login username
pub const USERNAME_CREDENTIAL: &str = "Banking Userid";

/// The credential name the API uses for the institution login password
pub const PASSWORD_CREDENTIAL: &str = "Banking Password";

/// Institution login credentials, as submitted when adding or updating a login
#[derive(Serialize)]
pub struct CredentialsBody<'a> {
    credentials: CredentialList<'a>,
}

#[derive(Serialize)]
struct CredentialList<'a> {
    credential: [NamedCredential<'a>; 2],
}

#[derive(Serialize)]
struct NamedCredential<'a> {
    name: &'static str,
    value: &'a str,
}

impl<'a> CredentialsBody<'a> {
    /// A username and password pair for an institution login
    pub fn banking(username: &'a str, password: &'a str) -> Self {
        Self {
            credentials: CredentialList {
                credential: [
                    NamedCredential {
                        name: USERNAME_CREDENTIAL,
                        value: username,
                    },
                    NamedCredential {
                        name: PASSWORD_CREDENTIAL,
                        value: password,
                    },
                ],
            },
        }
    }
}

impl fmt::Debug for CredentialsBody<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsBody")
            .field("username", &self.credentials.credential[0].value)
            .field("password", &"***")
            .finish()
    }
}

/// Changes the type of an investment account
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountTypeBody<'a> {
    investment_account: InvestmentAccount<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InvestmentAccount<'a> {
    investment_account_type: &'a str,
}

impl<'a> AccountTypeBody<'a> {
    /// Sets an investment account's type, such as `401K`
    pub fn investment(investment_account_type: &'a str) -> Self {
        Self {
            investment_account: InvestmentAccount {
                investment_account_type,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn credentials_have_the_expected_shape() {
        let body = serde_json::to_value(CredentialsBody::banking("direct", "blah")).unwrap();

        assert_eq!(
            body,
            json!({
                "credentials": {
                    "credential": [
                        { "name": "Banking Userid", "value": "direct" },
                        { "name": "Banking Password", "value": "blah" },
                    ]
                }
            })
        );
    }

    #[test]
    fn credentials_debug_hides_the_password() {
        let debug = format!("{:?}", CredentialsBody::banking("direct", "hunter2"));

        assert!(debug.contains("direct"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn account_type_has_the_expected_shape() {
        let body = serde_json::to_value(AccountTypeBody::investment("401K")).unwrap();

        assert_eq!(
            body,
            json!({ "investmentAccount": { "investmentAccountType": "401K" } })
        );
    }
}
