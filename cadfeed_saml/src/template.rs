//! Canonical text renderings of the assertion and its signature
//!
//! The receiving validator compares digests over these exact bytes, so the
//! renderings are already in exclusive canonical form: no insignificant
//! whitespace, explicit end tags, and namespace declarations on the apex
//! element of each signed fragment.

use std::fmt::Write as _;

use aliri_clock::UnixTime;
use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::escape::partial_escape;

use crate::error::TemplateRenderError;

const SAML_ASSERTION_NS: &str = "urn:oasis:names:tc:SAML:2.0:assertion";
const NAME_ID_FORMAT: &str = "urn:oasis:names:tc:SAML:1.1:nameid-format:unspecified";
const BEARER_METHOD: &str = "urn:oasis:names:tc:SAML:2.0:cm:bearer";
const AUTHN_CONTEXT_CLASS: &str = "urn:oasis:names:tc:SAML:2.0:ac:classes:unspecified";

const XMLDSIG_NS: &str = "http://www.w3.org/2000/09/xmldsig#";
const EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
const RSA_SHA1: &str = "http://www.w3.org/2000/09/xmldsig#rsa-sha1";
const ENVELOPED_SIGNATURE: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";
const SHA1: &str = "http://www.w3.org/2000/09/xmldsig#sha1";

pub(crate) const ISSUER_ELEMENT: &[u8] = b"saml2:Issuer";
pub(crate) const SUBJECT_ELEMENT: &[u8] = b"saml2:Subject";

/// Values substituted into the unsigned assertion
#[derive(Debug)]
pub(crate) struct AssertionFields<'a> {
    pub id: &'a str,
    pub issue_instant: &'a str,
    pub not_before: &'a str,
    pub not_on_or_after: &'a str,
    pub issuer_id: &'a str,
    pub customer_id: &'a str,
    pub audience: &'a str,
}

/// Formats a time as RFC 3339 with second precision and a numeric offset
pub(crate) fn format_instant(time: UnixTime) -> Result<String, TemplateRenderError> {
    let secs = i64::try_from(time.0).map_err(|_| TemplateRenderError::TimestampOutOfRange(time.0))?;
    let instant: DateTime<Utc> = DateTime::from_timestamp(secs, 0)
        .ok_or(TemplateRenderError::TimestampOutOfRange(time.0))?;

    Ok(instant.to_rfc3339_opts(SecondsFormat::Secs, false))
}

pub(crate) fn render_assertion(fields: &AssertionFields<'_>) -> String {
    let mut xml = String::with_capacity(1024);

    // Writing into a `String` cannot fail
    let _ = write!(
        xml,
        concat!(
            r#"<saml2:Assertion xmlns:saml2="{ns}" ID="{id}" IssueInstant="{instant}" Version="2.0">"#,
            "<saml2:Issuer>{issuer}</saml2:Issuer>",
            "<saml2:Subject>",
            r#"<saml2:NameID Format="{name_id_format}">{customer}</saml2:NameID>"#,
            r#"<saml2:SubjectConfirmation Method="{bearer}"></saml2:SubjectConfirmation>"#,
            "</saml2:Subject>",
            r#"<saml2:Conditions NotBefore="{not_before}" NotOnOrAfter="{not_on_or_after}">"#,
            "<saml2:AudienceRestriction>",
            "<saml2:Audience>{audience}</saml2:Audience>",
            "</saml2:AudienceRestriction>",
            "</saml2:Conditions>",
            r#"<saml2:AuthnStatement AuthnInstant="{instant}" SessionIndex="{id}">"#,
            "<saml2:AuthnContext>",
            "<saml2:AuthnContextClassRef>{authn_class}</saml2:AuthnContextClassRef>",
            "</saml2:AuthnContext>",
            "</saml2:AuthnStatement>",
            "</saml2:Assertion>",
        ),
        ns = SAML_ASSERTION_NS,
        id = fields.id,
        instant = fields.issue_instant,
        issuer = escape_text(fields.issuer_id),
        name_id_format = NAME_ID_FORMAT,
        customer = escape_text(fields.customer_id),
        bearer = BEARER_METHOD,
        not_before = fields.not_before,
        not_on_or_after = fields.not_on_or_after,
        audience = escape_text(fields.audience),
        authn_class = AUTHN_CONTEXT_CLASS,
    );

    xml
}

/// Escapes character data the way exclusive canonicalization writes it
///
/// Quotes are left alone in text nodes; only `&`, `<`, `>`, and carriage
/// returns are replaced.
fn escape_text(raw: &str) -> String {
    partial_escape(raw).replace('\r', "&#xD;")
}

/// Renders the `SignedInfo` element in the form that is signed
pub(crate) fn render_signed_info(id: &str, digest: &str) -> String {
    format!(
        concat!(
            r#"<ds:SignedInfo xmlns:ds="{ds}">"#,
            r#"<ds:CanonicalizationMethod Algorithm="{c14n}"></ds:CanonicalizationMethod>"#,
            r#"<ds:SignatureMethod Algorithm="{rsa_sha1}"></ds:SignatureMethod>"#,
            r##"<ds:Reference URI="#{id}">"##,
            "<ds:Transforms>",
            r#"<ds:Transform Algorithm="{enveloped}"></ds:Transform>"#,
            r#"<ds:Transform Algorithm="{c14n}"></ds:Transform>"#,
            "</ds:Transforms>",
            r#"<ds:DigestMethod Algorithm="{sha1}"></ds:DigestMethod>"#,
            "<ds:DigestValue>{digest}</ds:DigestValue>",
            "</ds:Reference>",
            "</ds:SignedInfo>",
        ),
        ds = XMLDSIG_NS,
        c14n = EXC_C14N,
        rsa_sha1 = RSA_SHA1,
        id = id,
        enveloped = ENVELOPED_SIGNATURE,
        sha1 = SHA1,
        digest = digest,
    )
}

/// Renders the complete `Signature` element that is embedded in the assertion
pub(crate) fn render_signature(id: &str, digest: &str, signature_value: &str) -> String {
    format!(
        concat!(
            r#"<ds:Signature xmlns:ds="{ds}">"#,
            "<ds:SignedInfo>",
            r#"<ds:CanonicalizationMethod Algorithm="{c14n}"/>"#,
            r#"<ds:SignatureMethod Algorithm="{rsa_sha1}"/>"#,
            r##"<ds:Reference URI="#{id}">"##,
            "<ds:Transforms>",
            r#"<ds:Transform Algorithm="{enveloped}"/>"#,
            r#"<ds:Transform Algorithm="{c14n}"/>"#,
            "</ds:Transforms>",
            r#"<ds:DigestMethod Algorithm="{sha1}"/>"#,
            "<ds:DigestValue>{digest}</ds:DigestValue>",
            "</ds:Reference>",
            "</ds:SignedInfo>",
            "<ds:SignatureValue>{signature_value}</ds:SignatureValue>",
            "</ds:Signature>",
        ),
        ds = XMLDSIG_NS,
        c14n = EXC_C14N,
        rsa_sha1 = RSA_SHA1,
        id = id,
        enveloped = ENVELOPED_SIGNATURE,
        sha1 = SHA1,
        digest = digest,
        signature_value = signature_value,
    )
}
