use std::path::PathBuf;

use aliri_clock::{Clock, DurationSecs, System, UnixTime};
use base64::{engine::general_purpose::STANDARD, Engine};
use openssl::sha::sha1;

use crate::{
    error::{AssertionError, TemplateRenderError},
    splice, template, Identity, SignedAssertion,
};

/// The validity window placed in an assertion's conditions
///
/// The window is relative to the time the assertion is generated and
/// tolerates clock skew between the caller and the provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AssertionWindow {
    not_before_skew: DurationSecs,
    not_on_or_after: DurationSecs,
}

impl Default for AssertionWindow {
    /// Valid from five minutes before until ten minutes after generation
    fn default() -> Self {
        Self {
            not_before_skew: DurationSecs(5 * 60),
            not_on_or_after: DurationSecs(10 * 60),
        }
    }
}

impl AssertionWindow {
    /// Constructs a new validity window
    pub const fn new(not_before_skew: DurationSecs, not_on_or_after: DurationSecs) -> Self {
        Self {
            not_before_skew,
            not_on_or_after,
        }
    }

    /// How long before generation the assertion becomes valid
    #[inline]
    pub fn not_before_skew(&self) -> DurationSecs {
        self.not_before_skew
    }

    /// How long after generation the assertion stops being valid
    #[inline]
    pub fn not_on_or_after(&self) -> DurationSecs {
        self.not_on_or_after
    }

    fn bounds(&self, now: UnixTime) -> (UnixTime, UnixTime) {
        let not_before = UnixTime(now.0.saturating_sub(self.not_before_skew.0));
        let not_on_or_after = UnixTime(now.0.saturating_add(self.not_on_or_after.0));
        (not_before, not_on_or_after)
    }
}

/// An assertion document before transport encoding
#[derive(Debug)]
pub struct AssertionDocument {
    id: String,
    xml: String,
}

impl AssertionDocument {
    /// The assertion ID, also used as the session index
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The signed assertion XML
    #[inline]
    pub fn xml(&self) -> &str {
        &self.xml
    }

    /// Base64-encodes the document for transmission
    pub fn encode(&self) -> SignedAssertion {
        SignedAssertion::new(STANDARD.encode(self.xml.as_bytes()))
    }
}

/// Builds signed SAML 2.0 bearer assertions
#[derive(Clone, Debug)]
pub struct AssertionBuilder<C = System> {
    audience: String,
    window: AssertionWindow,
    debug_dump: Option<PathBuf>,
    clock: C,
}

impl AssertionBuilder<System> {
    /// Constructs a builder for assertions addressed to `audience`
    pub fn new(audience: impl Into<String>) -> Self {
        Self {
            audience: audience.into(),
            window: AssertionWindow::default(),
            debug_dump: None,
            clock: System,
        }
    }
}

impl<C> AssertionBuilder<C> {
    /// Replaces the default validity window
    pub fn with_window(mut self, window: AssertionWindow) -> Self {
        self.window = window;
        self
    }

    /// Writes every signed assertion, before encoding, to `path`
    ///
    /// Intended for debugging rejected assertions. Disabled by default.
    pub fn with_debug_dump(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_dump = Some(path.into());
        self
    }

    /// Sets a custom clock to be used
    ///
    /// Useful for testing purposes
    pub fn with_clock<D>(self, clock: D) -> AssertionBuilder<D> {
        AssertionBuilder {
            audience: self.audience,
            window: self.window,
            debug_dump: self.debug_dump,
            clock,
        }
    }

    /// The audience assertions are addressed to
    #[inline]
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// The validity window applied to assertions
    #[inline]
    pub fn window(&self) -> AssertionWindow {
        self.window
    }
}

impl<C: Clock> AssertionBuilder<C> {
    /// Builds, signs and base64-encodes an assertion for `identity`
    ///
    /// # Errors
    ///
    /// A required identity field is empty, or the identity's key failed to
    /// produce a signature.
    pub fn build_signed_assertion(
        &self,
        identity: &Identity,
    ) -> Result<SignedAssertion, AssertionError> {
        Ok(self.build_signed_document(identity)?.encode())
    }

    /// Builds and signs an assertion for `identity` without encoding it
    ///
    /// # Errors
    ///
    /// A required identity field is empty, or the identity's key failed to
    /// produce a signature.
    #[tracing::instrument(
        err,
        skip(self, identity),
        fields(
            issuer_id = %identity.issuer_id(),
            customer_id = %identity.customer_id(),
        ),
    )]
    pub fn build_signed_document(
        &self,
        identity: &Identity,
    ) -> Result<AssertionDocument, AssertionError> {
        require("issuer_id", identity.issuer_id().as_str())?;
        require("customer_id", identity.customer_id().as_str())?;
        require("audience", &self.audience)?;

        let id = format!("_{}", uuid::Uuid::new_v4().simple());

        let now = self.clock.now();
        let (not_before, not_on_or_after) = self.window.bounds(now);
        let issue_instant = template::format_instant(now)?;
        let not_before = template::format_instant(not_before)?;
        let not_on_or_after = template::format_instant(not_on_or_after)?;

        let unsigned = template::render_assertion(&template::AssertionFields {
            id: &id,
            issue_instant: &issue_instant,
            not_before: &not_before,
            not_on_or_after: &not_on_or_after,
            issuer_id: identity.issuer_id().as_str(),
            customer_id: identity.customer_id().as_str(),
            audience: &self.audience,
        });

        let digest = STANDARD.encode(sha1(unsigned.as_bytes()));

        let signed_info = template::render_signed_info(&id, &digest);
        let raw_signature = identity.signing_key().sign_sha1(signed_info.as_bytes())?;
        let mut signature_value = STANDARD.encode(raw_signature);
        signature_value.retain(|c| c != '\n' && c != '\r');

        let signature = template::render_signature(&id, &digest, &signature_value);
        let xml = splice::insert_signature(&unsigned, &signature)?;

        tracing::debug!(
            assertion.id = %id,
            assertion.issue_instant = %issue_instant,
            assertion.not_on_or_after = %not_on_or_after,
            "built signed assertion"
        );

        if let Some(path) = &self.debug_dump {
            if let Err(error) = std::fs::write(path, xml.as_bytes()) {
                tracing::warn!(
                    path = %path.display(),
                    error = (&error as &dyn std::error::Error),
                    "unable to write assertion debug dump"
                );
            }
        }

        Ok(AssertionDocument { id, xml })
    }
}

fn require(field: &'static str, value: &str) -> Result<(), TemplateRenderError> {
    if value.trim().is_empty() {
        Err(TemplateRenderError::MissingField(field))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use aliri_clock::TestClock;
    use color_eyre::Result;
    use openssl::{hash::MessageDigest, pkey::PKey, sign::Verifier};

    use super::*;
    use crate::{
        key::test_keys, ConsumerKey, ConsumerSecret, CustomerId, IssuerId, SigningKey,
    };

    const NOW: UnixTime = UnixTime(1_410_185_722);
    const AUDIENCE: &str = "mytestapp.191934.cc.dev-intuit.ipp.prod";

    fn identity_with(issuer_id: &str, customer_id: &str) -> Identity {
        Identity::new(
            IssuerId::new(issuer_id.to_owned()),
            CustomerId::new(customer_id.to_owned()),
            ConsumerKey::from_static("CONSUMERKEY"),
            ConsumerSecret::from_static("CONSUMERSECRET"),
            SigningKey::from_pem(&test_keys::generate_pem()).expect("valid test key"),
        )
    }

    fn builder() -> AssertionBuilder<TestClock> {
        AssertionBuilder::new(AUDIENCE).with_clock(TestClock::new(NOW))
    }

    fn between<'a>(haystack: &'a str, start: &str, end: &str) -> &'a str {
        let from = haystack.find(start).expect("start marker") + start.len();
        let to = from + haystack[from..].find(end).expect("end marker");
        &haystack[from..to]
    }

    #[test]
    fn embedded_digest_matches_unsigned_body() -> Result<()> {
        let doc = builder().build_signed_document(&identity_with("issuer", "blah321"))?;

        let signature_start = doc.xml().find("<ds:Signature").expect("signature");
        let signature_end = doc.xml().find("</ds:Signature>").expect("signature end")
            + "</ds:Signature>".len();
        let unsigned = format!(
            "{}{}",
            &doc.xml()[..signature_start],
            &doc.xml()[signature_end..]
        );

        let expected = STANDARD.encode(sha1(unsigned.as_bytes()));
        let embedded = between(doc.xml(), "<ds:DigestValue>", "</ds:DigestValue>");

        assert_eq!(embedded, expected);
        Ok(())
    }

    #[test]
    fn signature_verifies_over_signed_info() -> Result<()> {
        let identity = identity_with("issuer", "blah321");
        let doc = builder().build_signed_document(&identity)?;

        let digest = between(doc.xml(), "<ds:DigestValue>", "</ds:DigestValue>");
        let signature_value =
            between(doc.xml(), "<ds:SignatureValue>", "</ds:SignatureValue>");
        assert!(!signature_value.contains('\n'));

        let signed_info = template::render_signed_info(doc.id(), digest);
        let signature = STANDARD.decode(signature_value)?;

        let public = PKey::public_key_from_pem(&identity.signing_key().public_key_pem()?)?;
        let mut verifier = Verifier::new(MessageDigest::sha1(), &public)?;
        verifier.update(signed_info.as_bytes())?;
        assert!(verifier.verify(&signature)?);

        Ok(())
    }

    #[test]
    fn signature_is_placed_between_issuer_and_subject() -> Result<()> {
        let doc = builder().build_signed_document(&identity_with("issuer", "blah321"))?;

        assert!(doc
            .xml()
            .contains("<saml2:Issuer>issuer</saml2:Issuer><ds:Signature"));
        assert!(doc.xml().contains("</ds:Signature><saml2:Subject>"));
        Ok(())
    }

    #[test]
    fn conditions_window_is_relative_to_now() -> Result<()> {
        let doc = builder().build_signed_document(&identity_with("issuer", "blah321"))?;

        assert!(doc.xml().contains(r#"IssueInstant="2014-09-08T14:15:22+00:00""#));
        assert!(doc.xml().contains(r#"NotBefore="2014-09-08T14:10:22+00:00""#));
        assert!(doc.xml().contains(r#"NotOnOrAfter="2014-09-08T14:25:22+00:00""#));
        assert!(doc.xml().contains(r#"AuthnInstant="2014-09-08T14:15:22+00:00""#));
        Ok(())
    }

    #[test]
    fn custom_window_is_applied() -> Result<()> {
        let doc = builder()
            .with_window(AssertionWindow::new(DurationSecs(60), DurationSecs(120)))
            .build_signed_document(&identity_with("issuer", "blah321"))?;

        assert!(doc.xml().contains(r#"NotBefore="2014-09-08T14:14:22+00:00""#));
        assert!(doc.xml().contains(r#"NotOnOrAfter="2014-09-08T14:17:22+00:00""#));
        Ok(())
    }

    #[test]
    fn oversized_window_is_a_render_error() {
        let err = builder()
            .with_window(AssertionWindow::new(DurationSecs(60), DurationSecs(u64::MAX)))
            .build_signed_document(&identity_with("issuer", "blah321"))
            .unwrap_err();

        assert!(matches!(
            err,
            AssertionError::Template(TemplateRenderError::TimestampOutOfRange(u64::MAX))
        ));
    }

    #[test]
    fn ids_are_unique_and_xml_safe() -> Result<()> {
        let identity = identity_with("issuer", "blah321");
        let first = builder().build_signed_document(&identity)?;
        let second = builder().build_signed_document(&identity)?;

        assert_ne!(first.id(), second.id());
        assert!(first.id().starts_with('_'));
        assert!(!first.id().contains('-'));
        assert_eq!(first.id().len(), 33);
        assert!(first
            .xml()
            .contains(&format!(r#"SessionIndex="{}""#, first.id())));
        Ok(())
    }

    #[test]
    fn encoded_assertion_decodes_to_document() -> Result<()> {
        let identity = identity_with("issuer", "blah321");
        let encoded = builder().build_signed_assertion(&identity)?;

        let decoded = String::from_utf8(STANDARD.decode(encoded.as_str())?)?;
        assert!(decoded.starts_with("<saml2:Assertion "));
        assert!(decoded.ends_with("</saml2:Assertion>"));
        Ok(())
    }

    #[test]
    fn empty_customer_id_fails_rendering() {
        let err = builder()
            .build_signed_assertion(&identity_with("issuer", ""))
            .unwrap_err();

        assert!(matches!(
            err,
            AssertionError::Template(TemplateRenderError::MissingField("customer_id"))
        ));
    }

    #[test]
    fn empty_audience_fails_rendering() {
        let err = AssertionBuilder::new(" ")
            .build_signed_assertion(&identity_with("issuer", "blah321"))
            .unwrap_err();

        assert!(matches!(
            err,
            AssertionError::Template(TemplateRenderError::MissingField("audience"))
        ));
    }

    #[test]
    fn debug_dump_writes_unencoded_xml() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("signed.xml");

        let doc = builder()
            .with_debug_dump(&path)
            .build_signed_document(&identity_with("issuer", "blah321"))?;

        assert_eq!(std::fs::read_to_string(&path)?, doc.xml());
        Ok(())
    }

    #[test]
    #[tracing_test::traced_test]
    fn unwritable_debug_dump_is_not_fatal() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("missing").join("signed.xml");

        builder()
            .with_debug_dump(&path)
            .build_signed_document(&identity_with("issuer", "blah321"))?;

        assert!(logs_contain("unable to write assertion debug dump"));
        Ok(())
    }
}
