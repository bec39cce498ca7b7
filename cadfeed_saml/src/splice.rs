//! Embeds a rendered `Signature` element into a rendered assertion
//!
//! The signature must be the sibling immediately following the assertion's
//! `Issuer` and preceding its `Subject`. Both documents are streamed through
//! `quick-xml` and written back event by event, so every byte outside the
//! inserted element is reproduced exactly as rendered.

use std::io;

use quick_xml::{events::Event, Reader, Writer};

use crate::{
    error::TemplateRenderError,
    template::{ISSUER_ELEMENT, SUBJECT_ELEMENT},
};

/// Inserts `signature` before the `Subject` child of the assertion root
///
/// # Errors
///
/// Either document is not well-formed, or the root has no `Issuer` followed by
/// a `Subject`.
pub(crate) fn insert_signature(
    assertion: &str,
    signature: &str,
) -> Result<String, TemplateRenderError> {
    let mut reader = Reader::from_str(assertion);
    reader.config_mut().trim_text(false);

    let mut writer = Writer::new(Vec::with_capacity(assertion.len() + signature.len()));

    let mut depth = 0usize;
    let mut previous_sibling_is_issuer = false;
    let mut inserted = false;

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Start(start) => {
                if depth == 1
                    && !inserted
                    && previous_sibling_is_issuer
                    && start.name().as_ref() == SUBJECT_ELEMENT
                {
                    copy_fragment(signature, &mut writer)?;
                    inserted = true;
                }

                if depth == 1 {
                    previous_sibling_is_issuer = false;
                }
                depth += 1;
                writer.write_event(Event::Start(start))?;
            }
            Event::End(end) => {
                depth = depth.saturating_sub(1);
                if depth == 1 {
                    previous_sibling_is_issuer = end.name().as_ref() == ISSUER_ELEMENT;
                }
                writer.write_event(Event::End(end))?;
            }
            Event::Empty(empty) => {
                if depth == 1 {
                    previous_sibling_is_issuer = false;
                }
                writer.write_event(Event::Empty(empty))?;
            }
            event => writer.write_event(event)?,
        }
    }

    if !inserted {
        return Err(TemplateRenderError::MissingAnchor);
    }

    String::from_utf8(writer.into_inner())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e).into())
}

fn copy_fragment(fragment: &str, writer: &mut Writer<Vec<u8>>) -> Result<(), TemplateRenderError> {
    let mut reader = Reader::from_str(fragment);
    reader.config_mut().trim_text(false);

    loop {
        match reader.read_event()? {
            Event::Eof => return Ok(()),
            event => writer.write_event(event)?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ASSERTION: &str = concat!(
        r#"<saml2:Assertion xmlns:saml2="urn:oasis:names:tc:SAML:2.0:assertion" ID="_1">"#,
        "<saml2:Issuer>Smith &amp; Sons</saml2:Issuer>",
        "<saml2:Subject><saml2:NameID>42</saml2:NameID></saml2:Subject>",
        "</saml2:Assertion>",
    );

    const SIGNATURE: &str = concat!(
        r#"<ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#">"#,
        r#"<ds:SignedInfo><ds:CanonicalizationMethod Algorithm="x"/></ds:SignedInfo>"#,
        "<ds:SignatureValue>c2ln</ds:SignatureValue>",
        "</ds:Signature>",
    );

    #[test]
    fn output_matches_textual_splice() {
        let expected = ASSERTION.replacen(
            "saml2:Issuer><saml2:Subject",
            &format!("saml2:Issuer>{}<saml2:Subject", SIGNATURE),
            1,
        );

        let actual = insert_signature(ASSERTION, SIGNATURE).unwrap();

        assert_eq!(actual, expected);
    }

    #[test]
    fn nested_subject_is_not_an_anchor() {
        const NESTED: &str = concat!(
            "<saml2:Assertion>",
            "<saml2:Issuer>me</saml2:Issuer>",
            "<saml2:Other><saml2:Subject></saml2:Subject></saml2:Other>",
            "</saml2:Assertion>",
        );

        let err = insert_signature(NESTED, SIGNATURE).unwrap_err();
        assert!(matches!(err, TemplateRenderError::MissingAnchor));
    }

    #[test]
    fn subject_must_follow_issuer() {
        const REORDERED: &str = concat!(
            "<saml2:Assertion>",
            "<saml2:Subject></saml2:Subject>",
            "<saml2:Issuer>me</saml2:Issuer>",
            "</saml2:Assertion>",
        );

        let err = insert_signature(REORDERED, SIGNATURE).unwrap_err();
        assert!(matches!(err, TemplateRenderError::MissingAnchor));
    }

    #[test]
    fn malformed_assertion_is_rejected() {
        let err = insert_signature("<saml2:Assertion><saml2:Issuer>", SIGNATURE).unwrap_err();
        assert!(matches!(
            err,
            TemplateRenderError::MalformedXml(_) | TemplateRenderError::MissingAnchor
        ));
    }
}
