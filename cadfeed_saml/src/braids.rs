use aliri_braid::braid;
use std::fmt;

/// The issuer ID assigned to the calling application by the provider
#[braid]
pub struct IssuerId;

/// The customer the assertion speaks for
#[braid]
pub struct CustomerId;

impl CustomerId {
    /// Constructs a customer ID from any displayable value, such as a
    /// numeric customer number
    pub fn from_display(id: impl ToString) -> Self {
        Self::new(id.to_string())
    }
}

/// The OAuth consumer key of the calling application
#[braid]
pub struct ConsumerKey;

/// The OAuth consumer secret of the calling application
#[braid(debug = "owned", display = "owned")]
pub struct ConsumerSecret;

/// Implements redacted `Debug` and `Display` for a secret borrowed braid
///
/// Both print the hidden label unless the alternate flag is set. Alternate
/// `Debug` reveals a prefix of the given default length (or the formatter
/// width); alternate `Display` reveals the whole value.
#[doc(hidden)]
#[macro_export]
macro_rules! limited_reveal {
    ($ty:ty: $hidden:literal, $default:literal) => {
        impl ::std::fmt::Debug for $ty {
            fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                if f.alternate() {
                    f.write_str("\"")?;
                    $crate::limited_reveal(self.as_str(), &mut *f, $default)?;
                    f.write_str("\"")
                } else {
                    f.write_str(concat!("***", $hidden, "***"))
                }
            }
        }

        impl ::std::fmt::Display for $ty {
            fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                if f.alternate() {
                    $crate::limited_reveal(self.as_str(), &mut *f, usize::MAX)
                } else {
                    f.write_str(concat!("***", $hidden, "***"))
                }
            }
        }
    };
}

#[doc(hidden)]
pub fn limited_reveal(
    unprotected: &str,
    f: &mut fmt::Formatter,
    default_len: usize,
) -> fmt::Result {
    let max_len = f.width().unwrap_or(default_len);
    if max_len <= 1 {
        f.write_str("…")
    } else if max_len > unprotected.len() {
        f.write_str(unprotected)
    } else {
        match unprotected.char_indices().nth(max_len - 2) {
            Some((idx, c)) if idx + c.len_utf8() < unprotected.len() => {
                f.write_str(&unprotected[0..idx + c.len_utf8()])?;
                f.write_str("…")
            }
            _ => f.write_str(unprotected),
        }
    }
}

limited_reveal!(ConsumerSecretRef: "CONSUMER SECRET", 5);

/// A base64-encoded, signed SAML 2.0 assertion ready to be exchanged
#[braid]
pub struct SignedAssertion;
