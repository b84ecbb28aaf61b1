//! Percent escaping for query parameters and form fields.
//!
//! Keyservers in the wild expect far more characters to be escaped than RFC
//! 3986 requires. Everything that is not an ASCII letter or digit is
//! emitted as `%XX` with uppercase hex, which covers the reserved set, the
//! additional punctuation `@ ! " # $ % & ' ( ) * + , - . / : ; < = > ? [ \ ] ^ _ { | } ~`
//! and every byte outside of printable ASCII.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters escaped in search terms and uploaded key text.
pub const HKP_ESCAPE_SET: &AsciiSet = NON_ALPHANUMERIC;

/// Escapes `text` for use as a query parameter or form value.
///
/// # Example
///
/// ```
/// use hkp_common::escape;
///
/// assert_eq!(escape("alice@example.org"), "alice%40example%2Eorg");
/// ```
pub fn escape(text: &str) -> String {
    utf8_percent_encode(text, HKP_ESCAPE_SET).to_string()
}
