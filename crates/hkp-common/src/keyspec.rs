//! Key specifier classification.
//!
//! A key specifier is whatever the user typed to name a key: a user id
//! fragment, a mail address, a key id or a fingerprint. [`KeySpec::parse`]
//! sorts it into one discrete mode before any protocol encoding happens.
//!
//! # Syntax
//!
//! | input | mode |
//! |-------|------|
//! | `=Heinrich Heine <heinrichh@uni-duesseldorf.de>` | [`KeySpec::Exact`] |
//! | `*Heine` | [`KeySpec::Substring`] |
//! | `<heinrichh@uni-duesseldorf.de>` | [`KeySpec::Mail`] |
//! | `@uni-duesseldorf.de` | [`KeySpec::MailSubstring`] |
//! | `.uni-duesseldorf.de` | [`KeySpec::MailEnd`] |
//! | `+Heinrich Heine duesseldorf` | [`KeySpec::Words`] |
//! | `0x1234ABCD`, `1234ABCD` | [`KeySpec::ShortKeyId`] |
//! | `0x0123456789ABCDEF` | [`KeySpec::LongKeyId`] |
//! | 32 hex digits | [`KeySpec::Fingerprint16`] |
//! | 40 hex digits (optionally grouped by spaces) | [`KeySpec::Fingerprint20`] |
//! | `/CN=Heinrich Heine` | [`KeySpec::Subject`] |
//! | `&` + 40 hex digits | [`KeySpec::Keygrip`] |
//! | anything else | [`KeySpec::Substring`] |
//!
//! Key ids and fingerprints may carry a trailing `!`, which is dropped.

use std::fmt;
use std::str::FromStr;

use crate::error::{HkpError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySpec {
    Exact(String),
    Substring(String),
    Mail(String),
    MailSubstring(String),
    MailEnd(String),
    Words(String),
    ShortKeyId(u32),
    LongKeyId(u64),
    Fingerprint16([u8; 16]),
    Fingerprint20([u8; 20]),
    Subject(String),
    Keygrip([u8; 20]),
}

impl KeySpec {
    /// Classifies a user supplied key specifier.
    ///
    /// # Errors
    ///
    /// Returns [`HkpError::InvalidSpecifier`] for empty input, for a `0x`
    /// prefix followed by something that is not a key id or fingerprint, and
    /// for malformed keygrips.
    ///
    /// # Example
    ///
    /// ```
    /// use hkp_common::KeySpec;
    ///
    /// let spec = KeySpec::parse("0xDEADBEEF").unwrap();
    /// assert_eq!(spec, KeySpec::ShortKeyId(0xDEADBEEF));
    /// ```
    pub fn parse(input: &str) -> Result<Self> {
        let s = input.trim();
        let invalid = || HkpError::InvalidSpecifier(input.to_string());

        let mut chars = s.chars();
        let Some(first) = chars.next() else {
            return Err(invalid());
        };
        let rest = chars.as_str();

        match first {
            '=' => non_empty(rest).map(|r| KeySpec::Exact(r.to_string())).ok_or_else(invalid),
            '*' => non_empty(rest)
                .map(|r| KeySpec::Substring(r.to_string()))
                .ok_or_else(invalid),
            '<' => Ok(KeySpec::Mail(s.to_string())),
            '@' => non_empty(rest)
                .map(|r| KeySpec::MailSubstring(r.to_string()))
                .ok_or_else(invalid),
            '.' => non_empty(rest).map(|r| KeySpec::MailEnd(r.to_string())).ok_or_else(invalid),
            '+' => non_empty(rest).map(|r| KeySpec::Words(r.to_string())).ok_or_else(invalid),
            '/' => non_empty(rest).map(|r| KeySpec::Subject(r.to_string())).ok_or_else(invalid),
            '&' => decode_hex::<20>(rest).map(KeySpec::Keygrip).ok_or_else(invalid),
            '#' => Err(invalid()),
            _ => Self::classify_hex(s).unwrap_or_else(|| Ok(KeySpec::Substring(s.to_string()))),
        }
    }

    /// Tries the key id and fingerprint forms.
    ///
    /// Returns `None` when the text is not hex at all, so that the caller
    /// falls back to a substring search.
    fn classify_hex(s: &str) -> Option<Result<Self>> {
        let (has_prefix, body) = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(body) => (true, body),
            None => (false, s),
        };
        let body = body.strip_suffix('!').unwrap_or(body);

        let spec = if body.chars().all(|c| c.is_ascii_hexdigit()) {
            match body.len() {
                8 => u32::from_str_radix(body, 16).ok().map(KeySpec::ShortKeyId),
                16 => u64::from_str_radix(body, 16).ok().map(KeySpec::LongKeyId),
                32 => decode_hex::<16>(body).map(KeySpec::Fingerprint16),
                40 => decode_hex::<20>(body).map(KeySpec::Fingerprint20),
                _ => None,
            }
        } else if !has_prefix && body.contains(' ') {
            // "ABCD 1234 ..." as printed by most tools
            let compact: String = body.split(' ').filter(|g| !g.is_empty()).collect();
            if compact.len() == 40 && body.chars().all(|c| c == ' ' || c.is_ascii_hexdigit()) {
                decode_hex::<20>(&compact).map(KeySpec::Fingerprint20)
            } else {
                None
            }
        } else {
            None
        };

        match (spec, has_prefix) {
            (Some(spec), _) => Some(Ok(spec)),
            (None, true) => Some(Err(HkpError::InvalidSpecifier(s.to_string()))),
            (None, false) => None,
        }
    }

    /// Name of the classification mode, for diagnostics.
    pub fn mode(&self) -> &'static str {
        match self {
            KeySpec::Exact(_) => "exact",
            KeySpec::Substring(_) => "substring",
            KeySpec::Mail(_) => "mail",
            KeySpec::MailSubstring(_) => "mail-substring",
            KeySpec::MailEnd(_) => "mail-end",
            KeySpec::Words(_) => "words",
            KeySpec::ShortKeyId(_) => "short-keyid",
            KeySpec::LongKeyId(_) => "long-keyid",
            KeySpec::Fingerprint16(_) => "fingerprint16",
            KeySpec::Fingerprint20(_) => "fingerprint20",
            KeySpec::Subject(_) => "subject",
            KeySpec::Keygrip(_) => "keygrip",
        }
    }
}

impl FromStr for KeySpec {
    type Err = HkpError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for KeySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySpec::Exact(name) => write!(f, "={}", name),
            KeySpec::Substring(text) => write!(f, "*{}", text),
            KeySpec::Mail(addr) => f.write_str(addr),
            KeySpec::MailSubstring(text) => write!(f, "@{}", text),
            KeySpec::MailEnd(text) => write!(f, ".{}", text),
            KeySpec::Words(words) => write!(f, "+{}", words),
            KeySpec::ShortKeyId(kid) => write!(f, "0x{:08X}", kid),
            KeySpec::LongKeyId(kid) => write!(f, "0x{:016X}", kid),
            KeySpec::Fingerprint16(fpr) => f.write_str(&to_upper_hex(fpr)),
            KeySpec::Fingerprint20(fpr) => f.write_str(&to_upper_hex(fpr)),
            KeySpec::Subject(dn) => write!(f, "/{}", dn),
            KeySpec::Keygrip(grip) => write!(f, "&{}", to_upper_hex(grip)),
        }
    }
}

/// Renders bytes as uppercase hex without separators.
pub fn to_upper_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

fn decode_hex<const N: usize>(s: &str) -> Option<[u8; N]> {
    if s.len() != N * 2 || !s.is_ascii() {
        return None;
    }
    let mut out = [0u8; N];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some(out)
}
