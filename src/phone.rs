/// Phone number normalization
///
/// Reduces raw, human-formatted phone numbers to a canonical E.164 key so
/// that every formatting of the same number shares one cache slot and one
/// roster entry.
use crate::error::{VerifyError, VerifyResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Shortest number accepted after normalization (digits, without `+`)
const MIN_DIGITS: usize = 8;
/// E.164 upper bound
const MAX_DIGITS: usize = 15;
/// Length of a national significant number for the default numbering plan
const NATIONAL_NUMBER_LEN: usize = 10;

/// Normalized phone number (`+` followed by digits)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneKey(String);

impl PhoneKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Rebuild a key from a value that was normalized earlier (e.g. a database row)
    pub(crate) fn from_normalized(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for PhoneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PhoneKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Phone number normalizer
#[derive(Debug, Clone)]
pub struct PhoneNormalizer {
    default_country_code: String,
}

impl Default for PhoneNormalizer {
    fn default() -> Self {
        Self::new("1")
    }
}

impl PhoneNormalizer {
    /// Create a normalizer that assumes `default_country_code` for national numbers
    pub fn new(default_country_code: impl Into<String>) -> Self {
        Self {
            default_country_code: default_country_code.into(),
        }
    }

    /// Normalize a raw phone number into a [`PhoneKey`]
    pub fn normalize(&self, raw: &str) -> VerifyResult<PhoneKey> {
        let invalid = |reason: &str| VerifyError::InvalidPhoneNumber(format!("{:?}: {}", raw, reason));

        let stripped: String = raw
            .trim()
            .chars()
            .filter(|c| !is_formatting(*c))
            .collect();

        if stripped.is_empty() {
            return Err(invalid("empty"));
        }

        let (international, body) = match stripped.strip_prefix('+') {
            Some(rest) => (true, rest),
            None => match stripped.strip_prefix("00") {
                Some(rest) => (true, rest),
                None => (false, stripped.as_str()),
            },
        };

        if body.is_empty() || !body.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("contains non-numeric characters"));
        }

        let digits = if international {
            body.to_string()
        } else {
            let national = body.strip_prefix('0').unwrap_or(body);
            let cc = &self.default_country_code;
            if national.len() > NATIONAL_NUMBER_LEN && national.starts_with(cc.as_str()) {
                national.to_string()
            } else {
                format!("{}{}", cc, national)
            }
        };

        if digits.len() < MIN_DIGITS {
            return Err(invalid("too short"));
        }
        if digits.len() > MAX_DIGITS {
            return Err(invalid("too long"));
        }

        Ok(PhoneKey(format!("+{}", digits)))
    }
}

fn is_formatting(c: char) -> bool {
    c.is_whitespace() || matches!(c, '-' | '.' | '(' | ')' | '/')
}
