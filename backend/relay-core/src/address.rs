//! Phone number to chat address normalization.
//!
//! The one place raw caller input becomes a [`RecipientAddress`]. Every send
//! path goes through [`AddressNormalizer::normalize`].

use models::RecipientAddress;

use std::sync::OnceLock;

use regex::Regex;

const NON_DIGIT_PATTERN: &str = r"\D";

static NON_DIGIT_REGEX: OnceLock<Regex> = OnceLock::new();

fn non_digit_regex() -> &'static Regex {
    NON_DIGIT_REGEX.get_or_init(|| Regex::new(NON_DIGIT_PATTERN).expect("valid regex pattern"))
}

/// Turns loosely formatted phone numbers into backend chat addresses.
///
/// Pure and infallible: malformed input yields a malformed address and the
/// backend decides whether it exists. Idempotent as long as `domain` carries
/// no digits, which config validation enforces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressNormalizer {
    country_code: String,
    domain: String,
}

impl AddressNormalizer {
    pub fn new(country_code: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            country_code: country_code.into(),
            domain: domain.into(),
        }
    }

    /// Strip non-digits, prefix the country code unless already present, append the domain.
    pub fn normalize(&self, raw: &str) -> RecipientAddress {
        let digits = non_digit_regex().replace_all(raw, "");

        if digits.starts_with(self.country_code.as_str()) {
            RecipientAddress::new(&digits, &self.domain)
        } else {
            RecipientAddress::new(&format!("{}{digits}", self.country_code), &self.domain)
        }
    }
}

impl Default for AddressNormalizer {
    fn default() -> Self {
        Self::new(crate::DEFAULT_COUNTRY_CODE, crate::DEFAULT_ADDRESS_DOMAIN)
    }
}
