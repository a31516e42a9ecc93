//! Recipient contact records and fax number normalization.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::PracticeId;

/// Answer to the one-off interstitial questionnaire
/// ("Did the message we sent give you new information?").
///
/// An explicit three-variant enum rather than a nullable boolean, so
/// "never answered" cannot be confused with "answered no".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SurveyResponse {
    #[default]
    Unanswered,
    Yes,
    No,
}

/// A recipient contact record.
///
/// `normalised_fax` is derived state: it is recomputed from `fax` on every
/// construction and update, never set directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub practice_id: PracticeId,
    pub name: String,
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub address3: Option<String>,
    pub address4: Option<String>,
    pub postcode: Option<String>,
    pub email: Option<String>,
    pub fax: String,
    pub normalised_fax: String,
    pub blacklisted: bool,
    pub survey_response: SurveyResponse,
}

impl Contact {
    /// Creates a contact, deriving the normalised fax from the raw one.
    pub fn new(practice_id: PracticeId, name: impl Into<String>) -> Self {
        Contact {
            practice_id,
            name: name.into(),
            address1: None,
            address2: None,
            address3: None,
            address4: None,
            postcode: None,
            email: None,
            fax: String::new(),
            normalised_fax: String::new(),
            blacklisted: false,
            survey_response: SurveyResponse::Unanswered,
        }
    }

    /// Sets the raw fax number and recomputes the normalised form.
    pub fn set_fax(&mut self, fax: impl Into<String>) {
        self.fax = fax.into();
        self.normalised_fax = normalise_fax(&self.fax);
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_fax(mut self, fax: impl Into<String>) -> Self {
        self.set_fax(fax);
        self
    }

    pub fn with_address(mut self, address1: impl Into<String>) -> Self {
        self.address1 = Some(address1.into());
        self
    }

    /// Whether an email destination exists.
    pub fn has_email(&self) -> bool {
        self.email.as_deref().is_some_and(|e| !e.trim().is_empty())
    }

    /// Whether a usable fax destination exists.
    pub fn has_fax(&self) -> bool {
        !self.normalised_fax.is_empty()
    }

    /// Whether a postal destination exists.
    pub fn has_address(&self) -> bool {
        self.address1.as_deref().is_some_and(|a| !a.trim().is_empty())
    }
}

impl fmt::Display for Contact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.practice_id)
    }
}

/// Normalises a raw fax number into canonical `00<country><national>` form.
///
/// Rules, in order:
/// 1. Strip every non-digit character.
/// 2. If fewer than 8 digits remain, the cleaned string is returned as-is
///    (including empty - entries like `#N/A` or `FALSE` clean to nothing).
/// 3. If the number already starts with an international `00` prefix it
///    passes through unchanged.
/// 4. Otherwise a single leading trunk `0` is dropped, and the number gains
///    a `00` prefix if it already carries the 44 country code, or `0044`
///    if it does not.
pub fn normalise_fax(raw: &str) -> String {
    let mut digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.len() < 8 || digits.starts_with("00") {
        return digits;
    }

    if digits.starts_with('0') {
        digits.remove(0);
    }
    if digits.starts_with("44") {
        format!("00{}", digits)
    } else {
        format!("0044{}", digits)
    }
}
