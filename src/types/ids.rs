//! Newtype wrappers for domain identifiers.
//!
//! These types prevent accidental mixing of different identifiers (e.g. using
//! a measure id where a practice id is expected) and make the code more
//! self-documenting.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A practice (recipient) identifier - the stable key for a contact.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PracticeId(pub String);

impl PracticeId {
    pub fn new(s: impl Into<String>) -> Self {
        PracticeId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PracticeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PracticeId {
    fn from(s: &str) -> Self {
        PracticeId(s.to_string())
    }
}

/// A measure/topic identifier used for analytics attribution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeasureId(pub String);

impl MeasureId {
    pub fn new(s: impl Into<String>) -> Self {
        MeasureId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MeasureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A campaign wave. Single-wave deployments only ever use wave 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Wave(pub u8);

impl Wave {
    pub const ONE: Wave = Wave(1);

    pub fn new(n: u8) -> Self {
        Wave(n)
    }

    /// Directory name for this wave under the data root, e.g. `wave2`.
    pub fn dir_name(&self) -> String {
        format!("wave{}", self.0)
    }
}

impl Default for Wave {
    fn default() -> Self {
        Wave::ONE
    }
}

impl fmt::Display for Wave {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wave {}", self.0)
    }
}

impl FromStr for Wave {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Wave(s.parse()?))
    }
}

/// A store-assigned intervention id, used by the message preview endpoint.
///
/// Keys within the ledger are composite (channel, wave, practice); this is
/// the single-value handle for URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterventionId(pub u64);

impl fmt::Display for InterventionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for InterventionId {
    fn from(n: u64) -> Self {
        InterventionId(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod practice_id {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn serde_roundtrip(s in "[A-Z][A-Z0-9]{1,5}") {
                let id = PracticeId::new(&s);
                let json = serde_json::to_string(&id).unwrap();
                let parsed: PracticeId = serde_json::from_str(&json).unwrap();
                prop_assert_eq!(id, parsed);
            }

            #[test]
            fn display_is_transparent(s in "[A-Z][A-Z0-9]{1,5}") {
                let id = PracticeId::new(&s);
                prop_assert_eq!(format!("{}", id), s);
            }
        }
    }

    mod wave {
        use super::*;

        #[test]
        fn dir_name_embeds_number() {
            assert_eq!(Wave(1).dir_name(), "wave1");
            assert_eq!(Wave(3).dir_name(), "wave3");
        }

        #[test]
        fn parses_from_digit() {
            assert_eq!("2".parse::<Wave>().unwrap(), Wave(2));
            assert!("x".parse::<Wave>().is_err());
        }

        #[test]
        fn default_is_wave_one() {
            assert_eq!(Wave::default(), Wave::ONE);
        }
    }

    mod intervention_id {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn serde_roundtrip(n: u64) {
                let id = InterventionId(n);
                let json = serde_json::to_string(&id).unwrap();
                let parsed: InterventionId = serde_json::from_str(&json).unwrap();
                prop_assert_eq!(id, parsed);
            }
        }
    }
}
