//! Fax delivery callbacks.
//!
//! The fax provider POSTs a form back after each delivery attempt. The
//! payload carries the destination number, the reference line we set at
//! send time, and a numeric status: `0` for delivered, a positive code
//! for a permanent failure, anything else for a transient state that a
//! later callback will supersede.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::{info, warn};

use crate::store::Store;
use crate::types::{Receipt, Wave};

/// Provider callback payload, form-encoded with these exact field names.
#[derive(Debug, Clone, Deserialize)]
pub struct FaxCallback {
    #[serde(rename = "DestinationFax")]
    pub destination: String,
    #[serde(rename = "Subject", default)]
    pub subject: String,
    #[serde(rename = "Status", default)]
    pub status: String,
}

/// What applying a callback did to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaxReceiptOutcome {
    /// Records updated with the given receipt state.
    Updated { count: usize, receipt: Receipt },
    /// A transient status; matching records left untouched.
    Provisional { count: usize },
    /// No fax intervention matches the destination.
    NotFound,
}

static SUBJECT_WAVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)wave\s*(\d+)").unwrap_or_else(|e| unreachable!("static regex: {e}"))
});

/// The wave a reference line names, when it names one. Older callbacks
/// predate wave-tagged references and match every wave.
pub fn wave_from_subject(subject: &str) -> Option<Wave> {
    let digits = SUBJECT_WAVE.captures(subject)?.get(1)?;
    digits.as_str().parse::<u8>().ok().map(Wave::new)
}

fn receipt_for_status(status: &str) -> Option<Receipt> {
    match status.trim().parse::<i64>() {
        Ok(0) => Some(Receipt::Confirmed),
        Ok(code) if code > 0 => Some(Receipt::Failed),
        Ok(_) => None,
        Err(_) => {
            warn!(status, "unparseable fax callback status");
            None
        }
    }
}

/// Applies a provider callback to every matching fax intervention.
///
/// More than one practice can share a fax machine, so a single callback
/// may settle several records at once.
pub fn apply_fax_callback(store: &mut Store, callback: &FaxCallback) -> FaxReceiptOutcome {
    info!(
        to = callback.destination,
        subject = callback.subject,
        status = callback.status,
        "received fax callback"
    );

    let wave = wave_from_subject(&callback.subject);
    match receipt_for_status(&callback.status) {
        Some(receipt) => {
            let count = store.apply_fax_receipt(&callback.destination, wave, receipt);
            if count == 0 {
                warn!(to = callback.destination, "fax callback matches no intervention");
                return FaxReceiptOutcome::NotFound;
            }
            match receipt {
                Receipt::Confirmed => info!(count, "fax interventions marked as received"),
                _ => warn!(count, status = callback.status, "fax delivery failed"),
            }
            FaxReceiptOutcome::Updated { count, receipt }
        }
        None => {
            let count = store
                .interventions()
                .filter(|i| i.key.channel == crate::types::Channel::Fax)
                .filter(|i| wave.is_none_or(|w| i.key.wave == w))
                .filter(|i| {
                    store.contact(&i.key.practice_id).is_some_and(|c| {
                        !c.normalised_fax.is_empty()
                            && c.normalised_fax == callback.destination
                    })
                })
                .count();
            if count == 0 {
                return FaxReceiptOutcome::NotFound;
            }
            info!(count, status = callback.status, "transient fax status, nothing updated");
            FaxReceiptOutcome::Provisional { count }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NewIntervention;
    use crate::types::{Arm, Channel, Contact, InterventionKey, MeasureId, PracticeId};
    use chrono::NaiveDate;

    fn key(practice: &str, wave: Wave) -> InterventionKey {
        InterventionKey::new(Channel::Fax, wave, PracticeId::new(practice))
    }

    fn store_with_shared_machine() -> Store {
        let mut store = Store::new();
        store.replace_contacts(vec![
            Contact::new(PracticeId::new("A83050"), "SALTSCAR").with_fax("01642 260897"),
            Contact::new(PracticeId::new("B11111"), "OTHER").with_fax("01642 260897"),
            Contact::new(PracticeId::new("C22222"), "ELSEWHERE").with_fax("01234 56789"),
        ]);
        let mut batch = Vec::new();
        for practice in ["A83050", "B11111", "C22222"] {
            for wave in [Wave::ONE, Wave::new(2)] {
                batch.push(NewIntervention {
                    key: key(practice, wave),
                    arm: Arm::ContentRich,
                    created_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                    measure_id: MeasureId::new("nimodipine"),
                });
            }
        }
        store.insert_interventions(batch).unwrap();
        store
    }

    fn callback(destination: &str, subject: &str, status: &str) -> FaxCallback {
        FaxCallback {
            destination: destination.to_string(),
            subject: subject.to_string(),
            status: status.to_string(),
        }
    }

    #[test]
    fn delivered_status_confirms_every_sharer_of_the_machine() {
        let mut store = store_with_shared_machine();
        let outcome =
            apply_fax_callback(&mut store, &callback("00441642260897", "about faxes", "0"));
        // Both practices, both waves
        assert_eq!(
            outcome,
            FaxReceiptOutcome::Updated {
                count: 4,
                receipt: Receipt::Confirmed
            }
        );
        assert_eq!(
            store.intervention(&key("B11111", Wave::ONE)).unwrap().receipt,
            Receipt::Confirmed
        );
        assert_eq!(
            store.intervention(&key("C22222", Wave::ONE)).unwrap().receipt,
            Receipt::Unknown
        );
    }

    #[test]
    fn wave_in_the_subject_narrows_the_match() {
        let mut store = store_with_shared_machine();
        let outcome = apply_fax_callback(
            &mut store,
            &callback("00441642260897", "about your prescribing - wave 2", "0"),
        );
        assert_eq!(
            outcome,
            FaxReceiptOutcome::Updated {
                count: 2,
                receipt: Receipt::Confirmed
            }
        );
        assert_eq!(
            store.intervention(&key("A83050", Wave::ONE)).unwrap().receipt,
            Receipt::Unknown
        );
        assert_eq!(
            store.intervention(&key("A83050", Wave::new(2))).unwrap().receipt,
            Receipt::Confirmed
        );
    }

    #[test]
    fn positive_status_marks_failure() {
        let mut store = store_with_shared_machine();
        let outcome = apply_fax_callback(&mut store, &callback("0044123456789", "", "162"));
        assert_eq!(
            outcome,
            FaxReceiptOutcome::Updated {
                count: 2,
                receipt: Receipt::Failed
            }
        );
    }

    #[test]
    fn transient_status_changes_nothing() {
        let mut store = store_with_shared_machine();
        let outcome = apply_fax_callback(&mut store, &callback("00441642260897", "", "-1"));
        assert_eq!(outcome, FaxReceiptOutcome::Provisional { count: 4 });
        assert_eq!(
            store.intervention(&key("A83050", Wave::ONE)).unwrap().receipt,
            Receipt::Unknown
        );
    }

    #[test]
    fn unknown_destination_is_not_found() {
        let mut store = store_with_shared_machine();
        let outcome = apply_fax_callback(&mut store, &callback("00449999999999", "", "0"));
        assert_eq!(outcome, FaxReceiptOutcome::NotFound);
    }

    #[test]
    fn garbage_status_is_treated_as_transient() {
        let mut store = store_with_shared_machine();
        let outcome = apply_fax_callback(&mut store, &callback("00441642260897", "", "wat"));
        assert_eq!(outcome, FaxReceiptOutcome::Provisional { count: 4 });
    }

    #[test]
    fn subject_wave_parsing() {
        assert_eq!(wave_from_subject("about it - wave 2"), Some(Wave::new(2)));
        assert_eq!(wave_from_subject("Wave3 reminder"), Some(Wave::new(3)));
        assert_eq!(wave_from_subject("about your prescribing"), None);
    }
}
