//! Allocation and contact import.
//!
//! Bulk-imports the randomized assignment scheme and the recipient contact
//! list from tabular text files. Contact import is destructive (wipe and
//! reload); allocation import is additive-only, creating one intervention
//! per (non-control recipient, channel) pair and never touching existing
//! rows. Both are all-or-nothing: every row is parsed and validated before
//! anything is applied, so a malformed file leaves the ledger untouched.

use std::io;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::store::{NewIntervention, Store, StoreError};
use crate::types::{Arm, Channel, Contact, InterventionKey, MeasureId, PracticeId, Wave};

/// The reserved allocation code for the control group.
const CONTROL_CODE: &str = "con";

/// Errors that abort an import batch.
#[derive(Debug, Error)]
pub enum ImportError {
    /// IO error reading the input file.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Malformed CSV (missing columns, bad quoting, ...).
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A row carried an arm code that is neither an arm nor the control
    /// marker.
    #[error("row {row}: unknown allocation code {code:?}")]
    UnknownAllocation { row: usize, code: String },

    /// A row was missing its recipient identifier.
    #[error("row {row}: empty practice id")]
    EmptyPracticeId { row: usize },

    /// The ledger rejected the batch (duplicate allocation).
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for import operations.
pub type Result<T> = std::result::Result<T, ImportError>;

/// One parsed allocation row. `arm` is `None` for control recipients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub practice_id: PracticeId,
    pub arm: Option<Arm>,
}

#[derive(Debug, Deserialize)]
struct AllocationRow {
    practice_id: String,
    allocation: String,
}

#[derive(Debug, Deserialize)]
struct ContactRow {
    practice: String,
    practice_name: String,
    #[serde(default)]
    address1: String,
    #[serde(default)]
    address2: String,
    #[serde(default)]
    address3: String,
    #[serde(default)]
    address4: String,
    #[serde(default)]
    postcode: String,
    #[serde(rename = "merged emails", default)]
    email: String,
    #[serde(rename = "merged faxes", default)]
    fax: String,
}

fn blank_to_none(s: String) -> Option<String> {
    if s.trim().is_empty() { None } else { Some(s) }
}

/// Parses an allocation file. Every row is validated; a single bad row
/// fails the whole parse.
pub fn read_allocations<R: io::Read>(reader: R) -> Result<Vec<Allocation>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut allocations = Vec::new();

    for (index, record) in csv_reader.deserialize().enumerate() {
        let row: AllocationRow = record?;
        // Header is row 1; data rows start at 2
        let row_number = index + 2;

        if row.practice_id.trim().is_empty() {
            return Err(ImportError::EmptyPracticeId { row: row_number });
        }

        let arm = if row.allocation.trim().eq_ignore_ascii_case(CONTROL_CODE) {
            None
        } else {
            Some(Arm::from_allocation_code(&row.allocation).ok_or_else(|| {
                ImportError::UnknownAllocation {
                    row: row_number,
                    code: row.allocation.clone(),
                }
            })?)
        };

        allocations.push(Allocation {
            practice_id: PracticeId::new(row.practice_id.trim()),
            arm,
        });
    }

    Ok(allocations)
}

/// Parses a contact file.
pub fn read_contacts<R: io::Read>(reader: R) -> Result<Vec<Contact>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut contacts = Vec::new();

    for (index, record) in csv_reader.deserialize().enumerate() {
        let row: ContactRow = record?;
        let row_number = index + 2;

        if row.practice.trim().is_empty() {
            return Err(ImportError::EmptyPracticeId { row: row_number });
        }

        let mut contact = Contact::new(PracticeId::new(row.practice.trim()), row.practice_name);
        contact.address1 = blank_to_none(row.address1);
        contact.address2 = blank_to_none(row.address2);
        contact.address3 = blank_to_none(row.address3);
        contact.address4 = blank_to_none(row.address4);
        contact.postcode = blank_to_none(row.postcode);
        contact.email = blank_to_none(row.email);
        contact.set_fax(row.fax);
        contacts.push(contact);
    }

    Ok(contacts)
}

/// Wipes and reloads the contact list from a file.
pub fn import_contacts(store: &mut Store, path: &Path) -> Result<usize> {
    let file = std::fs::File::open(path)?;
    let contacts = read_contacts(file)?;
    let count = contacts.len();
    store.replace_contacts(contacts);
    info!(count, path = %path.display(), "imported contacts");
    Ok(count)
}

/// Imports an allocation file for one wave, creating one intervention per
/// (non-control recipient, channel) pair.
pub fn import_allocations(
    store: &mut Store,
    path: &Path,
    wave: Wave,
    measure_id: &MeasureId,
) -> Result<usize> {
    let file = std::fs::File::open(path)?;
    let allocations = read_allocations(file)?;
    let created = apply_allocations(store, &allocations, wave, measure_id)?;
    info!(created, %wave, path = %path.display(), "imported allocations");
    Ok(created)
}

/// Applies parsed allocations to the ledger. Separated from file handling
/// so tests and callers with in-memory data can use it directly.
pub fn apply_allocations(
    store: &mut Store,
    allocations: &[Allocation],
    wave: Wave,
    measure_id: &MeasureId,
) -> Result<usize> {
    let today = chrono::Utc::now().date_naive();
    let mut batch = Vec::new();

    for allocation in allocations {
        let Some(arm) = allocation.arm else {
            // Control recipients get no intervention at all
            continue;
        };
        for channel in Channel::ALL {
            batch.push(NewIntervention {
                key: InterventionKey::new(channel, wave, allocation.practice_id.clone()),
                arm,
                created_date: today,
                measure_id: measure_id.clone(),
            });
        }
    }

    let created = batch.len();
    store.insert_interventions(batch)?;
    Ok(created)
}
