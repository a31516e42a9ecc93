//! The contact/intervention ledger.
//!
//! An in-memory record store with the transactional guarantees the campaign
//! needs: uniqueness on the intervention key, atomic bulk reloads for
//! contacts, additive-only intervention imports, and monotonic per-record
//! lifecycle flags. State is persisted as an atomic JSON snapshot (see
//! [`snapshot`]).
//!
//! Interventions may exist before their contact details arrive: a record
//! with no contact is simply uncontactable until contacts are backfilled.

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::types::{
    Channel, Contact, Intervention, InterventionId, InterventionKey, PracticeId, Receipt,
    SurveyResponse, Wave,
};

pub mod fsync;
pub mod snapshot;

pub use snapshot::{CampaignSnapshot, SnapshotError, load_snapshot, save_snapshot_atomic};

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An intervention with this key already exists. The ledger is
    /// additive-only: existing allocations are never rewritten.
    #[error("duplicate intervention key: {0}")]
    DuplicateIntervention(InterventionKey),

    /// No intervention with this key exists.
    #[error("unknown intervention: {0}")]
    UnknownIntervention(InterventionKey),

    /// No intervention with this id exists.
    #[error("unknown intervention id: {0}")]
    UnknownInterventionId(InterventionId),

    /// No contact with this practice id exists.
    #[error("unknown contact: {0}")]
    UnknownContact(PracticeId),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Outcome of asking the store to mark a record sent.
///
/// `AlreadySent` is the idempotence refusal: not an error, no mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Marked,
    AlreadySent,
}

/// A not-yet-inserted intervention, as produced by the allocator. The
/// store assigns ids and initial lifecycle state on insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIntervention {
    pub key: InterventionKey,
    pub arm: crate::types::Arm,
    pub created_date: chrono::NaiveDate,
    pub measure_id: crate::types::MeasureId,
}

/// The in-memory ledger. Shared between the server and batch operations as
/// [`SharedStore`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Store {
    contacts: BTreeMap<PracticeId, Contact>,
    interventions: BTreeMap<InterventionKey, Intervention>,
    by_id: BTreeMap<InterventionId, InterventionKey>,
    next_id: u64,
}

/// Handle for sharing a [`Store`] across the axum server and batch callers.
pub type SharedStore = Arc<tokio::sync::RwLock<Store>>;

/// Wraps a store for sharing.
pub fn shared(store: Store) -> SharedStore {
    Arc::new(tokio::sync::RwLock::new(store))
}

impl Store {
    pub fn new() -> Self {
        Store::default()
    }

    // ─── Contacts ───

    /// Atomically replaces the entire contact list.
    ///
    /// Contacts may be reloaded wholesale at any time, unlike the
    /// intervention ledger. The swap is all-or-nothing.
    pub fn replace_contacts(&mut self, contacts: Vec<Contact>) {
        let mut map = BTreeMap::new();
        for contact in contacts {
            map.insert(contact.practice_id.clone(), contact);
        }
        info!(count = map.len(), "replacing contact list");
        self.contacts = map;
    }

    pub fn contact(&self, practice_id: &PracticeId) -> Option<&Contact> {
        self.contacts.get(practice_id)
    }

    pub fn contacts(&self) -> impl Iterator<Item = &Contact> {
        self.contacts.values()
    }

    pub fn contact_count(&self) -> usize {
        self.contacts.len()
    }

    /// Records the contact's questionnaire answer.
    pub fn set_survey_response(
        &mut self,
        practice_id: &PracticeId,
        response: SurveyResponse,
    ) -> Result<()> {
        let contact = self
            .contacts
            .get_mut(practice_id)
            .ok_or_else(|| StoreError::UnknownContact(practice_id.clone()))?;
        contact.survey_response = response;
        Ok(())
    }

    // ─── Interventions ───

    /// Adds a batch of interventions, assigning ids.
    ///
    /// Additive-only and all-or-nothing: if any key collides with an
    /// existing record (or with another record in the batch), nothing is
    /// inserted. Changing an allocation after the trial has started would
    /// invalidate it, so existing rows are never touched.
    pub fn insert_interventions(&mut self, batch: Vec<NewIntervention>) -> Result<Vec<InterventionId>> {
        let mut seen = std::collections::BTreeSet::new();
        for new in &batch {
            if self.interventions.contains_key(&new.key) || !seen.insert(new.key.clone()) {
                return Err(StoreError::DuplicateIntervention(new.key.clone()));
            }
        }

        let mut ids = Vec::with_capacity(batch.len());
        for new in batch {
            let id = InterventionId(self.next_id);
            self.next_id += 1;
            let intervention =
                Intervention::new(id, new.key.clone(), new.arm, new.created_date, new.measure_id);
            self.by_id.insert(id, new.key.clone());
            self.interventions.insert(new.key, intervention);
            ids.push(id);
        }
        Ok(ids)
    }

    pub fn intervention(&self, key: &InterventionKey) -> Option<&Intervention> {
        self.interventions.get(key)
    }

    pub fn intervention_by_id(&self, id: InterventionId) -> Option<&Intervention> {
        self.by_id.get(&id).and_then(|key| self.interventions.get(key))
    }

    pub fn interventions(&self) -> impl Iterator<Item = &Intervention> {
        self.interventions.values()
    }

    pub fn intervention_count(&self) -> usize {
        self.interventions.len()
    }

    /// The contact for an intervention, if contact details have arrived.
    pub fn contact_for(&self, intervention: &Intervention) -> Option<&Contact> {
        self.contacts.get(&intervention.key.practice_id)
    }

    /// Whether a channel-appropriate destination exists for this record.
    pub fn contactable(&self, intervention: &Intervention) -> bool {
        self.contact_for(intervention)
            .is_some_and(|contact| intervention.contactable(contact))
    }

    // ─── Lifecycle flags ───

    /// Marks a record generated. Monotonic: marking an already-generated
    /// record is a no-op.
    pub fn mark_generated(&mut self, key: &InterventionKey) -> Result<()> {
        let intervention = self
            .interventions
            .get_mut(key)
            .ok_or_else(|| StoreError::UnknownIntervention(key.clone()))?;
        intervention.generated = true;
        Ok(())
    }

    /// Marks a record sent, refusing a resend.
    ///
    /// This is the at-most-once guard: once `sent` is true it never goes
    /// back, and a second call mutates nothing.
    pub fn mark_sent(&mut self, key: &InterventionKey) -> Result<SendOutcome> {
        let intervention = self
            .interventions
            .get_mut(key)
            .ok_or_else(|| StoreError::UnknownIntervention(key.clone()))?;
        if intervention.sent {
            warn!(intervention = %key, "refusing to re-mark sent record");
            return Ok(SendOutcome::AlreadySent);
        }
        intervention.sent = true;
        Ok(SendOutcome::Marked)
    }

    /// Sets the delivery receipt state. May be called repeatedly; later
    /// corrective events overwrite earlier ones.
    pub fn set_receipt(&mut self, key: &InterventionKey, receipt: Receipt) -> Result<()> {
        let intervention = self
            .interventions
            .get_mut(key)
            .ok_or_else(|| StoreError::UnknownIntervention(key.clone()))?;
        intervention.receipt = receipt;
        Ok(())
    }

    /// Attaches external analytics metadata to a record.
    pub fn set_metadata(
        &mut self,
        key: &InterventionKey,
        metadata: serde_json::Value,
    ) -> Result<()> {
        let intervention = self
            .interventions
            .get_mut(key)
            .ok_or_else(|| StoreError::UnknownIntervention(key.clone()))?;
        intervention.metadata = Some(metadata);
        Ok(())
    }

    // ─── Engagement ───

    /// Increments a record's hit counter, returning its new count.
    pub fn record_hit(&mut self, key: &InterventionKey) -> Result<u64> {
        let intervention = self
            .interventions
            .get_mut(key)
            .ok_or_else(|| StoreError::UnknownIntervention(key.clone()))?;
        intervention.hits += 1;
        Ok(intervention.hits)
    }

    /// Total hits across all of a contact's interventions, every channel
    /// and wave included. The questionnaire gate keys off this sum.
    pub fn total_hits(&self, practice_id: &PracticeId) -> u64 {
        self.interventions
            .values()
            .filter(|i| &i.key.practice_id == practice_id)
            .map(|i| i.hits)
            .sum()
    }

    // ─── Receipt reconciliation ───

    /// Applies a fax delivery receipt in bulk.
    ///
    /// Updates every fax intervention whose contact's normalised fax
    /// matches `destination` (several practices can share one machine),
    /// restricted to `wave` when given. Returns the number of records
    /// updated.
    pub fn apply_fax_receipt(
        &mut self,
        destination: &str,
        wave: Option<Wave>,
        receipt: Receipt,
    ) -> usize {
        let matching: Vec<InterventionKey> = self
            .interventions
            .values()
            .filter(|i| i.key.channel == Channel::Fax)
            .filter(|i| wave.is_none_or(|w| i.key.wave == w))
            .filter(|i| {
                self.contacts
                    .get(&i.key.practice_id)
                    .is_some_and(|c| !c.normalised_fax.is_empty() && c.normalised_fax == destination)
            })
            .map(|i| i.key.clone())
            .collect();

        for key in &matching {
            if let Some(intervention) = self.interventions.get_mut(key) {
                intervention.receipt = receipt;
            }
        }
        matching.len()
    }

    // ─── Snapshot plumbing ───

    pub(crate) fn to_parts(&self) -> (Vec<Contact>, Vec<Intervention>, u64) {
        (
            self.contacts.values().cloned().collect(),
            self.interventions.values().cloned().collect(),
            self.next_id,
        )
    }

    pub(crate) fn from_parts(
        contacts: Vec<Contact>,
        interventions: Vec<Intervention>,
        next_id: u64,
    ) -> Self {
        let mut store = Store::new();
        store.replace_contacts(contacts);
        for intervention in interventions {
            store.by_id.insert(intervention.id, intervention.key.clone());
            store
                .interventions
                .insert(intervention.key.clone(), intervention);
        }
        store.next_id = next_id;
        store
    }
}
