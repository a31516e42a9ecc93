//! Intervention records: one per (channel, wave, recipient), tracking the
//! generate/send/receipt lifecycle.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::channel::{Channel, ChannelCode};
use super::contact::Contact;
use super::ids::{InterventionId, MeasureId, PracticeId, Wave};

/// The experimental condition a recipient was allocated to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arm {
    /// "A": message with content changes.
    ContentRich,
    /// "B": message without content changes.
    ContentNeutral,
}

impl Arm {
    /// Parses an allocation-file arm code. `con` denotes the control group,
    /// which gets no intervention at all, hence `None`.
    pub fn from_allocation_code(code: &str) -> Option<Arm> {
        match code.trim() {
            "A" | "a" => Some(Arm::ContentRich),
            "B" | "b" => Some(Arm::ContentNeutral),
            _ => None,
        }
    }
}

impl fmt::Display for Arm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arm::ContentRich => write!(f, "A"),
            Arm::ContentNeutral => write!(f, "B"),
        }
    }
}

/// Delivery confirmation state, sourced from an external event log or
/// callback. Explicitly three-valued: not-yet-known is a real state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Receipt {
    #[default]
    Unknown,
    Confirmed,
    Failed,
}

/// Composite ledger key for an intervention.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InterventionKey {
    pub channel: Channel,
    pub wave: Wave,
    pub practice_id: PracticeId,
}

impl InterventionKey {
    pub fn new(channel: Channel, wave: Wave, practice_id: PracticeId) -> Self {
        InterventionKey {
            channel,
            wave,
            practice_id,
        }
    }

    pub fn code(&self) -> ChannelCode {
        ChannelCode::new(self.channel, self.wave)
    }
}

impl fmt::Display for InterventionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.code(), self.practice_id)
    }
}

/// A single per-recipient, per-channel intervention record.
///
/// Lifecycle: created once by the allocator; `generated` set exactly once by
/// the artifact generator; `sent` set exactly once by the dispatcher;
/// `receipt` updated zero or more times by the reconciler. `generated` and
/// `sent` never revert to false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intervention {
    pub id: InterventionId,
    pub key: InterventionKey,
    pub arm: Arm,
    pub created_date: NaiveDate,
    pub measure_id: MeasureId,
    /// Computed statistics merged from an external analytics source.
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    pub hits: u64,
    pub generated: bool,
    pub sent: bool,
    pub receipt: Receipt,
}

impl Intervention {
    pub fn new(
        id: InterventionId,
        key: InterventionKey,
        arm: Arm,
        created_date: NaiveDate,
        measure_id: MeasureId,
    ) -> Self {
        Intervention {
            id,
            key,
            arm,
            created_date,
            measure_id,
            metadata: None,
            hits: 0,
            generated: false,
            sent: false,
            receipt: Receipt::Unknown,
        }
    }

    /// Whether a channel-appropriate destination exists on the contact.
    pub fn contactable(&self, contact: &Contact) -> bool {
        match self.key.channel {
            Channel::Email => contact.has_email(),
            Channel::Fax => contact.has_fax(),
            Channel::Post => contact.has_address(),
        }
    }

    /// The public redirect path for this intervention.
    pub fn public_path(&self) -> String {
        format!("/{}/{}", self.key.code(), self.key.practice_id)
    }

    /// The external target URL for redirect hits, parameterized for
    /// analytics attribution.
    pub fn target_url(&self, analytics_host: &str, campaign: &str) -> String {
        format!(
            "{}/practice/{}/?utm_source={}&utm_campaign={}&utm_medium={}#{}",
            analytics_host,
            self.key.practice_id,
            campaign,
            self.key.wave.dir_name(),
            self.key.channel.name(),
            self.measure_id,
        )
    }
}

impl fmt::Display for Intervention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "intervention {} ({})", self.key, self.key.channel)
    }
}
