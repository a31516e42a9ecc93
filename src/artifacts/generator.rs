//! Idempotent per-record artifact generation.
//!
//! For every intervention that is not yet generated (and whose contact is
//! not blacklisted), renders the channel-appropriate artifact to its
//! deterministic location and marks the record generated. Re-running a
//! batch is cheap: the `generated` flag short-circuits before any external
//! call, and a flag set without a file on disk is a hard integrity error.

use std::fmt;
use std::io;

use thiserror::Error;
use tracing::{debug, info};

use crate::config::CampaignConfig;
use crate::store::{Store, StoreError};
use crate::types::{Channel, InterventionKey, PracticeId, Wave};

use super::inline::{InlineCssError, inline_email_css};
use super::layout::ArtifactLayout;
use super::render::{DocumentRenderer, MessageSource};

/// Errors that stop a generation batch.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// A record claims to be generated but its artifact is missing from
    /// disk. Detects external corruption or cleanup.
    #[error("{key} supposedly generated but no file at {path}")]
    MissingArtifact {
        key: InterventionKey,
        path: std::path::PathBuf,
    },

    /// Filesystem error creating directories or persisting artifacts.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The templating endpoint fetch failed (non-success status included).
    #[error("message fetch failed: {0}")]
    Fetch(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The document renderer failed.
    #[error("document render failed: {0}")]
    Render(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The inlining transform failed.
    #[error(transparent)]
    Inline(#[from] InlineCssError),

    /// Ledger error.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for generation operations.
pub type Result<T> = std::result::Result<T, GenerateError>;

/// Optional narrowing of a generation batch.
#[derive(Debug, Clone, Default)]
pub struct GeneratorOptions {
    /// Only this channel.
    pub channel: Option<Channel>,
    /// Only this recipient.
    pub practice: Option<PracticeId>,
    /// Stop after newly generating this many records.
    pub sample: Option<usize>,
}

impl GeneratorOptions {
    pub fn channel(mut self, channel: Channel) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn practice(mut self, practice: PracticeId) -> Self {
        self.practice = Some(practice);
        self
    }

    pub fn sample(mut self, sample: usize) -> Self {
        self.sample = Some(sample);
        self
    }
}

/// Aggregate outcome of a generation batch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GenerationReport {
    /// Records in the working set.
    pub total: usize,
    /// Records with `generated` set after the batch.
    pub generated: usize,
    /// Records generated by this batch.
    pub newly_generated: usize,
    /// Records skipped for missing channel-appropriate contact details.
    pub uncontactable: usize,
}

impl fmt::Display for GenerationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let percent = if self.total == 0 {
            100.0
        } else {
            self.generated as f64 / self.total as f64 * 100.0
        };
        write!(
            f,
            "{:.0}% of {} generated ({} new, {} uncontactable)",
            percent, self.total, self.newly_generated, self.uncontactable
        )
    }
}

/// Generates artifacts for one wave.
///
/// Processes the working set sequentially; external calls block the batch
/// for their duration. A fetch or render failure is fatal to the batch -
/// partial progress stays on disk and the run is safely repeatable.
pub async fn generate_wave<M, R>(
    store: &mut Store,
    config: &CampaignConfig,
    layout: &ArtifactLayout,
    wave: Wave,
    source: &M,
    renderer: &R,
    options: &GeneratorOptions,
) -> Result<GenerationReport>
where
    M: MessageSource,
    R: DocumentRenderer,
{
    let working_set: Vec<InterventionKey> = store
        .interventions()
        .filter(|i| i.key.wave == wave)
        .filter(|i| options.channel.is_none_or(|c| i.key.channel == c))
        .filter(|i| {
            options
                .practice
                .as_ref()
                .is_none_or(|p| &i.key.practice_id == p)
        })
        .filter(|i| !store.contact_for(i).is_some_and(|c| c.blacklisted))
        .map(|i| i.key.clone())
        .collect();

    let mut report = GenerationReport {
        total: working_set.len(),
        ..GenerationReport::default()
    };

    for key in &working_set {
        if options.sample.is_some_and(|n| report.newly_generated >= n) {
            break;
        }

        let Some(intervention) = store.intervention(key).cloned() else {
            continue;
        };
        let target = layout.message_path(key);

        if intervention.generated {
            if !target.exists() {
                return Err(GenerateError::MissingArtifact {
                    key: key.clone(),
                    path: target,
                });
            }
            debug!(intervention = %key, "skipping, already generated");
            continue;
        }

        let contact = store.contact_for(&intervention).cloned();
        let contactable = contact
            .as_ref()
            .is_some_and(|c| intervention.contactable(c));
        if !contactable {
            info!(intervention = %key, "no valid contact info, skipping");
            report.uncontactable += 1;
            continue;
        }

        layout.ensure_message_dir(key)?;
        let url = config.message_url(intervention.id);

        match key.channel {
            Channel::Email => {
                info!(intervention = %key, %url, target = %target.display(), "creating email");
                let html = source
                    .fetch(&url)
                    .await
                    .map_err(|e| GenerateError::Fetch(Box::new(e)))?;
                let inlined = inline_email_css(&html)?;
                std::fs::write(&target, inlined)?;
            }
            Channel::Fax | Channel::Post => {
                info!(intervention = %key, %url, target = %target.display(), "creating document");
                renderer
                    .render(&url, &target)
                    .await
                    .map_err(|e| GenerateError::Render(Box::new(e)))?;
            }
        }

        store.mark_generated(key)?;
        report.newly_generated += 1;
    }

    report.generated = working_set
        .iter()
        .filter_map(|key| store.intervention(key))
        .filter(|i| i.generated)
        .count();

    info!(%report, %wave, "generation batch finished");
    Ok(report)
}

/// Combines all of a wave's post letters into one printable file, to make
/// them easier to print. Returns `None` when there are no letters yet.
pub async fn collate_letters<R: DocumentRenderer>(
    layout: &ArtifactLayout,
    wave: Wave,
    renderer: &R,
) -> Result<Option<std::path::PathBuf>> {
    let inputs = layout.existing_artifacts(wave, Channel::Post)?;
    if inputs.is_empty() {
        return Ok(None);
    }

    let output = layout.combined_letters_path(wave);
    renderer
        .collate(&inputs, &output)
        .await
        .map_err(|e| GenerateError::Render(Box::new(e)))?;
    info!(count = inputs.len(), output = %output.display(), "collated letters");
    Ok(Some(output))
}
