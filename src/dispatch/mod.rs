//! At-most-once dispatch of generated artifacts.
//!
//! A batch walks the artifact tree for a wave, resolves each file back to
//! its ledger record, and hands the message to the channel's transport.
//! The `sent` flag is the only send-side state: a record that is already
//! sent is refused with a log line, and the flag is set only after the
//! transport accepts the message. There is no retry machinery; a failed
//! batch is re-run and picks up where it left off.

pub mod confirm;
pub mod email;
pub mod transport;

pub use confirm::{AlwaysConfirm, Confirmation, StdinConfirmation};
pub use email::{InlineImage, OutboundEmail, email_as_text, extract_inline_images};
pub use transport::{FaxJob, FaxTransport, MailTransport};

use std::io;

use thiserror::Error;
use tracing::{info, warn};

use crate::artifacts::ArtifactLayout;
use crate::config::CampaignConfig;
use crate::store::Store;
use crate::types::{Channel, PracticeId, Wave};

/// Longest reference line the fax provider accepts.
const FAX_REFERENCE_LIMIT: usize = 60;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Post letters are printed and mailed by hand, not dispatched here.
    #[error("channel {0} has no electronic transport")]
    UnsupportedChannel(Channel),

    #[error("mail transport failed: {0}")]
    Mail(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("fax transport failed: {0}")]
    Fax(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error(transparent)]
    Store(#[from] crate::store::StoreError),
}

pub type Result<T> = std::result::Result<T, DispatchError>;

/// Narrowing and safety switches for a dispatch batch.
#[derive(Debug, Clone, Default)]
pub struct DispatchOptions {
    /// Only this channel; default is both electronic channels.
    pub channel: Option<Channel>,
    /// Only this recipient.
    pub practice: Option<PracticeId>,
    /// Divert every message to this address or number.
    pub test_recipient: Option<String>,
    /// Do everything except the transport call and the flag mutation.
    pub dry_run: bool,
}

impl DispatchOptions {
    pub fn channel(mut self, channel: Channel) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn practice(mut self, practice: PracticeId) -> Self {
        self.practice = Some(practice);
        self
    }

    pub fn test_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.test_recipient = Some(recipient.into());
        self
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }
}

/// What a batch did, or that it never started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The confirmation gate declined; nothing was sent.
    Aborted,
    Completed(DispatchReport),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DispatchReport {
    /// Messages accepted by a transport.
    pub sent: usize,
    /// Messages a dry run would have sent.
    pub would_send: usize,
    /// Records refused because they were already sent.
    pub refused: usize,
    /// Artifact paths with no resolvable ledger record.
    pub unresolved: usize,
    /// Records whose contact details had gone missing since generation.
    pub uncontactable: usize,
}

/// Sends every not-yet-sent artifact for a wave.
///
/// Transport failures are fatal to the batch. Records already marked sent
/// before the failure keep their flag, so a re-run resumes safely.
pub async fn dispatch_wave<M, F, C>(
    store: &mut Store,
    config: &CampaignConfig,
    layout: &ArtifactLayout,
    wave: Wave,
    mail: &M,
    fax: &F,
    gate: &C,
    options: &DispatchOptions,
) -> Result<DispatchOutcome>
where
    M: MailTransport,
    F: FaxTransport,
    C: Confirmation,
{
    let channels: Vec<Channel> = match options.channel {
        Some(Channel::Post) => return Err(DispatchError::UnsupportedChannel(Channel::Post)),
        Some(channel) => vec![channel],
        None => vec![Channel::Email, Channel::Fax],
    };

    let mut batch: Vec<std::path::PathBuf> = Vec::new();
    for channel in &channels {
        batch.extend(layout.existing_artifacts(wave, *channel)?);
    }

    let prompt = format!(
        "About to send up to {} {} messages for {}. Proceed?",
        batch.len(),
        config.campaign,
        wave,
    );
    if !options.dry_run && !gate.confirm(&prompt)? {
        warn!(%wave, "dispatch batch declined at the confirmation gate");
        return Ok(DispatchOutcome::Aborted);
    }

    let mut report = DispatchReport::default();

    for path in batch {
        let Some(key) = layout.resolve_key(&path) else {
            warn!(path = %path.display(), "artifact path does not resolve to a record, skipping");
            report.unresolved += 1;
            continue;
        };
        if options
            .practice
            .as_ref()
            .is_some_and(|p| &key.practice_id != p)
        {
            continue;
        }
        let Some(intervention) = store.intervention(&key).cloned() else {
            warn!(intervention = %key, "artifact on disk but no record in the ledger, skipping");
            report.unresolved += 1;
            continue;
        };
        if intervention.sent {
            warn!(intervention = %key, "refusing to resend");
            report.refused += 1;
            continue;
        }
        let Some(contact) = store.contact(&key.practice_id).cloned() else {
            warn!(intervention = %key, "no contact record, skipping");
            report.uncontactable += 1;
            continue;
        };

        match key.channel {
            Channel::Email => {
                let to = match &options.test_recipient {
                    Some(recipient) => recipient.clone(),
                    None if config.production => match contact.email.clone() {
                        Some(email) if contact.has_email() => email,
                        _ => {
                            warn!(intervention = %key, "contact has no email address, skipping");
                            report.uncontactable += 1;
                            continue;
                        }
                    },
                    // Outside production every email goes to the safe inbox.
                    None => config.test_inbox.clone(),
                };
                let html = std::fs::read_to_string(&path)?;
                let subject = format!(
                    "Information about your {} prescribing from OpenPrescribing.net",
                    config.campaign
                );
                let message = OutboundEmail::from_html(&to, &config.mail_from, subject, &html)
                    .with_tag(&config.campaign);
                info!(intervention = %key, %to, "sending email");
                if options.dry_run {
                    report.would_send += 1;
                    continue;
                }
                mail.send(&message)
                    .await
                    .map_err(|e| DispatchError::Mail(Box::new(e)))?;
            }
            Channel::Fax => {
                let to = match &options.test_recipient {
                    Some(recipient) => recipient.clone(),
                    None => {
                        if contact.normalised_fax.is_empty() {
                            warn!(intervention = %key, "contact has no fax number, skipping");
                            report.uncontactable += 1;
                            continue;
                        }
                        contact.normalised_fax.clone()
                    }
                };
                let mut reference =
                    format!("about your {} prescribing - {}", config.campaign, wave);
                reference.truncate(FAX_REFERENCE_LIMIT);
                let job = FaxJob::new(&to, path.clone(), reference)
                    .with_reply_address(&config.fax_from);
                info!(intervention = %key, %to, "sending fax");
                if options.dry_run {
                    report.would_send += 1;
                    continue;
                }
                let provider_id = fax
                    .deliver(&job)
                    .await
                    .map_err(|e| DispatchError::Fax(Box::new(e)))?;
                info!(intervention = %key, provider_id, "fax accepted");
                store.set_metadata(&key, serde_json::json!({ "fax_id": provider_id }))?;
            }
            Channel::Post => unreachable!("post filtered out above"),
        }

        store.mark_sent(&key)?;
        report.sent += 1;
    }

    info!(
        sent = report.sent,
        refused = report.refused,
        unresolved = report.unresolved,
        %wave,
        "dispatch batch finished"
    );
    Ok(DispatchOutcome::Completed(report))
}
