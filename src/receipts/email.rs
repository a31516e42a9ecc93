//! Email delivery reconciliation against the provider's event log.
//!
//! Email receipts are pulled rather than pushed: before a report run, we
//! query the provider's event log for every sent record whose receipt is
//! still unknown. A `delivered` event confirms it, a `bounced` or
//! `rejected` event fails it, and an empty result leaves it unknown for
//! the next pass.

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::store::Store;
use crate::types::{Channel, Receipt};

/// One entry from the provider's event log.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MailEvent {
    pub recipient: String,
    #[serde(rename = "event")]
    pub kind: MailEventKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailEventKind {
    Accepted,
    Delivered,
    Opened,
    Clicked,
    Bounced,
    Rejected,
    #[serde(other)]
    Other,
}

/// Query seam over the provider's event log.
pub trait MailEventLog {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Events for messages carrying `tag`, addressed to `recipient`.
    fn events(
        &self,
        tag: &str,
        recipient: &str,
    ) -> impl Future<Output = Result<Vec<MailEvent>, Self::Error>> + Send;
}

#[derive(Debug, Error)]
pub enum EmailReceiptError {
    #[error("event log query failed: {0}")]
    Log(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// How a reconciliation pass settled the outstanding records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcileReport {
    pub checked: usize,
    pub confirmed: usize,
    pub failed: usize,
    pub unchanged: usize,
}

/// Settles receipts for sent email records whose outcome is still
/// unknown. Records with no events stay unknown.
pub async fn reconcile_email_receipts<L: MailEventLog>(
    store: &mut Store,
    campaign: &str,
    log: &L,
) -> Result<ReconcileReport, EmailReceiptError> {
    let outstanding: Vec<_> = store
        .interventions()
        .filter(|i| i.key.channel == Channel::Email)
        .filter(|i| i.sent && i.receipt == Receipt::Unknown)
        .filter_map(|i| {
            let email = store.contact(&i.key.practice_id)?.email.clone()?;
            Some((i.key.clone(), email))
        })
        .collect();

    let mut report = ReconcileReport::default();

    for (key, recipient) in outstanding {
        report.checked += 1;
        let events = log
            .events(campaign, &recipient)
            .await
            .map_err(|e| EmailReceiptError::Log(Box::new(e)))?;

        // Delivery wins over a bounce from an earlier attempt.
        let receipt = if events.iter().any(|e| e.kind == MailEventKind::Delivered) {
            Receipt::Confirmed
        } else if events
            .iter()
            .any(|e| matches!(e.kind, MailEventKind::Bounced | MailEventKind::Rejected))
        {
            Receipt::Failed
        } else {
            debug!(intervention = %key, "no settling event yet");
            report.unchanged += 1;
            continue;
        };

        match receipt {
            Receipt::Confirmed => report.confirmed += 1,
            _ => report.failed += 1,
        }
        // Key came from the iteration above, still present.
        if store.set_receipt(&key, receipt).is_err() {
            report.unchanged += 1;
        }
    }

    info!(
        checked = report.checked,
        confirmed = report.confirmed,
        failed = report.failed,
        "email receipt reconciliation finished"
    );
    Ok(report)
}

/// Event log client for an HTTP provider API.
///
/// Expects a JSON body shaped `{"items": [{"event": ..., "recipient": ...}]}`,
/// querying by tag and recipient.
#[derive(Debug, Clone)]
pub struct HttpMailEventLog {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct EventsPage {
    #[serde(default)]
    items: Vec<MailEvent>,
}

impl HttpMailEventLog {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        HttpMailEventLog {
            client,
            base_url: base_url.into(),
        }
    }
}

impl MailEventLog for HttpMailEventLog {
    type Error = reqwest::Error;

    async fn events(&self, tag: &str, recipient: &str) -> Result<Vec<MailEvent>, reqwest::Error> {
        let page: EventsPage = self
            .client
            .get(format!("{}/events", self.base_url))
            .query(&[("tags", tag), ("recipient", recipient)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(page.items)
    }
}
