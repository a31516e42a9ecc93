//! CSV reports for the trial analysts.
//!
//! Two files: one row per intervention with its lifecycle flags, and one
//! row per contact with their questionnaire answer. Booleans are written
//! as `1`/`0`; a still-unknown delivery receipt is left blank so the
//! analysis can distinguish "failed" from "never heard back".

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::config::CampaignConfig;
use crate::receipts::{EmailReceiptError, MailEventLog, reconcile_email_receipts};
use crate::store::Store;
use crate::types::{Receipt, SurveyResponse};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Receipts(#[from] EmailReceiptError),
}

pub type Result<T> = std::result::Result<T, ReportError>;

/// Where the report files landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFiles {
    pub interventions: PathBuf,
    pub questionnaires: PathBuf,
}

fn numeric_truth(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

fn receipt_column(receipt: Receipt) -> &'static str {
    match receipt {
        Receipt::Confirmed => "1",
        Receipt::Failed => "0",
        Receipt::Unknown => "",
    }
}

fn survey_column(response: SurveyResponse) -> &'static str {
    match response {
        SurveyResponse::Yes => "1",
        SurveyResponse::No => "0",
        SurveyResponse::Unanswered => "",
    }
}

/// Writes one row per intervention: lifecycle flags and engagement.
pub fn write_intervention_report(store: &Store, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "practice_id",
        "method",
        "contactable",
        "sent",
        "delivery_success",
        "hits",
    ])?;
    for intervention in store.interventions() {
        writer.write_record([
            intervention.key.practice_id.to_string(),
            intervention.key.code().to_string(),
            numeric_truth(store.contactable(intervention)).to_string(),
            numeric_truth(intervention.sent).to_string(),
            receipt_column(intervention.receipt).to_string(),
            intervention.hits.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes one row per contact: their questionnaire answer, blank when
/// they never answered.
pub fn write_questionnaire_report(store: &Store, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["practice_id", "answer"])?;
    for contact in store.contacts() {
        writer.write_record([
            contact.practice_id.to_string(),
            survey_column(contact.survey_response).to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Produces both report files in `out_dir`.
///
/// Email receipts are reconciled against the provider's event log first,
/// so sent-but-unsettled records pick up their final delivery state
/// before the rows are written.
pub async fn generate_reports<L: MailEventLog>(
    store: &mut Store,
    config: &CampaignConfig,
    log: &L,
    out_dir: &Path,
) -> Result<ReportFiles> {
    let reconciled = reconcile_email_receipts(store, &config.campaign, log).await?;
    info!(
        confirmed = reconciled.confirmed,
        failed = reconciled.failed,
        "receipts settled before reporting"
    );

    std::fs::create_dir_all(out_dir)?;
    let files = ReportFiles {
        interventions: out_dir.join("intervention_report.csv"),
        questionnaires: out_dir.join("questionnaire_report.csv"),
    };
    write_intervention_report(store, &files.interventions)?;
    write_questionnaire_report(store, &files.questionnaires)?;
    info!(
        interventions = %files.interventions.display(),
        questionnaires = %files.questionnaires.display(),
        "reports written"
    );
    Ok(files)
}
