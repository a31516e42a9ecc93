//! Transport seams for the two electronic channels.
//!
//! Real providers live behind these traits; the binary wires up whichever
//! implementations the deployment uses, and tests substitute recording
//! doubles.

use std::path::PathBuf;

/// Sends an assembled email message.
pub trait MailTransport {
    type Error: std::error::Error + Send + Sync + 'static;

    fn send(
        &self,
        message: &super::OutboundEmail,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// A fax delivery request: a rendered document plus provider parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaxJob {
    /// Internationally normalised destination number.
    pub to: String,
    pub file: PathBuf,
    /// Provider reference line; limited to 60 characters.
    pub reference: String,
    pub reply_address: String,
    pub page_size: String,
    pub page_orientation: String,
    pub resolution: String,
    pub rendering: String,
    /// Addressee printed on the cover.
    pub contact: String,
}

impl FaxJob {
    /// Fixed render parameters for practice-facing documents.
    pub fn new(to: impl Into<String>, file: PathBuf, reference: impl Into<String>) -> Self {
        FaxJob {
            to: to.into(),
            file,
            reference: reference.into(),
            reply_address: String::new(),
            page_size: "A4".to_string(),
            page_orientation: "portrait".to_string(),
            resolution: "fine".to_string(),
            rendering: "greyscale".to_string(),
            contact: "Prescribing Lead".to_string(),
        }
    }

    pub fn with_reply_address(mut self, reply_address: impl Into<String>) -> Self {
        self.reply_address = reply_address.into();
        self
    }
}

/// Delivers a fax, returning the provider's job id for the log.
pub trait FaxTransport {
    type Error: std::error::Error + Send + Sync + 'static;

    fn deliver(&self, job: &FaxJob) -> impl Future<Output = Result<String, Self::Error>> + Send;
}
