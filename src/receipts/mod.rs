//! Delivery receipt reconciliation for the two electronic channels: fax
//! receipts arrive as provider callbacks, email receipts are pulled from
//! the provider's event log on demand.

pub mod email;
pub mod fax;

pub use email::{
    EmailReceiptError, HttpMailEventLog, MailEvent, MailEventKind, MailEventLog,
    ReconcileReport, reconcile_email_receipts,
};
pub use fax::{FaxCallback, FaxReceiptOutcome, apply_fax_callback, wave_from_subject};
