//! Core domain types for the outreach campaign.
//!
//! This module contains the fundamental types used throughout the
//! application, designed to encode invariants via the type system.

pub mod channel;
pub mod contact;
pub mod ids;
pub mod intervention;

// Re-export commonly used types at the module level
pub use channel::{Channel, ChannelCode, InvalidChannelCode};
pub use contact::{Contact, SurveyResponse, normalise_fax};
pub use ids::{InterventionId, MeasureId, PracticeId, Wave};
pub use intervention::{Arm, Intervention, InterventionKey, Receipt};
