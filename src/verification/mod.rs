/// Caller identity verification
///
/// Compares the name the caller-ID provider reports for a number with the
/// name claimed in the identity roster.
pub mod matcher;
pub mod orchestrator;

pub use matcher::MatchEngine;
pub use orchestrator::VerificationOrchestrator;

use crate::phone::PhoneKey;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Outcome of a name comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum VerificationStatus {
    Verified,
    Mismatch,
    /// The provider had no usable name for the number
    Unresolvable,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Verified => "verified",
            VerificationStatus::Mismatch => "mismatch",
            VerificationStatus::Unresolvable => "unresolvable",
        }
    }
}

/// Result of verifying one phone number
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    /// Normalized number, or the roster's raw text when it could not be normalized
    pub phone: String,
    pub claimed_name: String,
    /// Empty when the provider had no name
    pub resolved_name: String,
    pub status: VerificationStatus,
    /// Why a record ended up unresolvable, when a lookup failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Most recent successful caller name resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastLookup {
    pub phone: PhoneKey,
    pub resolved_name: String,
    pub looked_up_at: DateTime<Utc>,
}
