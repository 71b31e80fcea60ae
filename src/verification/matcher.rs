/// Name comparison
use super::VerificationStatus;

/// Exact-match name comparator
///
/// Names are compared after case folding, punctuation removal and
/// whitespace collapsing. There is no partial or fuzzy matching: "John" vs
/// "John Doe" is a mismatch.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchEngine;

impl MatchEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn compare(&self, claimed_name: &str, resolved_name: &str) -> VerificationStatus {
        let resolved = normalize_name(resolved_name);
        if resolved.is_empty() {
            return VerificationStatus::Unresolvable;
        }

        if normalize_name(claimed_name) == resolved {
            VerificationStatus::Verified
        } else {
            VerificationStatus::Mismatch
        }
    }
}

/// Lowercase, strip punctuation, collapse whitespace
pub fn normalize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}
