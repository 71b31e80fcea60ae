/// Caller-ID provider abstraction
///
/// The provider is the authoritative source of the name registered to a
/// phone number. It is rate limited and billed per lookup, which is why every
/// call goes through the lookup cache.
pub mod twilio;

pub use twilio::{TwilioLookupClient, TwilioLookupConfig};

use crate::phone::PhoneKey;
use async_trait::async_trait;
use thiserror::Error;

/// Provider failures
///
/// `Clone` so a single coalesced fetch can hand the same failure to every
/// waiter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Transient upstream failure (network, timeout, 5xx, missing credentials)
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// The number has no associated caller name
    #[error("no caller name on record for {0}")]
    NoRecord(String),
}

/// Source of caller names
#[async_trait]
pub trait CallerIdProvider: Send + Sync {
    /// Fetch the caller name registered to `key`
    async fn fetch(&self, key: &PhoneKey) -> Result<String, ProviderError>;
}
