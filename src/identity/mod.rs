/// Identity registry
///
/// Source of claimed identities: the name each member of the roster says
/// belongs to their phone number. Two backends exist, a static in-process
/// roster and a remote users API; one is chosen at start-up.

pub mod mock;
pub mod remote;

pub use mock::MockIdentityStore;
pub use remote::{RemoteIdentityStore, RemoteIdentityStoreConfig};

use crate::{
    config::IdentityConfig,
    error::VerifyResult,
    phone::{PhoneKey, PhoneNormalizer},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};

/// Claimed identity for one phone number
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
    pub phone: PhoneKey,
    pub claimed_name: String,
}

/// One row of the roster as listed
///
/// A row whose phone number cannot be normalized is kept with its raw text
/// and the reason, so bulk verification can still report it in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterEntry {
    Valid(IdentityRecord),
    Invalid {
        raw_phone: String,
        claimed_name: String,
        reason: String,
    },
}

impl RosterEntry {
    pub fn claimed_name(&self) -> &str {
        match self {
            RosterEntry::Valid(record) => &record.claimed_name,
            RosterEntry::Invalid { claimed_name, .. } => claimed_name,
        }
    }

    /// The normalized record, if the row had a usable phone number
    pub fn record(&self) -> Option<&IdentityRecord> {
        match self {
            RosterEntry::Valid(record) => Some(record),
            RosterEntry::Invalid { .. } => None,
        }
    }
}

/// Wire format of the users API roster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterUser {
    pub phone_number: String,
    pub name: String,
}

/// Read-only access to the identity roster
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Claimed identity for `key`, or `UnknownIdentity`
    async fn lookup(&self, key: &PhoneKey) -> VerifyResult<IdentityRecord>;

    /// Snapshot of the whole roster, in roster order, unusable rows included
    async fn list_all(&self) -> VerifyResult<Vec<RosterEntry>>;

    /// Backend name for logs and health output
    fn kind(&self) -> &'static str;
}

/// Build the identity store selected by configuration
pub fn from_config(
    config: &IdentityConfig,
    normalizer: PhoneNormalizer,
    timeout: Duration,
) -> VerifyResult<Arc<dyn IdentityStore>> {
    let store: Arc<dyn IdentityStore> = match config {
        IdentityConfig::Mock => Arc::new(MockIdentityStore::with_default_roster(&normalizer)?),
        IdentityConfig::Remote { base_url, api_key } => {
            Arc::new(RemoteIdentityStore::new(
                RemoteIdentityStoreConfig {
                    base_url: base_url.clone(),
                    api_key: api_key.clone(),
                    timeout,
                },
                normalizer,
            )?)
        }
    };

    tracing::info!("Identity store: {}", store.kind());
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_selects_backend() {
        let normalizer = PhoneNormalizer::default();

        let mock = from_config(&IdentityConfig::Mock, normalizer.clone(), Duration::from_secs(1)).unwrap();
        assert_eq!(mock.kind(), "mock");

        let remote = from_config(
            &IdentityConfig::Remote {
                base_url: "http://127.0.0.1:5000/solidarity_tech_api".to_string(),
                api_key: "key".to_string(),
            },
            normalizer,
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(remote.kind(), "remote");
    }
}
