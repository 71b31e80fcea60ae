/// Static in-process identity roster
use super::{IdentityRecord, IdentityStore, RosterEntry, RosterUser};
use crate::{
    error::{VerifyError, VerifyResult},
    phone::{PhoneKey, PhoneNormalizer},
};
use async_trait::async_trait;

/// Roster served when no remote registry is configured
pub const DEFAULT_ROSTER: &[(&str, &str)] = &[
    ("+15551234567", "John Doe"),
    ("+15557654321", "Jane Smith"),
];

/// Identity store over a fixed list of records
#[derive(Debug, Clone)]
pub struct MockIdentityStore {
    records: Vec<IdentityRecord>,
}

impl MockIdentityStore {
    /// Build a store from raw `(phone, name)` pairs, normalizing each phone
    pub fn from_pairs<P, N>(pairs: &[(P, N)], normalizer: &PhoneNormalizer) -> VerifyResult<Self>
    where
        P: AsRef<str>,
        N: AsRef<str>,
    {
        let mut records: Vec<IdentityRecord> = Vec::with_capacity(pairs.len());

        for (phone, name) in pairs {
            let phone = normalizer.normalize(phone.as_ref())?;
            // One record per key; a later duplicate replaces the earlier name in place
            match records.iter_mut().find(|r| r.phone == phone) {
                Some(existing) => existing.claimed_name = name.as_ref().to_string(),
                None => records.push(IdentityRecord {
                    phone,
                    claimed_name: name.as_ref().to_string(),
                }),
            }
        }

        Ok(Self { records })
    }

    pub fn with_default_roster(normalizer: &PhoneNormalizer) -> VerifyResult<Self> {
        Self::from_pairs(DEFAULT_ROSTER, normalizer)
    }

    /// Roster in the users API wire format
    pub fn roster(&self) -> Vec<RosterUser> {
        self.records
            .iter()
            .map(|r| RosterUser {
                phone_number: r.phone.to_string(),
                name: r.claimed_name.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl IdentityStore for MockIdentityStore {
    async fn lookup(&self, key: &PhoneKey) -> VerifyResult<IdentityRecord> {
        self.records
            .iter()
            .find(|r| &r.phone == key)
            .cloned()
            .ok_or_else(|| VerifyError::UnknownIdentity(key.to_string()))
    }

    async fn list_all(&self) -> VerifyResult<Vec<RosterEntry>> {
        Ok(self.records.iter().cloned().map(RosterEntry::Valid).collect())
    }

    fn kind(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_roster() {
        let normalizer = PhoneNormalizer::default();
        let store = MockIdentityStore::with_default_roster(&normalizer).unwrap();

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].claimed_name(), "John Doe");
        assert_eq!(all[1].claimed_name(), "Jane Smith");

        let key = normalizer.normalize("(555) 765-4321").unwrap();
        let record = store.lookup(&key).await.unwrap();
        assert_eq!(record.claimed_name, "Jane Smith");
    }

    #[tokio::test]
    async fn test_unknown_identity() {
        let normalizer = PhoneNormalizer::default();
        let store = MockIdentityStore::with_default_roster(&normalizer).unwrap();

        let key = normalizer.normalize("+15550001111").unwrap();
        assert!(matches!(
            store.lookup(&key).await,
            Err(VerifyError::UnknownIdentity(_))
        ));
    }

    #[test]
    fn test_duplicate_numbers_collapse() {
        let normalizer = PhoneNormalizer::default();
        let store = MockIdentityStore::from_pairs(
            &[("555-123-4567", "First"), ("+1 555 123 4567", "Second"), ("5557654321", "Jane")],
            &normalizer,
        )
        .unwrap();

        let roster = store.roster();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster[0].phone_number, "+15551234567");
        assert_eq!(roster[0].name, "Second");
    }

    #[test]
    fn test_invalid_roster_phone_is_rejected() {
        let normalizer = PhoneNormalizer::default();
        let result = MockIdentityStore::from_pairs(&[("not a phone", "Nobody")], &normalizer);
        assert!(matches!(result, Err(VerifyError::InvalidPhoneNumber(_))));
    }
}
