/// Remote identity roster backed by a users API
use super::{IdentityRecord, IdentityStore, RosterEntry, RosterUser};
use crate::{
    error::{VerifyError, VerifyResult},
    phone::{PhoneKey, PhoneNormalizer},
};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

/// Remote identity store configuration
#[derive(Debug, Clone)]
pub struct RemoteIdentityStoreConfig {
    /// API root; the roster is read from `{base_url}/users`
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

/// Identity store that reads the roster from a remote users API
#[derive(Clone)]
pub struct RemoteIdentityStore {
    http_client: reqwest::Client,
    config: RemoteIdentityStoreConfig,
    normalizer: PhoneNormalizer,
}

impl RemoteIdentityStore {
    pub fn new(config: RemoteIdentityStoreConfig, normalizer: PhoneNormalizer) -> VerifyResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| VerifyError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            config,
            normalizer,
        })
    }

    async fn fetch_roster(&self) -> VerifyResult<Vec<RosterUser>> {
        let url = format!("{}/users", self.config.base_url.trim_end_matches('/'));
        debug!("Fetching identity roster from {}", url);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| VerifyError::IdentityStore(format!("Could not connect to users API: {}", e)))?;

        if !response.status().is_success() {
            return Err(VerifyError::IdentityStore(format!(
                "Users API returned error: {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| VerifyError::IdentityStore(format!("Invalid users API response: {}", e)))
    }
}

#[async_trait]
impl IdentityStore for RemoteIdentityStore {
    async fn lookup(&self, key: &PhoneKey) -> VerifyResult<IdentityRecord> {
        self.list_all()
            .await?
            .iter()
            .filter_map(RosterEntry::record)
            .find(|r| &r.phone == key)
            .cloned()
            .ok_or_else(|| VerifyError::UnknownIdentity(key.to_string()))
    }

    async fn list_all(&self) -> VerifyResult<Vec<RosterEntry>> {
        let users = self.fetch_roster().await?;
        let mut entries: Vec<RosterEntry> = Vec::with_capacity(users.len());

        for user in users {
            let phone = match self.normalizer.normalize(&user.phone_number) {
                Ok(phone) => phone,
                Err(e) => {
                    warn!("Roster entry has unusable phone number: {}", e);
                    entries.push(RosterEntry::Invalid {
                        raw_phone: user.phone_number,
                        claimed_name: user.name,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            // One entry per key; a later duplicate replaces the earlier name in place
            let existing = entries.iter_mut().find_map(|entry| match entry {
                RosterEntry::Valid(record) if record.phone == phone => Some(record),
                _ => None,
            });
            match existing {
                Some(record) => record.claimed_name = user.name,
                None => entries.push(RosterEntry::Valid(IdentityRecord {
                    phone,
                    claimed_name: user.name,
                })),
            }
        }

        Ok(entries)
    }

    fn kind(&self) -> &'static str {
        "remote"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, http::StatusCode, routing::get, Json, Router};
    use serde_json::json;

    async fn users(headers: HeaderMap) -> Result<Json<serde_json::Value>, StatusCode> {
        let authorized = headers
            .get("authorization")
            .and_then(|h| h.to_str().ok())
            == Some("Bearer test-key");
        if !authorized {
            return Err(StatusCode::UNAUTHORIZED);
        }

        Ok(Json(json!([
            { "phone_number": "+1 (555) 123-4567", "name": "John Doe" },
            { "phone_number": "garbage", "name": "Nobody" },
            { "phone_number": "5557654321", "name": "Jane Smith" }
        ])))
    }

    async fn spawn_users_api() -> String {
        let app = Router::new().route("/api/users", get(users));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/api", addr)
    }

    fn store(base_url: String, api_key: &str) -> RemoteIdentityStore {
        RemoteIdentityStore::new(
            RemoteIdentityStoreConfig {
                base_url,
                api_key: api_key.to_string(),
                timeout: Duration::from_secs(5),
            },
            PhoneNormalizer::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_list_all_normalizes_and_keeps_invalid_rows() {
        let store = store(spawn_users_api().await, "test-key");

        let entries = store.list_all().await.unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].record().unwrap().phone.as_str(), "+15551234567");

        match &entries[1] {
            RosterEntry::Invalid {
                raw_phone,
                claimed_name,
                reason,
            } => {
                assert_eq!(raw_phone, "garbage");
                assert_eq!(claimed_name, "Nobody");
                assert!(reason.contains("Invalid phone number"));
            }
            other => panic!("expected invalid row, got {:?}", other),
        }

        assert_eq!(entries[2].record().unwrap().phone.as_str(), "+15557654321");
        assert_eq!(entries[2].claimed_name(), "Jane Smith");
    }

    #[tokio::test]
    async fn test_lookup() {
        let store = store(spawn_users_api().await, "test-key");
        let normalizer = PhoneNormalizer::default();

        let record = store
            .lookup(&normalizer.normalize("555 123 4567").unwrap())
            .await
            .unwrap();
        assert_eq!(record.claimed_name, "John Doe");

        let missing = store.lookup(&normalizer.normalize("5550000000").unwrap()).await;
        assert!(matches!(missing, Err(VerifyError::UnknownIdentity(_))));
    }

    #[tokio::test]
    async fn test_rejected_key_is_store_error() {
        let store = store(spawn_users_api().await, "wrong-key");
        assert!(matches!(
            store.list_all().await,
            Err(VerifyError::IdentityStore(_))
        ));
    }
}
