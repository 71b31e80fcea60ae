/// Twilio Lookup v2 caller-name client
use super::{CallerIdProvider, ProviderError};
use crate::{
    error::{VerifyError, VerifyResult},
    phone::PhoneKey,
};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Twilio lookup client configuration
#[derive(Debug, Clone)]
pub struct TwilioLookupConfig {
    pub base_url: String,
    /// `(account_sid, auth_token)`; `None` makes every fetch fail as unavailable
    pub credentials: Option<(String, String)>,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for TwilioLookupConfig {
    fn default() -> Self {
        Self {
            base_url: "https://lookups.twilio.com".to_string(),
            credentials: None,
            timeout: Duration::from_secs(10),
            user_agent: concat!("callerid-verify/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    caller_name: Option<CallerNameInfo>,
}

#[derive(Debug, Deserialize)]
struct CallerNameInfo {
    #[serde(default)]
    caller_name: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
}

/// Caller-ID provider backed by the Twilio Lookup API
#[derive(Clone)]
pub struct TwilioLookupClient {
    http_client: reqwest::Client,
    config: TwilioLookupConfig,
}

impl TwilioLookupClient {
    /// Create a new lookup client
    pub fn new(config: TwilioLookupConfig) -> VerifyResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .build()
            .map_err(|e| VerifyError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        if config.credentials.is_none() {
            warn!("Twilio credentials are not set; caller name lookups will fail");
        }

        Ok(Self {
            http_client,
            config,
        })
    }

    fn lookup_url(&self, key: &PhoneKey) -> String {
        format!(
            "{}/v2/PhoneNumbers/{}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(key.as_str())
        )
    }
}

#[async_trait]
impl CallerIdProvider for TwilioLookupClient {
    async fn fetch(&self, key: &PhoneKey) -> Result<String, ProviderError> {
        let (sid, token) = self.config.credentials.as_ref().ok_or_else(|| {
            ProviderError::Unavailable("Twilio credentials not configured".to_string())
        })?;

        let url = self.lookup_url(key);
        debug!("Twilio lookup: {}", url);

        let response = self
            .http_client
            .get(&url)
            .basic_auth(sid, Some(token))
            .query(&[("Fields", "caller_name")])
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("Twilio request failed: {}", e)))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => return Err(ProviderError::NoRecord(key.to_string())),
            status => {
                return Err(ProviderError::Unavailable(format!(
                    "Twilio returned {}",
                    status
                )))
            }
        }

        let body: LookupResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("Invalid Twilio response: {}", e)))?;

        let info = body
            .caller_name
            .ok_or_else(|| ProviderError::NoRecord(key.to_string()))?;

        if let Some(code) = info.error_code {
            debug!("Twilio caller_name error_code {} for {}", code, key);
        }

        match info.caller_name {
            Some(name) if !name.trim().is_empty() => Ok(name),
            _ => Err(ProviderError::NoRecord(key.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phone::PhoneNormalizer;
    use axum::{
        extract::{Path, Query},
        http::{HeaderMap, StatusCode as AxumStatus},
        routing::get,
        Json, Router,
    };
    use serde_json::json;
    use std::collections::HashMap;

    async fn fake_twilio(
        Path(phone): Path<String>,
        Query(params): Query<HashMap<String, String>>,
        headers: HeaderMap,
    ) -> (AxumStatus, Json<serde_json::Value>) {
        if headers.get("authorization").is_none() {
            return (AxumStatus::UNAUTHORIZED, Json(json!({ "code": 20003 })));
        }
        assert_eq!(params.get("Fields").map(String::as_str), Some("caller_name"));

        match phone.as_str() {
            "+15551234567" => (
                AxumStatus::OK,
                Json(json!({
                    "phone_number": phone,
                    "caller_name": { "caller_name": "JOHN DOE", "caller_type": "CONSUMER", "error_code": null }
                })),
            ),
            "+15550000000" => (
                AxumStatus::OK,
                Json(json!({ "phone_number": phone, "caller_name": { "caller_name": null, "error_code": 60600 } })),
            ),
            "+15559999999" => (AxumStatus::SERVICE_UNAVAILABLE, Json(json!({}))),
            _ => (AxumStatus::NOT_FOUND, Json(json!({ "code": 20404 }))),
        }
    }

    async fn spawn_fake_twilio() -> String {
        let app = Router::new().route("/v2/PhoneNumbers/:phone", get(fake_twilio));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client(base_url: String, with_credentials: bool) -> TwilioLookupClient {
        TwilioLookupClient::new(TwilioLookupConfig {
            base_url,
            credentials: with_credentials.then(|| ("AC123".to_string(), "token".to_string())),
            ..Default::default()
        })
        .unwrap()
    }

    fn key(raw: &str) -> PhoneKey {
        PhoneNormalizer::default().normalize(raw).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_caller_name() {
        let client = client(spawn_fake_twilio().await, true);
        let name = client.fetch(&key("+15551234567")).await.unwrap();
        assert_eq!(name, "JOHN DOE");
    }

    #[tokio::test]
    async fn test_missing_name_is_no_record() {
        let client = client(spawn_fake_twilio().await, true);

        let err = client.fetch(&key("+15550000000")).await.unwrap_err();
        assert_eq!(err, ProviderError::NoRecord("+15550000000".to_string()));

        let err = client.fetch(&key("+15557777777")).await.unwrap_err();
        assert!(matches!(err, ProviderError::NoRecord(_)));
    }

    #[tokio::test]
    async fn test_server_error_is_unavailable() {
        let client = client(spawn_fake_twilio().await, true);
        let err = client.fetch(&key("+15559999999")).await.unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_missing_credentials_is_unavailable() {
        let client = client("http://127.0.0.1:9".to_string(), false);
        let err = client.fetch(&key("+15551234567")).await.unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable(_)));
    }

    #[test]
    fn test_lookup_url_encodes_plus() {
        let client = client("https://lookups.example/".to_string(), true);
        assert_eq!(
            client.lookup_url(&key("+15551234567")),
            "https://lookups.example/v2/PhoneNumbers/%2B15551234567"
        );
    }
}
