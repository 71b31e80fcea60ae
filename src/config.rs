/// Configuration management for the caller identity verification service
use crate::error::{VerifyError, VerifyResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Filter directives used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "callerid_verify=debug,tower_http=debug";

/// Upper bound on the cache TTL (ten years)
const MAX_CACHE_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub cache: CacheConfig,
    pub provider: ProviderConfig,
    pub identity: IdentityConfig,
    pub phone: PhoneConfig,
    pub verification: VerificationConfig,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub cache_db: PathBuf,
}

/// Caller name cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum age of a cached caller name, in seconds
    pub ttl_secs: u64,
    /// Interval of the expired-row purge job, in seconds (0 disables it)
    pub purge_interval_secs: u64,
}

/// Caller-ID provider (Twilio Lookup) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub account_sid: Option<String>,
    #[serde(skip_serializing)]
    pub auth_token: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl ProviderConfig {
    /// Both halves of the credential pair are present
    pub fn has_credentials(&self) -> bool {
        self.account_sid.is_some() && self.auth_token.is_some()
    }
}

/// Identity registry selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IdentityConfig {
    /// Built-in static roster
    Mock,
    /// Remote users API
    Remote {
        base_url: String,
        #[serde(skip_serializing)]
        api_key: String,
    },
}

/// Phone normalization configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoneConfig {
    pub default_country_code: String,
}

/// Bulk verification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    pub verify_all_concurrency: usize,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests_per_second: u32,
    pub burst_size: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber` filter directives
    pub level: String,
}

impl LoggingConfig {
    /// Subscriber filter for the configured directives
    pub fn env_filter(&self) -> VerifyResult<tracing_subscriber::EnvFilter> {
        tracing_subscriber::EnvFilter::try_new(&self.level).map_err(|e| {
            VerifyError::Validation(format!("Invalid RUST_LOG {:?}: {}", self.level, e))
        })
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> VerifyResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("CALLERID_HOSTNAME").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("CALLERID_PORT")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .map_err(|_| VerifyError::Validation("Invalid port number".to_string()))?;

        let data_directory: PathBuf = env::var("CALLERID_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let cache_db = env::var("CALLERID_CACHE_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("caller_cache.sqlite"));

        let ttl_secs = env::var("CALLERID_CACHE_TTL_SECS")
            .unwrap_or_else(|_| "86400".to_string())
            .parse()
            .map_err(|_| VerifyError::Validation("Invalid cache TTL".to_string()))?;
        let purge_interval_secs = env::var("CALLERID_CACHE_PURGE_INTERVAL_SECS")
            .unwrap_or_else(|_| "3600".to_string())
            .parse()
            .unwrap_or(3600);

        let account_sid = env::var("TWILIO_ACCOUNT_SID").ok().filter(|s| !s.is_empty());
        let auth_token = env::var("TWILIO_AUTH_TOKEN").ok().filter(|s| !s.is_empty());
        let provider_base_url = env::var("TWILIO_LOOKUP_BASE_URL")
            .unwrap_or_else(|_| "https://lookups.twilio.com".to_string());
        let provider_timeout = env::var("CALLERID_PROVIDER_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);

        // The remote roster is used only when an API key is configured
        let identity = match env::var("SOLIDARITY_TECH_API_KEY") {
            Ok(api_key) if !api_key.is_empty() => IdentityConfig::Remote {
                base_url: env::var("SOLIDARITY_TECH_API_URL").unwrap_or_else(|_| {
                    "http://127.0.0.1:5000/solidarity_tech_api".to_string()
                }),
                api_key,
            },
            _ => IdentityConfig::Mock,
        };

        let default_country_code = env::var("CALLERID_DEFAULT_COUNTRY_CODE")
            .unwrap_or_else(|_| "1".to_string());

        let verify_all_concurrency = env::var("CALLERID_VERIFY_ALL_CONCURRENCY")
            .unwrap_or_else(|_| "4".to_string())
            .parse()
            .unwrap_or(4);

        let rate_limit_enabled = env::var("CALLERID_RATE_LIMIT_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);
        let requests_per_second = env::var("CALLERID_RATE_LIMIT_RPS")
            .unwrap_or_else(|_| "50".to_string())
            .parse()
            .unwrap_or(50);
        let burst_size = env::var("CALLERID_RATE_LIMIT_BURST")
            .unwrap_or_else(|_| "100".to_string())
            .parse()
            .unwrap_or(100);

        let log_level = env::var("RUST_LOG")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Ok(ServerConfig {
            service: ServiceConfig { hostname, port },
            storage: StorageConfig {
                data_directory,
                cache_db,
            },
            cache: CacheConfig {
                ttl_secs,
                purge_interval_secs,
            },
            provider: ProviderConfig {
                account_sid,
                auth_token,
                base_url: provider_base_url,
                timeout_secs: provider_timeout,
            },
            identity,
            phone: PhoneConfig {
                default_country_code,
            },
            verification: VerificationConfig {
                verify_all_concurrency,
            },
            rate_limit: RateLimitConfig {
                enabled: rate_limit_enabled,
                requests_per_second,
                burst_size,
            },
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> VerifyResult<()> {
        if self.cache.ttl_secs == 0 || self.cache.ttl_secs > MAX_CACHE_TTL_SECS {
            return Err(VerifyError::Validation(format!(
                "Cache TTL must be between 1 and {} seconds",
                MAX_CACHE_TTL_SECS
            )));
        }

        self.logging.env_filter()?;

        if self.verification.verify_all_concurrency == 0 {
            return Err(VerifyError::Validation(
                "Verification concurrency must be at least 1".to_string(),
            ));
        }

        let cc = &self.phone.default_country_code;
        if cc.is_empty() || cc.len() > 3 || !cc.chars().all(|c| c.is_ascii_digit()) {
            return Err(VerifyError::Validation(format!(
                "Default country code must be 1-3 digits, got {:?}",
                cc
            )));
        }

        if self.provider.account_sid.is_some() != self.provider.auth_token.is_some() {
            return Err(VerifyError::Validation(
                "TWILIO_ACCOUNT_SID and TWILIO_AUTH_TOKEN must be set together".to_string(),
            ));
        }

        Ok(())
    }

    /// Cache TTL as a chrono duration
    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cache.ttl_secs.min(MAX_CACHE_TTL_SECS) as i64)
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> ServerConfig {
    ServerConfig {
        service: ServiceConfig {
            hostname: "127.0.0.1".to_string(),
            port: 0,
        },
        storage: StorageConfig {
            data_directory: PathBuf::from("./data"),
            cache_db: PathBuf::from("./data/caller_cache.sqlite"),
        },
        cache: CacheConfig {
            ttl_secs: 3600,
            purge_interval_secs: 0,
        },
        provider: ProviderConfig {
            account_sid: None,
            auth_token: None,
            base_url: "https://lookups.twilio.com".to_string(),
            timeout_secs: 10,
        },
        identity: IdentityConfig::Mock,
        phone: PhoneConfig {
            default_country_code: "1".to_string(),
        },
        verification: VerificationConfig {
            verify_all_concurrency: 4,
        },
        rate_limit: RateLimitConfig {
            enabled: false,
            requests_per_second: 50,
            burst_size: 100,
        },
        logging: LoggingConfig {
            level: DEFAULT_LOG_FILTER.to_string(),
        },
    }
}
