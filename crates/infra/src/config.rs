//! Process configuration loaded from the environment.
//!
//! A `.env` file in the working directory is honoured (via `dotenvy`) but
//! real environment variables always win. Integrations whose credentials are
//! missing resolve to `None` and are wired as disabled fallbacks.

use std::net::SocketAddr;

use thiserror::Error;
use uuid::Uuid;

use storefront_core::{Currency, TenantId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Where aggregates and documents are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    InMemory,
    Postgres { url: String, max_connections: u32 },
}

/// Public identity of the storefront, used in emails and prompts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrandConfig {
    pub name: String,
    pub phone: String,
    pub url: String,
    pub currency: Currency,
}

impl Default for BrandConfig {
    fn default() -> Self {
        Self {
            name: "DC Store".to_string(),
            phone: "+880 1570-260118".to_string(),
            url: "https://store.digitalcare.site".to_string(),
            currency: Currency::BDT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResendConfig {
    pub api_key: String,
    pub from: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacebookConfig {
    pub pixel_id: String,
    pub access_token: String,
    pub test_event_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StripeConfig {
    pub secret_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRouterConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub storage: StorageConfig,
    /// Tenant used when a request carries neither a token nor `X-Tenant-Id`.
    pub default_tenant: TenantId,
    pub brand: BrandConfig,
    /// Allowed CORS origins; empty means any origin.
    pub cors_origins: Vec<String>,
    pub resend: Option<ResendConfig>,
    pub facebook: Option<FacebookConfig>,
    pub stripe: Option<StripeConfig>,
    pub openrouter: Option<OpenRouterConfig>,
}

const DEFAULT_BIND: &str = "0.0.0.0:8080";
const DEV_JWT_SECRET: &str = "dev-secret";
const DEFAULT_FROM: &str = "DC Store <onboarding@resend.dev>";
const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";
const DEFAULT_OPENROUTER_URL: &str = "https://openrouter.ai/api/v1";

impl AppConfig {
    /// Load `.env` (if present) and read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, "failed to read .env file");
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_raw = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind_addr = bind_raw.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
            key: "BIND_ADDR",
            reason: e.to_string(),
        })?;

        let jwt_secret = match get("JWT_SECRET") {
            Some(s) => s,
            None => {
                tracing::warn!("JWT_SECRET not set; using insecure dev default");
                DEV_JWT_SECRET.to_string()
            }
        };

        let use_postgres = get("USE_PERSISTENT_STORES").is_some_and(|v| matches!(v.as_str(), "1" | "true" | "yes"));
        let storage = if use_postgres {
            let url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
            let max_connections = match get("DATABASE_MAX_CONNECTIONS") {
                Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                    key: "DATABASE_MAX_CONNECTIONS",
                    reason: format!("expected a positive integer, got {raw:?}"),
                })?,
                None => 10,
            };
            StorageConfig::Postgres { url, max_connections }
        } else {
            StorageConfig::InMemory
        };

        let default_tenant = match get("DEFAULT_TENANT_ID") {
            Some(raw) => raw.parse::<Uuid>().map(TenantId::from_uuid).map_err(|e| ConfigError::Invalid {
                key: "DEFAULT_TENANT_ID",
                reason: e.to_string(),
            })?,
            None => TenantId::from_uuid(Uuid::nil()),
        };

        let defaults = BrandConfig::default();
        let brand = BrandConfig {
            name: get("STORE_NAME").unwrap_or(defaults.name),
            phone: get("STORE_PHONE").unwrap_or(defaults.phone),
            url: get("STORE_URL").unwrap_or(defaults.url),
            currency: get("STORE_CURRENCY").map(Currency::new).unwrap_or(defaults.currency),
        };

        let cors_origins = get("CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let resend = get("RESEND_API_KEY").map(|api_key| ResendConfig {
            api_key,
            from: get("EMAIL_FROM").unwrap_or_else(|| DEFAULT_FROM.to_string()),
        });

        let facebook = match (get("FB_PIXEL_ID"), get("FB_ACCESS_TOKEN")) {
            (Some(pixel_id), Some(access_token)) => Some(FacebookConfig {
                pixel_id,
                access_token,
                test_event_code: get("FB_TEST_EVENT_CODE"),
            }),
            _ => None,
        };

        let stripe = get("STRIPE_SECRET_KEY").map(|secret_key| StripeConfig { secret_key });

        let openrouter = get("OPENROUTER_API_KEY").map(|api_key| OpenRouterConfig {
            api_key,
            model: get("OPENROUTER_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: get("OPENROUTER_BASE_URL").unwrap_or_else(|| DEFAULT_OPENROUTER_URL.to_string()),
        });

        Ok(Self {
            bind_addr,
            jwt_secret,
            storage,
            default_tenant,
            brand,
            cors_origins,
            resend,
            facebook,
            stripe,
            openrouter,
        })
    }
}
