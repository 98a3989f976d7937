//! Environment-sourced configuration, loaded once at startup.

use serde::{Deserialize, Serialize};
use std::env;

/// Counter keys outlive the dedup window so the last day's total stays
/// readable for a while.
pub const COUNTER_TTL_SECONDS: u64 = 172_800;

#[derive(Debug, Clone)]
pub struct Config {
    /// Provider credentials. Optional so a misdeployment surfaces as a 500
    /// on the collect path rather than a crash loop at boot.
    pub provider: Option<ProviderConfig>,
    pub capi_base_url: String,
    pub store: StoreSettings,
    pub dedup: DedupConfig,
    /// When set, `x-relay-signature` must match it on every collect request.
    pub signature_secret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub pixel_id: String,
    pub access_token: String,
}

#[derive(Debug, Clone)]
pub enum StoreSettings {
    Redis { url: String },
    Rest { url: String, token: String },
    Memory,
    Disabled,
}

impl StoreSettings {
    pub fn label(&self) -> &'static str {
        match self {
            StoreSettings::Redis { .. } => "redis",
            StoreSettings::Rest { .. } => "rest",
            StoreSettings::Memory => "memory",
            StoreSettings::Disabled => "disabled",
        }
    }
}

/// The source variants disagreed on dedup scoping; both behaviors survive as
/// an explicit policy choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DedupWindow {
    CalendarDay,
    RollingTtl,
}

#[derive(Debug, Clone)]
pub struct DedupConfig {
    pub window: DedupWindow,
    pub ttl_seconds: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let provider = match (env::var("META_PIXEL_ID"), env::var("META_ACCESS_TOKEN")) {
            (Ok(pixel_id), Ok(access_token))
                if !pixel_id.is_empty() && !access_token.is_empty() =>
            {
                Some(ProviderConfig {
                    pixel_id,
                    access_token,
                })
            }
            _ => None,
        };

        let capi_base_url = env::var("CAPI_BASE_URL")
            .unwrap_or_else(|_| "https://graph.facebook.com/v18.0".to_string());

        let store = Self::store_from_env()?;

        let window = match env::var("DEDUP_WINDOW").as_deref() {
            Ok("calendar-day") | Err(_) => DedupWindow::CalendarDay,
            Ok("rolling-ttl") => DedupWindow::RollingTtl,
            Ok(other) => anyhow::bail!("unknown DEDUP_WINDOW: {other}"),
        };

        let ttl_seconds = env::var("DEDUP_TTL_SECONDS")
            .unwrap_or_else(|_| "86400".to_string())
            .parse()?;

        let signature_secret = env::var("RELAY_SIGNATURE_SECRET")
            .ok()
            .filter(|s| !s.is_empty());

        Ok(Config {
            provider,
            capi_base_url,
            store,
            dedup: DedupConfig {
                window,
                ttl_seconds,
            },
            signature_secret,
        })
    }

    fn store_from_env() -> anyhow::Result<StoreSettings> {
        let rest_from_env = || -> anyhow::Result<StoreSettings> {
            let url = env::var("STORE_REST_URL")
                .map_err(|_| anyhow::anyhow!("STORE_REST_URL must be set for the rest backend"))?;
            let token = env::var("STORE_REST_TOKEN").map_err(|_| {
                anyhow::anyhow!("STORE_REST_TOKEN must be set for the rest backend")
            })?;
            Ok(StoreSettings::Rest { url, token })
        };

        match env::var("STORE_BACKEND").ok().as_deref() {
            Some("redis") => Ok(StoreSettings::Redis {
                url: env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            }),
            Some("rest") => rest_from_env(),
            Some("memory") => Ok(StoreSettings::Memory),
            Some("none") => Ok(StoreSettings::Disabled),
            Some(other) => anyhow::bail!("unknown STORE_BACKEND: {other}"),
            // No explicit choice: infer from whichever store credentials are
            // present, REST first.
            None => {
                if env::var("STORE_REST_URL").is_ok() {
                    rest_from_env()
                } else if let Ok(url) = env::var("REDIS_URL") {
                    Ok(StoreSettings::Redis { url })
                } else {
                    Ok(StoreSettings::Disabled)
                }
            }
        }
    }
}
