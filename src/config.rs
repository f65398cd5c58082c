//! Runtime settings: CLI flags with environment fallbacks.
//!
//! Misconfiguration is the one failure that is reported loudly, at startup.

use crate::position::providers::{GoogleClient, GoogleEndpoints, LiveGateway, MaxMindGeoIp};
use crate::position::{PositionCache, PositionResolver, QuotaCounter, ResolutionCache, StaticPolicy};
use chrono_tz::Tz;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("GOOGLE_API_KEY is required")]
    MissingApiKey,
    #[error("unknown reset timezone '{0}' (use IANA format, e.g. Europe/Rome)")]
    UnknownTimezone(String),
    #[error("HTTP timeout must be at least one second")]
    ZeroTimeout,
    #[error("cannot open GeoIP database {path}: {reason}")]
    GeoIp { path: String, reason: String },
}

/// Settings shared by every subcommand.
#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// Resolve positions at all.
    #[arg(long, global = true, env = "POSITION_ENABLED", default_value_t = true, action = clap::ArgAction::Set)]
    pub position_enabled: bool,

    /// Whether the maintenance window is currently valid.
    #[arg(long, global = true, env = "POSITION_MAINTENANCE_VALID", default_value_t = true, action = clap::ArgAction::Set)]
    pub maintenance_valid: bool,

    /// Billable provider calls allowed per day.
    #[arg(long, global = true, env = "POSITION_DAILY_LIMIT", default_value_t = 500)]
    pub daily_limit: u64,

    /// Google Maps platform API key.
    #[arg(long, global = true, env = "GOOGLE_API_KEY", default_value = "", hide_env_values = true)]
    pub google_api_key: String,

    /// MaxMind GeoLite2-City database for IP lookups.
    #[arg(long, global = true, env = "GEOIP_DB")]
    pub geoip_db: Option<PathBuf>,

    /// Cache file. Defaults to ~/.position/cache.json.
    #[arg(long, global = true, env = "POSITION_CACHE")]
    pub cache_path: Option<PathBuf>,

    /// Quota state file. Defaults to ~/.position/quota.json.
    #[arg(long, global = true, env = "POSITION_QUOTA")]
    pub quota_path: Option<PathBuf>,

    /// Keep cache and quota in memory only.
    #[arg(long, global = true)]
    pub no_persist: bool,

    /// Per-request timeout for provider HTTP calls.
    #[arg(long, global = true, env = "POSITION_HTTP_TIMEOUT_SECS", default_value_t = 5)]
    pub http_timeout_secs: u64,

    /// Retries after a transport failure (not after an HTTP error status).
    #[arg(long, global = true, env = "POSITION_HTTP_RETRIES", default_value_t = 1)]
    pub http_retries: u32,

    /// IANA timezone whose midnight resets the daily quota.
    #[arg(long, global = true, env = "POSITION_RESET_TZ", default_value = "UTC")]
    pub reset_tz: String,
}

impl Settings {
    /// Check everything that can be checked without touching the network.
    pub fn validate(&self) -> Result<Tz, ConfigError> {
        if self.google_api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        if self.http_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        self.reset_timezone()
    }

    pub fn reset_timezone(&self) -> Result<Tz, ConfigError> {
        self.reset_tz
            .parse::<Tz>()
            .map_err(|_| ConfigError::UnknownTimezone(self.reset_tz.clone()))
    }

    pub fn policy(&self) -> StaticPolicy {
        StaticPolicy {
            enabled: self.position_enabled,
            maintenance_valid: self.maintenance_valid,
            daily_limit: self.daily_limit,
        }
    }

    pub fn quota_counter(&self) -> Result<QuotaCounter, ConfigError> {
        let tz = self.reset_timezone()?;
        Ok(if self.no_persist {
            QuotaCounter::in_memory(tz)
        } else {
            let path = self.quota_path.clone().unwrap_or_else(QuotaCounter::default_path);
            QuotaCounter::load_from(path, tz)
        })
    }

    fn cache(&self) -> PositionCache {
        if self.no_persist {
            PositionCache::in_memory()
        } else {
            let path = self.cache_path.clone().unwrap_or_else(PositionCache::default_path);
            PositionCache::load_from(path)
        }
    }

    fn gateway(&self) -> Result<LiveGateway, ConfigError> {
        let geoip = match &self.geoip_db {
            Some(path) => Some(MaxMindGeoIp::open(path).map_err(|e| ConfigError::GeoIp {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?),
            None => {
                warn!("no GeoIP database configured, IP requests will resolve to nothing");
                None
            }
        };
        let google = GoogleClient::with_options(
            self.google_api_key.trim(),
            GoogleEndpoints::default(),
            Duration::from_secs(self.http_timeout_secs),
            self.http_retries,
        );
        Ok(LiveGateway::new(geoip, google))
    }

    /// Validate and wire up the production resolver.
    pub fn build_resolver(&self) -> Result<PositionResolver, ConfigError> {
        self.validate()?;
        let quota = Arc::new(self.quota_counter()?);
        let cache: Arc<dyn ResolutionCache> = Arc::new(self.cache());
        let gateway = Arc::new(self.gateway()?);

        info!(
            "position resolver ready: enabled={}, maintenance_valid={}, daily_limit={}, used today={}",
            self.position_enabled,
            self.maintenance_valid,
            self.daily_limit,
            quota.snapshot().count
        );

        Ok(PositionResolver::new(Arc::new(self.policy()), quota, cache, gateway))
    }
}
