//! Client and engine configuration.
//!
//! Credentials come from the environment (the external config collaborator);
//! everything else has defaults matched to the providers' published limits.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the Lemlist API client.
///
/// Lemlist allows 20 requests per 2 seconds per API key and reports quota via
/// `X-RateLimit-Remaining` / `X-RateLimit-Reset`.
#[derive(Debug, Clone)]
pub struct LemlistConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
    /// Page size for offset pagination (provider max 100).
    pub page_size: usize,
    /// Courtesy delay between page fetches.
    pub page_delay: Duration,
    /// Proactively pause when remaining quota drops below this.
    pub rate_limit_threshold: u64,
}

impl LemlistConfig {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: "https://api.lemlist.com/api".to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            page_size: 100,
            page_delay: Duration::from_millis(100),
            rate_limit_threshold: 5,
        }
    }

    /// Build from `LEMLIST_API_KEY` (and optional `LEMLIST_BASE_URL`).
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = require_env("LEMLIST_API_KEY")?;
        let mut cfg = Self::new(api_key);
        if let Ok(base_url) = env::var("LEMLIST_BASE_URL") {
            cfg.base_url = base_url;
        }
        Ok(cfg)
    }
}

/// Configuration for the HubSpot API client.
///
/// Standard limit is 100 requests per 10 seconds; batch endpoints are capped
/// at 4 requests per second, hence the inter-batch delay.
#[derive(Debug, Clone)]
pub struct HubSpotConfig {
    pub api_token: String,
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
    /// Records per batch write (provider max 100).
    pub batch_size: usize,
    /// Delay between batch requests.
    pub batch_delay: Duration,
    /// Page size for cursor pagination (provider max 100).
    pub page_size: usize,
}

impl HubSpotConfig {
    pub fn new(api_token: String) -> Self {
        Self {
            api_token,
            base_url: "https://api.hubapi.com".to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
            batch_size: 50,
            batch_delay: Duration::from_millis(250),
            page_size: 100,
        }
    }

    /// Build from `HUBSPOT_API_TOKEN` (and optional `HUBSPOT_BASE_URL`).
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_token = require_env("HUBSPOT_API_TOKEN")?;
        let mut cfg = Self::new(api_token);
        if let Ok(base_url) = env::var("HUBSPOT_BASE_URL") {
            cfg.base_url = base_url;
        }
        Ok(cfg)
    }
}

/// Tuning for the sync engine's enrichment passes.
#[derive(Debug, Clone)]
pub struct SyncTuning {
    /// Detail look-ups performed synchronously during a first load. Leads
    /// beyond the cap wait for the batch enrichment job.
    pub enrichment_cap: usize,
    /// Delay between consecutive lead-detail look-ups.
    pub detail_delay: Duration,
    /// Leads per enrichment batch before the longer pause kicks in.
    pub batch_size: usize,
    /// Pause between enrichment batches.
    pub batch_pause: Duration,
}

impl Default for SyncTuning {
    fn default() -> Self {
        Self {
            enrichment_cap: 50,
            detail_delay: Duration::from_millis(150),
            batch_size: 50,
            batch_pause: Duration::from_secs(2),
        }
    }
}

/// Optional local database override from `LEADSYNC_DB`.
pub fn db_path_from_env() -> Option<PathBuf> {
    env::var("LEADSYNC_DB").ok().map(PathBuf::from)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),
}

fn require_env(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar(name)),
    }
}
