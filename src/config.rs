// src/config.rs
//! Service configuration: TOML file with env-var overrides on top.
//!
//! Every pacing/retry constant in the refresh and scrape paths is a policy
//! choice, not an invariant, so all of them live here.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::warn;

use crate::refresh::RefreshTuning;
use crate::scrape::ScrapeTuning;

pub const ENV_CONFIG_PATH: &str = "ECON_CALENDAR_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/service.toml";
pub const ENV_BIND_ADDR: &str = "ECON_CALENDAR_BIND_ADDR";

/// Where the calendar lives and which timezone its clock displays. The
/// timezone is deliberately one named value used by both the browser
/// emulation and the UTC conversion — changing the source site is a one-line
/// config edit, not a multi-file hunt.
const DEFAULT_SOURCE_URL: &str = "https://es.investing.com/economic-calendar/";
const DEFAULT_SOURCE_TIMEZONE: &str = "Europe/Madrid";

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    pub bind_addr: String,
    pub source_url: String,
    pub source_timezone: String,
    /// Optional JSON snapshot mirroring the cache across restarts.
    pub snapshot_path: Option<String>,
    pub scrape: ScrapeSection,
    pub refresh: RefreshSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScrapeSection {
    pub attempts: u32,
    pub retry_backoff_secs: u64,
    pub window_delay_secs: u64,
    pub nav_timeout_secs: u64,
    pub wait_timeout_secs: u64,
    pub load_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RefreshSection {
    pub sweep_hour_utc: u32,
    pub rolling_interval_mins: u64,
    pub requeue_delay_mins: u64,
    pub retention_days: u32,
    pub staleness_hours: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            source_url: DEFAULT_SOURCE_URL.to_string(),
            source_timezone: DEFAULT_SOURCE_TIMEZONE.to_string(),
            snapshot_path: None,
            scrape: ScrapeSection::default(),
            refresh: RefreshSection::default(),
        }
    }
}

impl Default for ScrapeSection {
    fn default() -> Self {
        Self {
            attempts: 2,
            retry_backoff_secs: 5,
            window_delay_secs: 3,
            nav_timeout_secs: 90,
            wait_timeout_secs: 15,
            load_timeout_secs: 30,
        }
    }
}

impl Default for RefreshSection {
    fn default() -> Self {
        Self {
            sweep_hour_utc: 2,
            rolling_interval_mins: 360,
            requeue_delay_mins: 30,
            retention_days: 180,
            staleness_hours: 12,
        }
    }
}

impl ServiceConfig {
    /// Load order: $ECON_CALENDAR_CONFIG_PATH, then config/service.toml,
    /// then built-in defaults. $ECON_CALENDAR_BIND_ADDR overrides the file.
    pub fn load() -> Result<Self> {
        let mut cfg = if let Ok(path) = std::env::var(ENV_CONFIG_PATH) {
            Self::from_file(Path::new(&path))?
        } else {
            let default = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default.exists() {
                Self::from_file(&default)?
            } else {
                Self::default()
            }
        };
        if let Ok(addr) = std::env::var(ENV_BIND_ADDR) {
            cfg.bind_addr = addr;
        }
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    /// The source site's display timezone. An unknown name falls back to the
    /// default rather than taking the service down, with a loud warning —
    /// scraped times would be wrong in any other zone.
    pub fn source_tz(&self) -> Tz {
        self.source_timezone.parse().unwrap_or_else(|_| {
            warn!(
                timezone = %self.source_timezone,
                fallback = DEFAULT_SOURCE_TIMEZONE,
                "unknown source timezone in config"
            );
            DEFAULT_SOURCE_TIMEZONE.parse().expect("default timezone is valid")
        })
    }

    pub fn scrape_tuning(&self) -> ScrapeTuning {
        ScrapeTuning {
            attempts: self.scrape.attempts.max(1),
            retry_backoff: Duration::from_secs(self.scrape.retry_backoff_secs),
            window_delay: Duration::from_secs(self.scrape.window_delay_secs),
        }
    }

    pub fn refresh_tuning(&self) -> RefreshTuning {
        RefreshTuning {
            sweep_hour_utc: self.refresh.sweep_hour_utc.min(23),
            rolling_interval: Duration::from_secs(self.refresh.rolling_interval_mins.max(1) * 60),
            requeue_delay: Duration::from_secs(self.refresh.requeue_delay_mins * 60),
            retention_days: self.refresh.retention_days,
            staleness: Duration::from_secs(self.refresh.staleness_hours * 3600),
        }
    }
}
