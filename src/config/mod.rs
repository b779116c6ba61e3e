use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Upstream listings endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeedConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub endpoint: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default, skip_serializing)]
    pub password: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: u32,

    #[serde(default)]
    pub offset: u32,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Section rendering
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RenderConfig {
    #[serde(default = "default_active_cap")]
    pub active_cap: usize,

    #[serde(default = "default_sold_cap")]
    pub sold_cap: usize,

    #[serde(default = "default_description_limit")]
    pub description_limit: usize,

    #[serde(default = "default_placeholder_image")]
    pub placeholder_image: String,

    #[serde(default)]
    pub dedupe: bool,
}

/// Refresh scheduling
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_refresh_minutes")]
    pub refresh_minutes: u64,

    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: usize,

    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_timeout_secs() -> u64 {
    10
}
fn default_fetch_limit() -> u32 {
    50
}
fn default_user_agent() -> String {
    concat!("listings-feed/", env!("CARGO_PKG_VERSION")).to_string()
}
fn default_active_cap() -> usize {
    50
}
fn default_sold_cap() -> usize {
    6
}
fn default_description_limit() -> usize {
    100
}
fn default_placeholder_image() -> String {
    "images/placeholder.jpg".to_string()
}
fn default_refresh_minutes() -> u64 {
    15
}
fn default_retry_attempts() -> usize {
    2
}
fn default_retry_delay_secs() -> u64 {
    5
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: String::new(),
            username: None,
            password: None,
            timeout_secs: default_timeout_secs(),
            fetch_limit: default_fetch_limit(),
            offset: 0,
            user_agent: default_user_agent(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            active_cap: default_active_cap(),
            sold_cap: default_sold_cap(),
            description_limit: default_description_limit(),
            placeholder_image: default_placeholder_image(),
            dedupe: false,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            refresh_minutes: default_refresh_minutes(),
            retry_attempts: default_retry_attempts(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

impl FeedConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn endpoint_url(&self) -> Result<Url> {
        Url::parse(self.endpoint.trim())
            .with_context(|| format!("Invalid feed endpoint {:?}", self.endpoint))
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.refresh_minutes * 60)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

/// `LISTINGS_<SECTION>__<KEY>`, e.g. `LISTINGS_FEED__ENDPOINT`.
fn env_source() -> config::Environment {
    config::Environment::with_prefix("LISTINGS")
        .prefix_separator("_")
        .separator("__")
}

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(env_source())
            .build()
            .context("Failed to read configuration sources")?;

        let app_cfg: AppConfig = cfg
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        app_cfg.validate()?;
        Ok(app_cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.render.active_cap == 0 || self.render.sold_cap == 0 {
            bail!("render caps must be positive");
        }
        if self.scheduler.refresh_minutes == 0 {
            bail!("scheduler.refresh_minutes must be positive");
        }
        if self.feed.timeout_secs == 0 {
            bail!("feed.timeout_secs must be positive");
        }
        if self.feed.fetch_limit == 0 {
            bail!("feed.fetch_limit must be positive");
        }
        if self.feed.enabled {
            self.feed.endpoint_url()?;
        }
        Ok(())
    }
}
