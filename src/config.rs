use std::time::Duration;

use serde::Deserialize;

const DEFAULT_FEED_URL: &str = "https://open.neis.go.kr/hub/mealServiceDietInfo";

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    pub db_timeout_secs: u64,
    pub batch_pause_ms: u64,
    pub sentinel_ttl_hours: i64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            db_timeout_secs: 10,
            batch_pause_ms: 1000,
            sentinel_ttl_hours: 24,
        }
    }
}

impl IngestConfig {
    pub fn db_timeout(&self) -> Duration {
        Duration::from_secs(self.db_timeout_secs)
    }

    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }

    pub fn sentinel_ttl(&self) -> time::Duration {
        time::Duration::hours(self.sentinel_ttl_hours)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub feed: FeedConfig,
    pub ingest: IngestConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let feed = FeedConfig {
            api_key: std::env::var("NEIS_API_KEY")?,
            base_url: std::env::var("NEIS_BASE_URL").unwrap_or_else(|_| DEFAULT_FEED_URL.into()),
            timeout_secs: env_or("FEED_TIMEOUT_SECS", 10),
        };
        let defaults = IngestConfig::default();
        let ingest = IngestConfig {
            db_timeout_secs: env_or("DB_TIMEOUT_SECS", defaults.db_timeout_secs),
            batch_pause_ms: env_or("BATCH_PAUSE_MS", defaults.batch_pause_ms),
            sentinel_ttl_hours: env_or("SENTINEL_TTL_HOURS", defaults.sentinel_ttl_hours),
        };
        Ok(Self {
            database_url,
            feed,
            ingest,
        })
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
