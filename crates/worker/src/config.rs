use std::time::Duration;

use autorun_browser::WebDriverConfig;
use autorun_store::PostgrestConfig;

use crate::engine::DEFAULT_POLL_INTERVAL;
use crate::retry::RetryPolicy;
use crate::tasks::TaskConfig;

/// Accepted `LOG_LEVEL` values.
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Crates whose log level `LOG_LEVEL` controls.
const LOG_TARGETS: [&str; 4] = [
    "autorun_worker",
    "autorun_store",
    "autorun_browser",
    "autorun_core",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{name} has invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Worker configuration loaded from environment variables.
///
/// | Env Var                    | Required | Default                    |
/// |----------------------------|----------|----------------------------|
/// | `SUPABASE_URL`             | yes      | --                         |
/// | `SUPABASE_SERVICE_ROLE`    | yes      | --                         |
/// | `JOB_POLL_SECONDS`         | no       | `3`                        |
/// | `LOG_LEVEL`                | no       | `info`                     |
/// | `JOB_TABLE`                | no       | `automation_jobs`          |
/// | `JOB_SCHEDULE_FILTER`      | no       | `true`                     |
/// | `WEBDRIVER_URL`            | no       | `http://localhost:4444`    |
/// | `SEARCH_URL`               | no       | `https://www.google.com`   |
/// | `STORE_CONNECT_ATTEMPTS`   | no       | `10`                       |
/// | `STORE_CONNECT_DELAY_SECS` | no       | `3`                        |
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub store_url: String,
    pub service_key: String,
    pub poll_interval: Duration,
    pub log_level: String,
    pub table: String,
    pub schedule_filter: bool,
    pub webdriver_url: String,
    pub search_url: String,
    pub connect_attempts: u32,
    pub connect_delay: Duration,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let store_url = required("SUPABASE_URL")?;
        let service_key = required("SUPABASE_SERVICE_ROLE")?;

        let poll_interval = match get("JOB_POLL_SECONDS") {
            None => DEFAULT_POLL_INTERVAL,
            Some(raw) => parse_seconds("JOB_POLL_SECONDS", &raw)?,
        };

        let log_level = get("LOG_LEVEL")
            .unwrap_or_else(|| "info".into())
            .to_ascii_lowercase();
        if !LOG_LEVELS.contains(&log_level.as_str()) {
            return Err(ConfigError::Invalid {
                name: "LOG_LEVEL",
                value: log_level,
                reason: "expected one of trace, debug, info, warn, error",
            });
        }

        let schedule_filter = match get("JOB_SCHEDULE_FILTER") {
            None => true,
            Some(raw) => parse_bool("JOB_SCHEDULE_FILTER", &raw)?,
        };

        let connect_attempts = match get("STORE_CONNECT_ATTEMPTS") {
            None => 10,
            Some(raw) => match raw.parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "STORE_CONNECT_ATTEMPTS",
                        value: raw,
                        reason: "expected a positive integer",
                    })
                }
            },
        };

        let connect_delay = match get("STORE_CONNECT_DELAY_SECS") {
            None => Duration::from_secs(3),
            Some(raw) => parse_seconds("STORE_CONNECT_DELAY_SECS", &raw)?,
        };

        Ok(Self {
            store_url,
            service_key,
            poll_interval,
            log_level,
            table: get("JOB_TABLE").unwrap_or_else(|| "automation_jobs".into()),
            schedule_filter,
            webdriver_url: get("WEBDRIVER_URL").unwrap_or_else(|| "http://localhost:4444".into()),
            search_url: get("SEARCH_URL").unwrap_or_else(|| "https://www.google.com".into()),
            connect_attempts,
            connect_delay,
        })
    }

    pub fn postgrest(&self) -> PostgrestConfig {
        let mut config = PostgrestConfig::new(&self.store_url, &self.service_key);
        config.table = self.table.clone();
        config.schedule_filter = self.schedule_filter;
        config
    }

    pub fn webdriver(&self) -> WebDriverConfig {
        WebDriverConfig::new(&self.webdriver_url)
    }

    pub fn tasks(&self) -> TaskConfig {
        TaskConfig {
            search_url: self.search_url.clone(),
            ..TaskConfig::default()
        }
    }

    pub fn connect_retry(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.connect_attempts,
            delay: self.connect_delay,
        }
    }
}

/// Default `EnvFilter` directives when `RUST_LOG` is unset.
pub fn log_filter(level: &str) -> String {
    LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn parse_seconds(name: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    match raw.parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs > 0.0 => Ok(Duration::from_secs_f64(secs)),
        _ => Err(ConfigError::Invalid {
            name,
            value: raw.to_string(),
            reason: "expected a positive number of seconds",
        }),
    }
}

fn parse_bool(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: raw.to_string(),
            reason: "expected true or false",
        }),
    }
}
