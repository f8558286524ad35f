use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderValue;
use slidecast_pipeline::config::{
    PipelineConfig, DEFAULT_MIN_SLIDE_SECS, DEFAULT_NARRATION_PROVIDERS, DEFAULT_PAPER_SOURCE_URL,
};

/// Default number of events replayed to a new observer.
pub const DEFAULT_REPLAY_LIMIT: usize = 200;

/// Configuration that could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for cancelled runners (default: `10`).
    pub shutdown_timeout_secs: u64,
    /// Events replayed when no `limit` is given (default: `200`).
    pub replay_limit: usize,
    /// Upper clamp for any requested replay `limit` (default: `1000`).
    pub max_replay_limit: usize,
    /// Bounded queue length per live observer (default: `512`).
    pub observer_queue_capacity: usize,
    /// Newest backlog entries kept per job; `None` keeps everything.
    pub backlog_retention: Option<usize>,
    /// Interval between WebSocket pings (default: `30`).
    pub heartbeat_interval_secs: u64,
    pub log_format: LogFormat,
    pub pipeline: PipelineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
            request_timeout_secs: 30,
            shutdown_timeout_secs: 10,
            replay_limit: DEFAULT_REPLAY_LIMIT,
            max_replay_limit: 1000,
            observer_queue_capacity: slidecast_events::bus::DEFAULT_OBSERVER_CAPACITY,
            backlog_retention: None,
            heartbeat_interval_secs: 30,
            log_format: LogFormat::Text,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                                       |
    /// |-----------------------------|-----------------------------------------------|
    /// | `HOST`                      | `0.0.0.0`                                     |
    /// | `PORT`                      | `8000`                                        |
    /// | `CORS_ORIGINS`              | `http://localhost:3000,http://127.0.0.1:3000` |
    /// | `REQUEST_TIMEOUT_SECS`      | `30`                                          |
    /// | `SHUTDOWN_TIMEOUT_SECS`     | `10`                                          |
    /// | `REPLAY_LIMIT`              | `200`                                         |
    /// | `MAX_REPLAY_LIMIT`          | `1000`                                        |
    /// | `OBSERVER_QUEUE_CAPACITY`   | `512`                                         |
    /// | `BACKLOG_RETENTION`         | `0` (unbounded)                               |
    /// | `HEARTBEAT_INTERVAL_SECS`   | `30`                                          |
    /// | `OUTPUT_DIR`                | `output`                                      |
    /// | `PAPER_SOURCE_URL`          | `https://huggingface.co`                      |
    /// | `NARRATION_PROVIDERS`       | `tone,silence`                                |
    /// | `MIN_SLIDE_SECS`            | `3.0`                                         |
    /// | `PIPELINE_DRY_RUN`          | `false`                                       |
    /// | `PIPELINE_DRY_RUN_DELAY_MS` | `0`                                           |
    /// | `LOG_FORMAT`                | `text`                                        |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let env = Env(&lookup);

        let cors_origins = match env.get("CORS_ORIGINS") {
            Some(raw) => split_list(&raw),
            None => defaults.cors_origins,
        };
        for origin in &cors_origins {
            if let Err(e) = HeaderValue::from_str(origin) {
                return Err(invalid("CORS_ORIGINS", origin, e));
            }
        }

        let replay_limit = env.parse("REPLAY_LIMIT", defaults.replay_limit)?;
        let max_replay_limit = env.parse("MAX_REPLAY_LIMIT", defaults.max_replay_limit)?;
        if replay_limit > max_replay_limit {
            return Err(invalid(
                "REPLAY_LIMIT",
                &replay_limit.to_string(),
                "must not exceed MAX_REPLAY_LIMIT",
            ));
        }

        let observer_queue_capacity =
            env.parse("OBSERVER_QUEUE_CAPACITY", defaults.observer_queue_capacity)?;
        if observer_queue_capacity == 0 {
            return Err(invalid("OBSERVER_QUEUE_CAPACITY", "0", "must be positive"));
        }

        let backlog_retention = match env.parse("BACKLOG_RETENTION", 0usize)? {
            0 => None,
            n => Some(n),
        };

        let log_format = match env.get("LOG_FORMAT").as_deref().map(str::trim) {
            None | Some("") | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => return Err(invalid("LOG_FORMAT", other, "expected text or json")),
        };

        Ok(Self {
            host: env.get("HOST").unwrap_or(defaults.host),
            port: env.parse("PORT", defaults.port)?,
            cors_origins,
            request_timeout_secs: env.parse("REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs)?,
            shutdown_timeout_secs: env
                .parse("SHUTDOWN_TIMEOUT_SECS", defaults.shutdown_timeout_secs)?,
            replay_limit,
            max_replay_limit,
            observer_queue_capacity,
            backlog_retention,
            heartbeat_interval_secs: env
                .parse("HEARTBEAT_INTERVAL_SECS", defaults.heartbeat_interval_secs)?
                .max(1),
            log_format,
            pipeline: pipeline_config(&env)?,
        })
    }

    /// Replay size for a request: the default when absent, clamped to the cap.
    pub fn replay_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.replay_limit)
            .min(self.max_replay_limit)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

fn pipeline_config(env: &Env<'_>) -> Result<PipelineConfig, ConfigError> {
    let narration_providers = match env.get("NARRATION_PROVIDERS") {
        Some(raw) => split_list(&raw),
        None => DEFAULT_NARRATION_PROVIDERS
            .iter()
            .map(|s| s.to_string())
            .collect(),
    };
    if narration_providers.is_empty() {
        return Err(invalid("NARRATION_PROVIDERS", "", "at least one provider is required"));
    }

    let min_slide_secs: f64 = env.parse("MIN_SLIDE_SECS", DEFAULT_MIN_SLIDE_SECS)?;
    if !min_slide_secs.is_finite() || min_slide_secs <= 0.0 {
        return Err(invalid(
            "MIN_SLIDE_SECS",
            &min_slide_secs.to_string(),
            "must be a positive number",
        ));
    }

    Ok(PipelineConfig {
        output_dir: env
            .get("OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("output")),
        paper_source_url: env
            .get("PAPER_SOURCE_URL")
            .unwrap_or_else(|| DEFAULT_PAPER_SOURCE_URL.to_string()),
        narration_providers,
        min_slide_secs,
        dry_run: env.flag("PIPELINE_DRY_RUN")?,
        dry_run_delay: Duration::from_millis(env.parse("PIPELINE_DRY_RUN_DELAY_MS", 0u64)?),
    })
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    /// The variable's value, with empty strings treated as unset.
    fn get(&self, var: &str) -> Option<String> {
        (self.0)(var).filter(|v| !v.trim().is_empty())
    }

    fn parse<T>(&self, var: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.get(var) {
            Some(raw) => raw.trim().parse().map_err(|e| invalid(var, &raw, e)),
            None => Ok(default),
        }
    }

    fn flag(&self, var: &'static str) -> Result<bool, ConfigError> {
        match self.get(var).map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            None | Some("false" | "0" | "no" | "off") => Ok(false),
            Some("true" | "1" | "yes" | "on") => Ok(true),
            Some(other) => Err(invalid(var, other, "expected a boolean")),
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn invalid(var: &'static str, value: &str, reason: impl Display) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|var| map.get(var).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = load(&[]).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.replay_limit, 200);
        assert_eq!(config.backlog_retention, None);
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.pipeline.narration_providers, vec!["tone", "silence"]);
        assert!(!config.pipeline.dry_run);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = load(&[
            ("PORT", "9001"),
            ("CORS_ORIGINS", "http://a.test, http://b.test"),
            ("BACKLOG_RETENTION", "5000"),
            ("NARRATION_PROVIDERS", "silence"),
            ("PIPELINE_DRY_RUN", "true"),
            ("PIPELINE_DRY_RUN_DELAY_MS", "25"),
            ("LOG_FORMAT", "json"),
        ])
        .unwrap();
        assert_eq!(config.port, 9001);
        assert_eq!(config.cors_origins, vec!["http://a.test", "http://b.test"]);
        assert_eq!(config.backlog_retention, Some(5000));
        assert_eq!(config.pipeline.narration_providers, vec!["silence"]);
        assert!(config.pipeline.dry_run);
        assert_eq!(config.pipeline.dry_run_delay, Duration::from_millis(25));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert_matches!(load(&[("PORT", "http")]), Err(ConfigError::Invalid { var: "PORT", .. }));
        assert_matches!(
            load(&[("PIPELINE_DRY_RUN", "maybe")]),
            Err(ConfigError::Invalid { var: "PIPELINE_DRY_RUN", .. })
        );
        assert_matches!(
            load(&[("REPLAY_LIMIT", "5000")]),
            Err(ConfigError::Invalid { var: "REPLAY_LIMIT", .. })
        );
    }

    #[test]
    fn replay_limit_is_clamped() {
        let config = ServerConfig::default();
        assert_eq!(config.replay_limit(None), 200);
        assert_eq!(config.replay_limit(Some(50)), 50);
        assert_eq!(config.replay_limit(Some(1_000_000)), 1000);
    }
}
