//! Configuration loading from the environment.
//!
//! | variable                     | default |
//! |------------------------------|---------|
//! | `BATCHLINE_CHUNK_SIZE`       | 50      |
//! | `BATCHLINE_MAX_RETRIES`      | 5       |
//! | `BATCHLINE_DELAY_MINUTES`    | 0       |
//! | `BATCHLINE_FAIL_FAST`        | false   |
//! | `BATCHLINE_BACKOFF`          | fixed   |
//! | `BATCHLINE_POLL_INTERVAL_MS` | 100     |

use std::time::Duration;

use batchline_core::{BackoffStrategy, BatchConfig, ConfigError};

use crate::jobs::ExecutorConfig;

/// Batch and executor settings for a host process.
#[derive(Debug, Clone)]
pub struct Settings {
    pub batch: BatchConfig,
    pub executor: ExecutorConfig,
}

impl Settings {
    /// Read settings from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut builder = BatchConfig::builder();

        if let Some(v) = lookup("BATCHLINE_CHUNK_SIZE") {
            builder = builder.set_chunk_size(parse_int("chunk_size", &v)?)?;
        }
        if let Some(v) = lookup("BATCHLINE_MAX_RETRIES") {
            builder = builder.set_max_retries(parse_int("max_retries", &v)?)?;
        }
        if let Some(v) = lookup("BATCHLINE_DELAY_MINUTES") {
            builder = builder.set_delay_minutes(parse_int("delay_minutes", &v)?)?;
        }
        if let Some(v) = lookup("BATCHLINE_FAIL_FAST") {
            builder = builder.set_fail_fast(parse_bool("fail_fast", &v)?);
        }
        if let Some(v) = lookup("BATCHLINE_BACKOFF") {
            builder = builder.set_backoff(v.parse::<BackoffStrategy>()?);
        }

        let mut executor = ExecutorConfig::default();
        if let Some(v) = lookup("BATCHLINE_POLL_INTERVAL_MS") {
            let ms = parse_int("poll_interval_ms", &v)?;
            let ms = u64::try_from(ms)
                .ok()
                .filter(|ms| *ms > 0)
                .ok_or_else(|| ConfigError::invalid("poll_interval_ms", "must be greater than 0", ms))?;
            executor = executor.with_poll_interval(Duration::from_millis(ms));
        }

        Ok(Self {
            batch: builder.build(),
            executor,
        })
    }
}

fn parse_int(field: &'static str, raw: &str) -> Result<i64, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::invalid(field, "must be an integer", raw))
}

fn parse_bool(field: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(field, "must be a boolean", raw)),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.batch, BatchConfig::default());
        assert_eq!(s.executor.poll_interval, Duration::from_millis(100));
    }

    #[test]
    fn reads_all_variables() {
        let s = settings(&[
            ("BATCHLINE_CHUNK_SIZE", "25"),
            ("BATCHLINE_MAX_RETRIES", "2"),
            ("BATCHLINE_DELAY_MINUTES", "10"),
            ("BATCHLINE_FAIL_FAST", "yes"),
            ("BATCHLINE_BACKOFF", "exponential"),
            ("BATCHLINE_POLL_INTERVAL_MS", "5"),
        ])
        .unwrap();

        assert_eq!(s.batch.chunk_size().get(), 25);
        assert_eq!(s.batch.max_retries(), 2);
        assert_eq!(s.batch.delay_minutes(), 10);
        assert!(s.batch.fail_fast());
        assert_eq!(s.batch.backoff(), BackoffStrategy::Exponential);
        assert_eq!(s.executor.poll_interval, Duration::from_millis(5));
    }

    #[test]
    fn negative_values_are_invalid_configuration() {
        for (key, value) in [
            ("BATCHLINE_CHUNK_SIZE", "0"),
            ("BATCHLINE_MAX_RETRIES", "-1"),
            ("BATCHLINE_DELAY_MINUTES", "-5"),
            ("BATCHLINE_POLL_INTERVAL_MS", "0"),
        ] {
            let err = settings(&[(key, value)]).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidConfiguration { .. }), "{key}");
        }
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(settings(&[("BATCHLINE_CHUNK_SIZE", "lots")]).is_err());
        assert!(settings(&[("BATCHLINE_FAIL_FAST", "maybe")]).is_err());
        assert!(settings(&[("BATCHLINE_BACKOFF", "random")]).is_err());
    }
}
