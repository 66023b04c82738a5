//! Batch configuration and its fluent builder.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const DEFAULT_CHUNK_SIZE: usize = 50;
const DEFAULT_MAX_RETRIES: u32 = 5;
const MAX_RETRY_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

/// How the retry delay grows from one retry round to the next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Same delay every round.
    #[default]
    Fixed,
    /// base * round
    Linear,
    /// base * 2^(round - 1)
    Exponential,
}

impl std::str::FromStr for BackoffStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "linear" => Ok(Self::Linear),
            "exponential" => Ok(Self::Exponential),
            other => Err(ConfigError::invalid(
                "backoff",
                "must be fixed, linear or exponential",
                other,
            )),
        }
    }
}

/// Configuration of a lineage.
///
/// Immutable once a unit starts executing; every descendant unit receives
/// the same values. Construct through [`BatchConfig::builder`] to get
/// validation, or use [`Default`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    chunk_size: NonZeroUsize,
    max_retries: u32,
    delay_minutes: u32,
    fail_fast: bool,
    #[serde(default)]
    backoff: BackoffStrategy,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: NonZeroUsize::new(DEFAULT_CHUNK_SIZE).unwrap_or(NonZeroUsize::MIN),
            max_retries: DEFAULT_MAX_RETRIES,
            delay_minutes: 0,
            fail_fast: false,
            backoff: BackoffStrategy::Fixed,
        }
    }
}

impl BatchConfig {
    pub fn builder() -> BatchConfigBuilder {
        BatchConfigBuilder::default()
    }

    /// Start a builder from this configuration.
    pub fn to_builder(self) -> BatchConfigBuilder {
        BatchConfigBuilder { config: self }
    }

    pub fn chunk_size(&self) -> NonZeroUsize {
        self.chunk_size
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn delay_minutes(&self) -> u32 {
        self.delay_minutes
    }

    pub fn fail_fast(&self) -> bool {
        self.fail_fast
    }

    pub fn backoff(&self) -> BackoffStrategy {
        self.backoff
    }

    /// Copy with a different retry limit. Used by descendant factories.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Copy with a different chunk size. Used by descendant factories.
    pub fn with_chunk_size(mut self, chunk_size: NonZeroUsize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Whether a lineage currently on `attempt` may start another retry round.
    ///
    /// Attempt 1 is the first pass, so `attempt - 1` rounds have been used.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt.saturating_sub(1) < self.max_retries
    }

    /// Delay before the retry round that starts `next_attempt`.
    pub fn delay_for_attempt(&self, next_attempt: u32) -> Duration {
        if self.delay_minutes == 0 || next_attempt <= 1 {
            return Duration::ZERO;
        }

        let base = Duration::from_secs(u64::from(self.delay_minutes) * 60);
        let round = next_attempt - 1;

        let delay = match self.backoff {
            BackoffStrategy::Fixed => Some(base),
            BackoffStrategy::Linear => base.checked_mul(round),
            BackoffStrategy::Exponential => 2u32
                .checked_pow(round - 1)
                .and_then(|factor| base.checked_mul(factor)),
        };

        delay.unwrap_or(MAX_RETRY_DELAY).min(MAX_RETRY_DELAY)
    }
}

/// Fluent builder for [`BatchConfig`].
///
/// Setters take signed integers so that values coming from the outside
/// (environment, CLI flags) are checked here; a bad value fails immediately.
///
/// ```
/// use batchline_core::BatchConfig;
///
/// let config = BatchConfig::builder()
///     .set_chunk_size(200)?
///     .set_max_retries(3)?
///     .set_fail_fast(true)
///     .build();
/// assert_eq!(config.chunk_size().get(), 200);
/// # Ok::<(), batchline_core::ConfigError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct BatchConfigBuilder {
    config: BatchConfig,
}

impl BatchConfigBuilder {
    pub fn set_chunk_size(mut self, chunk_size: i64) -> Result<Self, ConfigError> {
        let size = usize::try_from(chunk_size)
            .ok()
            .and_then(NonZeroUsize::new)
            .ok_or_else(|| ConfigError::invalid("chunk_size", "must be greater than 0", chunk_size))?;
        self.config.chunk_size = size;
        Ok(self)
    }

    pub fn set_max_retries(mut self, max_retries: i64) -> Result<Self, ConfigError> {
        self.config.max_retries = u32::try_from(max_retries)
            .map_err(|_| ConfigError::invalid("max_retries", "must be between 0 and u32::MAX", max_retries))?;
        Ok(self)
    }

    pub fn set_delay_minutes(mut self, delay_minutes: i64) -> Result<Self, ConfigError> {
        self.config.delay_minutes = u32::try_from(delay_minutes).map_err(|_| {
            ConfigError::invalid("delay_minutes", "must be between 0 and u32::MAX", delay_minutes)
        })?;
        Ok(self)
    }

    pub fn set_fail_fast(mut self, fail_fast: bool) -> Self {
        self.config.fail_fast = fail_fast;
        self
    }

    pub fn set_backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.config.backoff = backoff;
        self
    }

    pub fn build(self) -> BatchConfig {
        self.config
    }
}
