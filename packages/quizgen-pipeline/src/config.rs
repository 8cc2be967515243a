//! Pipeline configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use quizgen_core::{PipelineError, Result};

use crate::generator::GeneratorConfig;

/// Retry policy for transient persistence failures
///
/// Only `StoreUnavailable` during the persisting step is retried; every
/// other failure kind is fatal for the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Base backoff in milliseconds; attempt n waits base * 2^n
    pub base_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff_ms: 2_000,
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff for a 0-based attempt number (2s, 4s, 8s with
    /// the defaults).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_backoff_ms.saturating_mul(2u64.saturating_pow(attempt)))
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub retry: RetryPolicy,
    pub generator: GeneratorConfig,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.generator.max_questions == 0 {
            return Err(PipelineError::config("max_questions must be at least 1"));
        }
        if self.generator.min_sentence_chars == 0 {
            return Err(PipelineError::config(
                "min_sentence_chars must be at least 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_max_questions_rejected() {
        let mut config = PipelineConfig::default();
        config.generator.max_questions = 0;

        let err = config.validate().unwrap_err();
        assert_eq!(err.kind, quizgen_core::ErrorKind::Config);
    }

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let retry = RetryPolicy {
            max_retries: 3,
            base_backoff_ms: 2_000,
        };

        assert_eq!(retry.backoff_for(0), Duration::from_secs(2));
        assert_eq!(retry.backoff_for(1), Duration::from_secs(4));
        assert_eq!(retry.backoff_for(2), Duration::from_secs(8));
    }

    #[test]
    fn test_backoff_saturates() {
        let retry = RetryPolicy {
            max_retries: 100,
            base_backoff_ms: u64::MAX,
        };

        // No overflow panic on absurd inputs
        let _ = retry.backoff_for(63);
    }
}
