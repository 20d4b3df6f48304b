use tokio::time::Duration;

use crate::{Error, Result, retry::RetryPolicy};

/// Runtime settings for a [`crate::Dispatcher`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchConfig {
	pub tick_interval: Duration,
	pub max_batch_size: usize,
	pub max_concurrent_batches: usize,
	pub retry_attempts: u32,
	pub retry_delay: Duration,
	pub retry_max_delay: Duration,
	pub active_ttl: Duration,
}
impl DispatchConfig {
	pub fn from_config(cfg: &folio_config::Dispatch) -> Self {
		Self {
			tick_interval: Duration::from_millis(cfg.tick_interval_ms),
			max_batch_size: cfg.max_batch_size,
			max_concurrent_batches: cfg.max_concurrent_batches,
			retry_attempts: cfg.retry_attempts,
			retry_delay: Duration::from_millis(cfg.retry_delay_ms),
			retry_max_delay: Duration::from_millis(cfg.retry_max_delay_ms),
			active_ttl: Duration::from_millis(cfg.active_ttl_ms),
		}
	}

	pub fn retry_policy(&self) -> RetryPolicy {
		RetryPolicy {
			attempts: self.retry_attempts,
			base_delay: self.retry_delay,
			max_delay: self.retry_max_delay,
		}
	}

	pub fn validate(&self) -> Result<()> {
		if self.tick_interval.is_zero() {
			return Err(Error::InvalidConfig {
				message: "tick_interval must be greater than zero.".to_string(),
			});
		}
		if self.max_batch_size == 0 {
			return Err(Error::InvalidConfig {
				message: "max_batch_size must be greater than zero.".to_string(),
			});
		}
		if self.max_concurrent_batches == 0 {
			return Err(Error::InvalidConfig {
				message: "max_concurrent_batches must be greater than zero.".to_string(),
			});
		}

		Ok(())
	}
}
impl Default for DispatchConfig {
	fn default() -> Self {
		Self::from_config(&folio_config::Dispatch::default())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_match_documented_values() {
		let cfg = DispatchConfig::default();

		assert_eq!(cfg.tick_interval, Duration::from_millis(100));
		assert_eq!(cfg.max_batch_size, 10);
		assert_eq!(cfg.max_concurrent_batches, 3);
		assert_eq!(cfg.retry_attempts, 2);
		assert_eq!(cfg.retry_policy().delay_for_attempt(2), Duration::from_millis(2_000));
		assert_eq!(cfg.active_ttl, Duration::from_secs(30));
		assert!(cfg.validate().is_ok());
	}

	#[test]
	fn zero_concurrency_is_rejected() {
		let cfg = DispatchConfig { max_concurrent_batches: 0, ..DispatchConfig::default() };

		assert!(cfg.validate().is_err());
	}
}
