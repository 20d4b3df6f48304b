use std::sync::Arc;

use tokio::time::{self, Duration};

use crate::{Error, SearchHits};
use folio_providers::SearchProvider;

const MAX_BACKOFF_SHIFT: u32 = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Additional calls after the first failure.
	pub attempts: u32,
	pub base_delay: Duration,
	pub max_delay: Duration,
}
impl RetryPolicy {
	/// Delay before retry number `attempt` (1-based): `base * 2^(attempt - 1)`, capped.
	pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
		let exp = attempt.max(1).saturating_sub(1).min(MAX_BACKOFF_SHIFT);
		let delay = self.base_delay.saturating_mul(1 << exp);

		delay.min(self.max_delay)
	}
}

pub struct RetryReport {
	pub outcome: Result<SearchHits, Error>,
	/// Provider calls made by the retry loop, excluding the initial failed call.
	pub calls: u32,
}

/// Re-runs one failed request on its own schedule.
pub async fn retry_request(
	provider: Arc<dyn SearchProvider>,
	policy: RetryPolicy,
	query: &str,
	search_type: &str,
	initial_error: String,
) -> RetryReport {
	let mut last_error = initial_error;

	for attempt in 1..=policy.attempts {
		let delay = policy.delay_for_attempt(attempt);

		tracing::warn!(
			attempt,
			max_attempts = policy.attempts,
			delay_ms = delay.as_millis() as u64,
			error = %last_error,
			"Retrying search after provider failure."
		);

		time::sleep(delay).await;

		match provider.search(query, search_type).await {
			Ok(hits) => {
				tracing::info!(attempt, "Search succeeded on retry.");

				return RetryReport { outcome: Ok(SearchHits::from(hits)), calls: attempt };
			},
			Err(err) => last_error = err.to_string(),
		}
	}

	tracing::error!(
		attempts = policy.attempts + 1,
		error = %last_error,
		"Search provider unavailable; giving up."
	);

	RetryReport {
		outcome: Err(Error::RetryExhausted { attempts: policy.attempts + 1, message: last_error }),
		calls: policy.attempts,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn policy(attempts: u32) -> RetryPolicy {
		RetryPolicy {
			attempts,
			base_delay: Duration::from_millis(1_000),
			max_delay: Duration::from_millis(30_000),
		}
	}

	#[test]
	fn delay_doubles_per_attempt() {
		let policy = policy(5);

		assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(1_000));
		assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(2_000));
		assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(4_000));
	}

	#[test]
	fn delay_is_capped() {
		let policy = policy(10);

		assert_eq!(policy.delay_for_attempt(6), Duration::from_millis(30_000));
		assert_eq!(policy.delay_for_attempt(40), Duration::from_millis(30_000));
	}

	#[test]
	fn attempt_zero_is_treated_as_first() {
		assert_eq!(policy(1).delay_for_attempt(0), Duration::from_millis(1_000));
	}
}
