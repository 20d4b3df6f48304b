use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::time::Duration;

/// Read-only copy of the dispatcher counters.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
	/// Requests resolved through a batch or by attaching at submission.
	pub total_requests: u64,
	pub batched_requests: u64,
	/// Requests answered at submission time by an in-flight or recently resolved key.
	pub attached_requests: u64,
	pub batches: u64,
	/// Requests resolved by a provider call made for another request.
	pub duplicates_avoided: u64,
	pub provider_calls: u64,
	pub calls_saved: u64,
	pub retried_requests: u64,
	pub retried_successes: u64,
	pub failed_requests: u64,
	pub average_batch_size: f64,
	pub average_processing_ms: f64,
	pub average_latency_ms: f64,
	pub error_rate: f64,
}

/// Per-batch tallies handed to the collector once the batch is fully resolved.
#[derive(Clone, Debug, Default)]
pub struct BatchOutcome {
	pub size: usize,
	pub processing: Duration,
	pub provider_calls: u64,
	pub duplicates_avoided: u64,
	pub retried_requests: u64,
	pub retried_successes: u64,
	pub failed_requests: u64,
	pub latency_total: Duration,
}
impl BatchOutcome {
	pub fn merge(&mut self, other: &Self) {
		self.provider_calls += other.provider_calls;
		self.duplicates_avoided += other.duplicates_avoided;
		self.retried_requests += other.retried_requests;
		self.retried_successes += other.retried_successes;
		self.failed_requests += other.failed_requests;
		self.latency_total += other.latency_total;
	}
}

#[derive(Clone, Default)]
pub struct StatsCollector {
	inner: Arc<Mutex<StatsSnapshot>>,
}
impl StatsCollector {
	pub fn record_batch(&self, outcome: &BatchOutcome) {
		let size = outcome.size as u64;
		let mut stats = self.lock();

		stats.batches += 1;
		stats.total_requests += size;
		stats.batched_requests += size;
		stats.provider_calls += outcome.provider_calls;
		stats.duplicates_avoided += outcome.duplicates_avoided;
		stats.retried_requests += outcome.retried_requests;
		stats.retried_successes += outcome.retried_successes;
		stats.failed_requests += outcome.failed_requests;
		stats.average_batch_size =
			running_mean(stats.average_batch_size, outcome.size as f64, stats.batches);
		stats.average_processing_ms =
			running_mean(stats.average_processing_ms, millis(outcome.processing), stats.batches);

		if size > 0 {
			let prior = stats.total_requests - size;
			let sum = stats.average_latency_ms * prior as f64 + millis(outcome.latency_total);

			stats.average_latency_ms = sum / stats.total_requests as f64;
		}

		refresh_derived(&mut stats);
	}

	pub fn record_attached(&self, latency: Duration, failed: bool) {
		let mut stats = self.lock();

		stats.total_requests += 1;
		stats.attached_requests += 1;
		stats.duplicates_avoided += 1;

		if failed {
			stats.failed_requests += 1;
		}

		stats.average_latency_ms =
			running_mean(stats.average_latency_ms, millis(latency), stats.total_requests);

		refresh_derived(&mut stats);
	}

	pub fn snapshot(&self) -> StatsSnapshot {
		self.lock().clone()
	}

	fn lock(&self) -> MutexGuard<'_, StatsSnapshot> {
		self.inner.lock().unwrap_or_else(|err| err.into_inner())
	}
}

fn refresh_derived(stats: &mut StatsSnapshot) {
	stats.calls_saved = stats.total_requests.saturating_sub(stats.provider_calls);
	stats.error_rate = if stats.total_requests == 0 {
		0.0
	} else {
		stats.failed_requests as f64 / stats.total_requests as f64
	};
}

fn running_mean(mean: f64, value: f64, count: u64) -> f64 {
	if count == 0 {
		return 0.0;
	}

	mean + (value - mean) / count as f64
}

fn millis(duration: Duration) -> f64 {
	duration.as_secs_f64() * 1_000.0
}

#[cfg(test)]
mod tests {
	use super::*;

	fn batch(size: usize, processing_ms: u64, failed: u64) -> BatchOutcome {
		BatchOutcome {
			size,
			processing: Duration::from_millis(processing_ms),
			provider_calls: size as u64,
			failed_requests: failed,
			latency_total: Duration::from_millis(processing_ms * size as u64),
			..Default::default()
		}
	}

	#[test]
	fn averages_are_true_means() {
		let stats = StatsCollector::default();

		stats.record_batch(&batch(10, 100, 0));
		stats.record_batch(&batch(10, 300, 0));
		stats.record_batch(&batch(4, 200, 0));

		let snapshot = stats.snapshot();

		assert_eq!(snapshot.batches, 3);
		assert_eq!(snapshot.total_requests, 24);
		assert_eq!(snapshot.batched_requests, 24);
		assert!((snapshot.average_batch_size - 8.0).abs() < 1e-9);
		assert!((snapshot.average_processing_ms - 200.0).abs() < 1e-9);
	}

	#[test]
	fn error_rate_is_failures_over_requests() {
		let stats = StatsCollector::default();

		stats.record_batch(&batch(8, 10, 2));
		stats.record_batch(&batch(2, 10, 0));

		let snapshot = stats.snapshot();

		assert_eq!(snapshot.failed_requests, 2);
		assert!((snapshot.error_rate - 0.2).abs() < 1e-9);
	}

	#[test]
	fn attached_requests_count_as_saved_calls() {
		let stats = StatsCollector::default();

		stats.record_batch(&BatchOutcome {
			size: 3,
			provider_calls: 1,
			duplicates_avoided: 2,
			..Default::default()
		});
		stats.record_attached(Duration::from_millis(5), false);

		let snapshot = stats.snapshot();

		assert_eq!(snapshot.total_requests, 4);
		assert_eq!(snapshot.attached_requests, 1);
		assert_eq!(snapshot.duplicates_avoided, 3);
		assert_eq!(snapshot.calls_saved, 3);
		assert_eq!(snapshot.error_rate, 0.0);
	}

	#[test]
	fn empty_collector_reports_zeroes() {
		assert_eq!(StatsCollector::default().snapshot(), StatsSnapshot::default());
	}
}
