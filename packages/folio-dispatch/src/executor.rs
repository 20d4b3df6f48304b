use std::{collections::HashMap, sync::Arc};

use serde::Serialize;
use tokio::{
	task::JoinSet,
	time::{Duration, Instant},
};
use uuid::Uuid;

use crate::{
	Result, SearchHits,
	normalize::DedupKey,
	request::{Priority, SearchRequest},
	retry::{self, RetryPolicy},
	stats::{BatchOutcome, StatsCollector},
	tracker::{ActiveRequests, Handoff, Slot},
};
use folio_providers::SearchProvider;

/// A scheduler-formed unit of work drawn from a single priority lane.
#[derive(Debug)]
pub struct Batch {
	id: Uuid,
	priority: Priority,
	requests: Vec<SearchRequest>,
}
impl Batch {
	pub fn new(priority: Priority, requests: Vec<SearchRequest>) -> Self {
		Self { id: Uuid::new_v4(), priority, requests }
	}

	pub fn ticket(&self) -> BatchTicket {
		BatchTicket { id: self.id, priority: self.priority, size: self.requests.len() }
	}
}

/// Summary of a batch handed to the executor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct BatchTicket {
	pub id: Uuid,
	pub priority: Priority,
	pub size: usize,
}

/// Batch members sharing one deduplication key.
#[derive(Debug)]
pub struct DedupGroup {
	key: DedupKey,
	members: Vec<SearchRequest>,
}
impl DedupGroup {
	pub fn key(&self) -> &DedupKey {
		&self.key
	}

	pub fn len(&self) -> usize {
		self.members.len()
	}

	pub fn is_empty(&self) -> bool {
		self.members.is_empty()
	}

	/// The first member's original text is what gets sent to the provider.
	fn leader_query(&self) -> (String, String) {
		let first = &self.members[0];

		(first.query().to_string(), first.search_type().to_string())
	}
}

/// Splits requests by search type, then by key, keeping first-seen order at both levels.
pub fn group_requests(requests: Vec<SearchRequest>) -> Vec<DedupGroup> {
	let mut by_type: Vec<Vec<DedupGroup>> = Vec::new();
	let mut type_index: HashMap<String, usize> = HashMap::new();
	let mut key_index: HashMap<DedupKey, (usize, usize)> = HashMap::new();

	for request in requests {
		if let Some(&(type_slot, group_slot)) = key_index.get(request.key()) {
			by_type[type_slot][group_slot].members.push(request);

			continue;
		}

		let type_slot = match type_index.get(request.canonical_type()) {
			Some(&slot) => slot,
			None => {
				by_type.push(Vec::new());
				type_index.insert(request.canonical_type().to_string(), by_type.len() - 1);

				by_type.len() - 1
			},
		};
		let groups = &mut by_type[type_slot];

		key_index.insert(request.key().clone(), (type_slot, groups.len()));
		groups.push(DedupGroup { key: request.key().clone(), members: vec![request] });
	}

	by_type.into_iter().flatten().collect()
}

#[derive(Clone)]
pub struct Executor {
	provider: Arc<dyn SearchProvider>,
	tracker: ActiveRequests,
	stats: StatsCollector,
	retry: RetryPolicy,
	active_ttl: Duration,
}
impl Executor {
	pub fn new(
		provider: Arc<dyn SearchProvider>,
		tracker: ActiveRequests,
		stats: StatsCollector,
		retry: RetryPolicy,
		active_ttl: Duration,
	) -> Self {
		Self { provider, tracker, stats, retry, active_ttl }
	}

	/// Resolves every member of `batch`, retries included, then records statistics.
	pub async fn execute(&self, batch: Batch) -> BatchOutcome {
		let started = Instant::now();
		let Batch { id, priority, requests } = batch;
		let size = requests.len();
		let groups = group_requests(requests);

		tracing::debug!(
			batch_id = %id,
			priority = priority.as_str(),
			size,
			groups = groups.len(),
			"Executing search batch."
		);

		let mut tasks = JoinSet::new();

		for group in groups {
			let executor = self.clone();

			tasks.spawn(async move { executor.run_group(group).await });
		}

		let mut outcome = BatchOutcome { size, ..Default::default() };

		while let Some(joined) = tasks.join_next().await {
			match joined {
				Ok(group_outcome) => outcome.merge(&group_outcome),
				Err(err) => {
					tracing::error!(batch_id = %id, error = %err, "Search group task failed.");
				},
			}
		}

		outcome.processing = started.elapsed();

		self.stats.record_batch(&outcome);

		tracing::debug!(
			batch_id = %id,
			provider_calls = outcome.provider_calls,
			failed = outcome.failed_requests,
			elapsed_ms = outcome.processing.as_millis() as u64,
			"Search batch finished."
		);

		outcome
	}

	async fn run_group(self, group: DedupGroup) -> BatchOutcome {
		match self.tracker.attach_or_begin(&group.key) {
			Slot::Attached(attachment) => {
				tracing::debug!(
					key = group.key.short(),
					members = group.len(),
					"Key already in flight; attaching group."
				);

				let outcome = attachment.wait().await;
				let failed = outcome.is_err();
				let mut report = fan_out(group.members, outcome);

				report.duplicates_avoided = report.size as u64;

				if failed {
					report.failed_requests = report.size as u64;
				}

				report
			},
			Slot::Leader(lease) => {
				let (query, search_type) = group.leader_query();

				match self.provider.search(&query, &search_type).await {
					Ok(hits) => {
						let hits = SearchHits::from(hits);

						lease.resolve(hits.clone(), self.active_ttl);

						let mut report = fan_out(group.members, Ok(hits));

						report.provider_calls = 1;
						report.duplicates_avoided = report.size.saturating_sub(1) as u64;

						report
					},
					Err(err) => {
						tracing::warn!(
							key = lease.key().short(),
							members = group.len(),
							error = %err,
							"Search provider call failed; retrying members individually."
						);

						let handoff = lease.fail();
						let mut report =
							self.retry_members(group.members, err.to_string(), handoff).await;

						report.provider_calls += 1;

						report
					},
				}
			},
		}
	}

	async fn retry_members(
		&self,
		members: Vec<SearchRequest>,
		initial_error: String,
		handoff: Handoff,
	) -> BatchOutcome {
		let mut report = BatchOutcome { size: members.len(), ..Default::default() };
		let mut handoff = Some(handoff);
		let mut retries = JoinSet::new();

		for member in members {
			let provider = self.provider.clone();
			let policy = self.retry;
			let initial_error = initial_error.clone();
			let handoff = handoff.take();

			retries.spawn(async move {
				let retry = retry::retry_request(
					provider,
					policy,
					member.query(),
					member.search_type(),
					initial_error,
				)
				.await;

				if let Some(handoff) = handoff {
					handoff.publish(retry.outcome.clone());
				}

				let succeeded = retry.outcome.is_ok();
				let latency = member.resolve(retry.outcome);

				(succeeded, retry.calls, latency)
			});
		}

		while let Some(joined) = retries.join_next().await {
			match joined {
				Ok((succeeded, calls, latency)) => {
					report.retried_requests += 1;
					report.provider_calls += u64::from(calls);
					report.latency_total += latency;

					if succeeded {
						report.retried_successes += 1;
					} else {
						report.failed_requests += 1;
					}
				},
				Err(err) => {
					tracing::error!(error = %err, "Search retry task failed.");
				},
			}
		}

		report
	}
}

fn fan_out(members: Vec<SearchRequest>, outcome: Result<SearchHits>) -> BatchOutcome {
	let mut report = BatchOutcome { size: members.len(), ..Default::default() };

	for member in members {
		report.latency_total += member.resolve(outcome.clone());
	}

	report
}
