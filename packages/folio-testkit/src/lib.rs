//! Deterministic search providers for dispatcher tests.

use std::{
	collections::VecDeque,
	env,
	sync::{Mutex, MutexGuard},
	time::Duration,
};

use tokio::{sync::Semaphore, time};

use folio_providers::{BoxFuture, Error, Result, SearchHit, SearchProvider};

pub const PROVIDER_ID: &str = "scripted";

/// What the next provider call does.
#[derive(Clone, Debug)]
pub enum Step {
	/// Answer with one hit titled after the query.
	Echo,
	Hits(Vec<SearchHit>),
	Fail(String),
}

/// Provider that replays a script of steps, then falls back to a default step.
///
/// Every call is recorded before the configured latency elapses, so tests can observe calls that
/// are still in flight. A gated provider additionally holds each call until [`Self::release`].
pub struct ScriptedProvider {
	id: String,
	latency: Duration,
	gate: Option<Semaphore>,
	fallback: Step,
	script: Mutex<VecDeque<Step>>,
	calls: Mutex<Vec<Call>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call {
	pub query: String,
	pub search_type: String,
}

impl ScriptedProvider {
	pub fn new() -> Self {
		Self::named(PROVIDER_ID)
	}

	pub fn named(id: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			latency: Duration::ZERO,
			gate: None,
			fallback: Step::Echo,
			script: Mutex::new(VecDeque::new()),
			calls: Mutex::new(Vec::new()),
		}
	}

	pub fn with_latency(mut self, latency: Duration) -> Self {
		self.latency = latency;

		self
	}

	pub fn gated(mut self) -> Self {
		self.gate = Some(Semaphore::new(0));

		self
	}

	/// Lets `calls` held calls proceed. No-op for ungated providers.
	pub fn release(&self, calls: usize) {
		if let Some(gate) = &self.gate {
			gate.add_permits(calls);
		}
	}

	/// The next `count` calls fail before the default step takes over.
	pub fn fail_first(self, count: usize) -> Self {
		for idx in 0..count {
			self.push(Step::Fail(format!("scripted failure {}", idx + 1)));
		}

		self
	}

	pub fn always_fail(mut self) -> Self {
		self.fallback = Step::Fail("scripted outage".to_string());

		self
	}

	pub fn always_empty(mut self) -> Self {
		self.fallback = Step::Hits(Vec::new());

		self
	}

	pub fn then(self, step: Step) -> Self {
		self.push(step);

		self
	}

	pub fn calls(&self) -> usize {
		lock(&self.calls).len()
	}

	pub fn calls_for(&self, query: &str) -> usize {
		lock(&self.calls).iter().filter(|call| call.query == query).count()
	}

	pub fn call_log(&self) -> Vec<Call> {
		lock(&self.calls).clone()
	}

	fn push(&self, step: Step) {
		lock(&self.script).push_back(step);
	}

	fn next_step(&self) -> Step {
		lock(&self.script).pop_front().unwrap_or_else(|| self.fallback.clone())
	}
}
impl Default for ScriptedProvider {
	fn default() -> Self {
		Self::new()
	}
}
impl SearchProvider for ScriptedProvider {
	fn provider_id(&self) -> &str {
		&self.id
	}

	fn search<'a>(
		&'a self,
		query: &'a str,
		search_type: &'a str,
	) -> BoxFuture<'a, Result<Vec<SearchHit>>> {
		lock(&self.calls)
			.push(Call { query: query.to_string(), search_type: search_type.to_string() });

		let step = self.next_step();

		Box::pin(async move {
			if let Some(gate) = &self.gate
				&& let Ok(permit) = gate.acquire().await
			{
				permit.forget();
			}
			if !self.latency.is_zero() {
				time::sleep(self.latency).await;
			}

			match step {
				Step::Echo => Ok(vec![hit(&self.id, query)]),
				Step::Hits(hits) => Ok(hits),
				Step::Fail(message) =>
					Err(Error::Unavailable { provider_id: self.id.clone(), message }),
			}
		})
	}
}

pub fn hit(provider_id: &str, title: &str) -> SearchHit {
	SearchHit {
		provider_id: provider_id.to_string(),
		id: format!("{provider_id}:{}", title.to_lowercase().replace(' ', "-")),
		title: title.to_string(),
		authors: Vec::new(),
		year: None,
	}
}

pub fn hits(provider_id: &str, titles: &[&str]) -> Vec<SearchHit> {
	titles.iter().map(|title| hit(provider_id, title)).collect()
}

/// Base URL of a live search backend for opt-in integration tests.
pub fn env_search_url() -> Option<String> {
	env::var("FOLIO_SEARCH_URL").ok()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(|err| err.into_inner())
}
