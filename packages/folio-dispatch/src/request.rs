use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use tokio::{
	sync::oneshot,
	time::{Duration, Instant},
};

use crate::{
	Error, Result, SearchHits,
	normalize::{self, DedupKey},
};

pub(crate) type Completion = oneshot::Sender<Result<SearchHits>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
	High,
	Medium,
	Low,
}
impl Priority {
	/// Scan order used by the scheduler.
	pub const ALL: [Self; 3] = [Self::High, Self::Medium, Self::Low];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::High => "high",
			Self::Medium => "medium",
			Self::Low => "low",
		}
	}
}
impl fmt::Display for Priority {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for Priority {
	type Err = Error;

	fn from_str(raw: &str) -> Result<Self> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"high" => Ok(Self::High),
			"medium" => Ok(Self::Medium),
			"low" => Ok(Self::Low),
			other => Err(Error::InvalidRequest {
				message: format!("Unknown priority {other:?}; expected high, medium, or low."),
			}),
		}
	}
}

/// One caller's pending search. Owned by the dispatcher until resolved.
pub struct SearchRequest {
	key: DedupKey,
	query: String,
	search_type: String,
	canonical_type: String,
	priority: Priority,
	caller_id: Option<String>,
	submitted_at: Instant,
	completion: Completion,
}
impl SearchRequest {
	pub(crate) fn new(
		query: String,
		search_type: String,
		priority: Priority,
		caller_id: Option<String>,
	) -> (Self, oneshot::Receiver<Result<SearchHits>>) {
		let (tx, rx) = oneshot::channel();
		let request = Self {
			key: normalize::dedup_key(&query, &search_type),
			canonical_type: normalize::canonical_search_type(&search_type),
			query,
			search_type,
			priority,
			caller_id,
			submitted_at: Instant::now(),
			completion: tx,
		};

		(request, rx)
	}

	pub fn key(&self) -> &DedupKey {
		&self.key
	}

	pub fn query(&self) -> &str {
		&self.query
	}

	pub fn search_type(&self) -> &str {
		&self.search_type
	}

	pub(crate) fn canonical_type(&self) -> &str {
		&self.canonical_type
	}

	pub fn priority(&self) -> Priority {
		self.priority
	}

	pub fn caller_id(&self) -> Option<&str> {
		self.caller_id.as_deref()
	}

	/// Writes the single outcome and returns the time spent since submission.
	pub(crate) fn resolve(self, outcome: Result<SearchHits>) -> Duration {
		if self.completion.send(outcome).is_err() {
			tracing::debug!(
				key = self.key.short(),
				caller_id = self.caller_id.as_deref().unwrap_or("-"),
				"Caller dropped its handle before the search resolved."
			);
		}

		self.submitted_at.elapsed()
	}
}
impl fmt::Debug for SearchRequest {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SearchRequest")
			.field("key", &self.key.short())
			.field("query", &self.query)
			.field("search_type", &self.search_type)
			.field("priority", &self.priority)
			.field("caller_id", &self.caller_id)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn priority_parses_case_insensitively() {
		assert_eq!("HIGH".parse::<Priority>().expect("parse failed"), Priority::High);
		assert_eq!(" low ".parse::<Priority>().expect("parse failed"), Priority::Low);
		assert!("urgent".parse::<Priority>().is_err());
	}

	#[test]
	fn priority_orders_high_first() {
		let mut levels = vec![Priority::Low, Priority::High, Priority::Medium];

		levels.sort();

		assert_eq!(levels, Priority::ALL.to_vec());
	}

	#[tokio::test]
	async fn resolve_writes_exactly_once() {
		let (request, rx) =
			SearchRequest::new("Emma".to_string(), "title".to_string(), Priority::Low, None);

		assert_eq!(request.query(), "Emma");
		assert_eq!(request.canonical_type(), "title");

		request.resolve(Err(Error::DispatcherStopped));

		let outcome = rx.await.expect("Completion must be written.");

		assert_eq!(outcome, Err(Error::DispatcherStopped));
	}
}
