//! In-flight deduplication keyed by [`DedupKey`].
//!
//! An entry is a `watch` channel that starts empty and receives the outcome of the single
//! provider call for its key. Late duplicates subscribe to the channel instead of issuing a
//! second call. Successful entries linger for the configured TTL; failed ones are removed as soon
//! as the call fails so the next submission can try again.

use std::{
	collections::HashMap,
	sync::{Arc, Mutex, MutexGuard},
};

use tokio::{runtime::Handle, sync::watch, time::Duration};

use crate::{Error, Result, SearchHits, normalize::DedupKey};

type Outcome = Option<Result<SearchHits>>;

#[derive(Clone)]
pub struct ActiveRequests {
	inner: Arc<Mutex<TrackerState>>,
	runtime: Handle,
}

#[derive(Default)]
struct TrackerState {
	entries: HashMap<DedupKey, ActiveEntry>,
	next_generation: u64,
}

struct ActiveEntry {
	generation: u64,
	sender: watch::Sender<Outcome>,
}

/// What a caller gets back from [`ActiveRequests::attach_or_begin`].
pub enum Slot {
	Attached(Attachment),
	Leader(Lease),
}

/// A subscription to another request's outcome.
pub struct Attachment {
	rx: watch::Receiver<Outcome>,
}
impl Attachment {
	pub fn is_ready(&self) -> bool {
		self.rx.borrow().is_some()
	}

	pub async fn wait(mut self) -> Result<SearchHits> {
		match self.rx.wait_for(Option::is_some).await {
			Ok(outcome) => outcome.clone().unwrap_or(Err(Error::Abandoned)),
			Err(_) => Err(Error::Abandoned),
		}
	}
}

/// Exclusive right to perform the provider call for one key.
///
/// Dropping a lease without settling it removes the entry, which wakes attached callers with
/// [`Error::Abandoned`].
pub struct Lease {
	key: DedupKey,
	generation: u64,
	tracker: ActiveRequests,
	settled: bool,
}
impl Lease {
	pub fn key(&self) -> &DedupKey {
		&self.key
	}

	/// Publishes a successful result and keeps the entry alive for `ttl`.
	pub fn resolve(mut self, hits: SearchHits, ttl: Duration) {
		self.settled = true;

		{
			let state = self.tracker.lock();

			if let Some(entry) = state.entries.get(&self.key)
				&& entry.generation == self.generation
			{
				entry.sender.send_replace(Some(Ok(hits)));
			}
		}

		self.tracker.schedule_cleanup(self.key.clone(), self.generation, ttl);
	}

	/// Removes the entry without publishing. Callers already attached keep waiting on the
	/// returned handoff.
	pub fn fail(mut self) -> Handoff {
		self.settled = true;

		Handoff { sender: self.tracker.remove(&self.key, self.generation) }
	}
}
impl Drop for Lease {
	fn drop(&mut self) {
		if !self.settled {
			self.tracker.remove(&self.key, self.generation);
		}
	}
}

/// The outcome channel of a failed entry, detached from the tracker.
pub struct Handoff {
	sender: Option<watch::Sender<Outcome>>,
}
impl Handoff {
	pub fn waiters(&self) -> usize {
		self.sender.as_ref().map(watch::Sender::receiver_count).unwrap_or(0)
	}

	pub fn publish(self, outcome: Result<SearchHits>) {
		if let Some(sender) = self.sender {
			sender.send_replace(Some(outcome));
		}
	}
}

impl ActiveRequests {
	pub fn new(runtime: Handle) -> Self {
		Self { inner: Arc::new(Mutex::new(TrackerState::default())), runtime }
	}

	pub fn try_attach(&self, key: &DedupKey) -> Option<Attachment> {
		let state = self.lock();

		state.entries.get(key).map(|entry| Attachment { rx: entry.sender.subscribe() })
	}

	/// Starts tracking `key`, or returns `None` when an entry already exists.
	pub fn begin_tracking(&self, key: &DedupKey) -> Option<Lease> {
		let mut state = self.lock();

		if state.entries.contains_key(key) {
			return None;
		}

		Some(self.insert_locked(&mut state, key))
	}

	/// Attaches to the live entry for `key` or becomes its leader, under one lock.
	pub fn attach_or_begin(&self, key: &DedupKey) -> Slot {
		let mut state = self.lock();

		if let Some(entry) = state.entries.get(key) {
			return Slot::Attached(Attachment { rx: entry.sender.subscribe() });
		}

		Slot::Leader(self.insert_locked(&mut state, key))
	}

	/// Removes the entry after `delay` unless it has been replaced in the meantime.
	pub fn schedule_cleanup(&self, key: DedupKey, generation: u64, delay: Duration) {
		if delay.is_zero() {
			self.remove(&key, generation);

			return;
		}

		let tracker = self.clone();

		self.runtime.spawn(async move {
			tokio::time::sleep(delay).await;

			if tracker.remove(&key, generation).is_some() {
				tracing::trace!(key = key.short(), "Active entry expired.");
			}
		});
	}

	pub fn contains(&self, key: &DedupKey) -> bool {
		self.lock().entries.contains_key(key)
	}

	pub fn len(&self) -> usize {
		self.lock().entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn insert_locked(&self, state: &mut TrackerState, key: &DedupKey) -> Lease {
		let generation = state.next_generation;
		let (sender, _) = watch::channel(None);

		state.next_generation += 1;
		state.entries.insert(key.clone(), ActiveEntry { generation, sender });

		Lease { key: key.clone(), generation, tracker: self.clone(), settled: false }
	}

	fn remove(&self, key: &DedupKey, generation: u64) -> Option<watch::Sender<Outcome>> {
		let mut state = self.lock();

		match state.entries.get(key) {
			Some(entry) if entry.generation == generation => {
				state.entries.remove(key).map(|entry| entry.sender)
			},
			_ => None,
		}
	}

	fn lock(&self) -> MutexGuard<'_, TrackerState> {
		self.inner.lock().unwrap_or_else(|err| err.into_inner())
	}
}
