use std::sync::{
	Arc, Mutex, MutexGuard,
	atomic::{AtomicBool, AtomicUsize, Ordering},
};

use tokio::{
	runtime::Handle,
	sync::{Notify, oneshot},
	task::JoinHandle,
	time::{self, Instant, MissedTickBehavior},
};

use crate::{
	Error, Result, SearchHits,
	config::DispatchConfig,
	executor::{Batch, BatchTicket, Executor},
	normalize::{self, DedupKey},
	queue::{PriorityQueues, QueueDepths},
	request::{Priority, SearchRequest},
	stats::{StatsCollector, StatsSnapshot},
	tracker::{ActiveRequests, Attachment},
};
use folio_providers::SearchProvider;

/// Coalescing front door for search providers.
///
/// Requests are queued per priority, formed into batches by a recurring tick, deduplicated by
/// normalized key and fanned back out to every caller. Must be created inside a Tokio runtime.
pub struct Dispatcher {
	shared: Arc<Shared>,
	ticker: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
	cfg: DispatchConfig,
	runtime: Handle,
	executor: Executor,
	queues: Mutex<PriorityQueues>,
	tracker: ActiveRequests,
	stats: StatsCollector,
	executing: Arc<AtomicUsize>,
	stopped: AtomicBool,
	wake: Notify,
	stop: Notify,
}

/// Caller side of one submission.
pub struct SearchHandle {
	key: DedupKey,
	attached: bool,
	state: HandleState,
}

enum HandleState {
	Pending(oneshot::Receiver<Result<SearchHits>>),
	Rejected(Error),
}

/// Holds one of the `max_concurrent_batches` execution slots until dropped.
struct ExecutionSlot {
	counter: Arc<AtomicUsize>,
}

impl Dispatcher {
	pub fn new(cfg: DispatchConfig, provider: Arc<dyn SearchProvider>) -> Result<Self> {
		cfg.validate()?;

		let runtime = Handle::try_current().map_err(|_| Error::InvalidConfig {
			message: "Dispatcher must be created inside a Tokio runtime.".to_string(),
		})?;
		let tracker = ActiveRequests::new(runtime.clone());
		let stats = StatsCollector::default();
		let executor = Executor::new(
			provider,
			tracker.clone(),
			stats.clone(),
			cfg.retry_policy(),
			cfg.active_ttl,
		);
		let shared = Shared {
			cfg,
			runtime,
			executor,
			queues: Mutex::new(PriorityQueues::default()),
			tracker,
			stats,
			executing: Arc::new(AtomicUsize::new(0)),
			stopped: AtomicBool::new(false),
			wake: Notify::new(),
			stop: Notify::new(),
		};

		Ok(Self { shared: Arc::new(shared), ticker: Mutex::new(None) })
	}

	/// Spawns the recurring scheduling tick. Calling it again is a no-op.
	pub fn start(&self) -> Result<()> {
		if self.is_stopped() {
			return Err(Error::DispatcherStopped);
		}

		let mut ticker = lock(&self.ticker);

		if ticker.is_some() {
			return Ok(());
		}

		*ticker = Some(self.shared.runtime.spawn(run_ticker(self.shared.clone())));

		tracing::info!(
			tick_ms = self.shared.cfg.tick_interval.as_millis() as u64,
			max_batch_size = self.shared.cfg.max_batch_size,
			max_concurrent_batches = self.shared.cfg.max_concurrent_batches,
			"Search dispatcher started."
		);

		Ok(())
	}

	pub fn submit(
		&self,
		query: impl Into<String>,
		search_type: impl Into<String>,
		priority: Priority,
		caller_id: Option<String>,
	) -> SearchHandle {
		let query = query.into();
		let search_type = search_type.into();
		let key = normalize::dedup_key(&query, &search_type);

		if self.is_stopped() {
			return SearchHandle::rejected(key, Error::DispatcherStopped);
		}
		if let Some(attachment) = self.shared.tracker.try_attach(&key) {
			return self.attach(key, attachment, caller_id);
		}

		let (request, rx) = SearchRequest::new(query, search_type, priority, caller_id);

		{
			let mut queues = lock(&self.shared.queues);

			// Checked again under the queue lock so shutdown cannot miss this request.
			if self.is_stopped() {
				drop(queues);
				request.resolve(Err(Error::DispatcherStopped));

				return SearchHandle { key, attached: false, state: HandleState::Pending(rx) };
			}

			queues.enqueue(request);
		}

		tracing::trace!(key = key.short(), priority = priority.as_str(), "Search request queued.");

		if priority == Priority::High {
			self.shared.wake.notify_one();
		}

		SearchHandle { key, attached: false, state: HandleState::Pending(rx) }
	}

	/// Runs one scheduling pass now. The ticker calls the same logic on every tick.
	pub fn schedule_pass(&self) -> Option<BatchTicket> {
		self.shared.schedule_pass()
	}

	pub fn stats(&self) -> StatsSnapshot {
		self.shared.stats.snapshot()
	}

	pub fn queue_depths(&self) -> QueueDepths {
		lock(&self.shared.queues).sizes()
	}

	pub fn executing_batches(&self) -> usize {
		self.shared.executing.load(Ordering::SeqCst)
	}

	pub fn active_keys(&self) -> usize {
		self.shared.tracker.len()
	}

	pub fn config(&self) -> &DispatchConfig {
		&self.shared.cfg
	}

	pub fn is_stopped(&self) -> bool {
		self.shared.stopped.load(Ordering::SeqCst)
	}

	/// Stops the tick and rejects queued and future submissions. Batches already executing run
	/// to completion on their own tasks.
	pub async fn shutdown(&self) {
		let drained = {
			let mut queues = lock(&self.shared.queues);

			self.shared.stopped.store(true, Ordering::SeqCst);

			queues.drain_all()
		};

		self.shared.stop.notify_one();

		let ticker = lock(&self.ticker).take();

		if let Some(ticker) = ticker
			&& let Err(err) = ticker.await
			&& !err.is_cancelled()
		{
			tracing::error!(error = %err, "Dispatcher ticker failed.");
		}

		let rejected = drained.len();

		for request in drained {
			request.resolve(Err(Error::DispatcherStopped));
		}

		tracing::info!(
			rejected,
			executing = self.executing_batches(),
			"Search dispatcher stopped."
		);
	}

	fn attach(
		&self,
		key: DedupKey,
		attachment: Attachment,
		caller_id: Option<String>,
	) -> SearchHandle {
		let (tx, rx) = oneshot::channel();
		let stats = self.shared.stats.clone();
		let submitted_at = Instant::now();

		tracing::debug!(
			key = key.short(),
			caller_id = caller_id.as_deref().unwrap_or("-"),
			"Attaching to in-flight search."
		);

		self.shared.runtime.spawn(async move {
			let outcome = attachment.wait().await;

			stats.record_attached(submitted_at.elapsed(), outcome.is_err());

			let _ = tx.send(outcome);
		});

		SearchHandle { key, attached: true, state: HandleState::Pending(rx) }
	}
}
impl Drop for Dispatcher {
	fn drop(&mut self) {
		let ticker = self.ticker.get_mut().unwrap_or_else(|err| err.into_inner());

		if let Some(ticker) = ticker.take() {
			ticker.abort();
		}
	}
}

impl Shared {
	fn schedule_pass(&self) -> Option<BatchTicket> {
		let Some(slot) = ExecutionSlot::acquire(&self.executing, self.cfg.max_concurrent_batches)
		else {
			tracing::trace!("All batch slots busy; skipping scheduling pass.");

			return None;
		};
		let (priority, requests) = lock(&self.queues).dequeue_up_to(self.cfg.max_batch_size)?;
		let batch = Batch::new(priority, requests);
		let ticket = batch.ticket();
		let executor = self.executor.clone();

		tracing::debug!(
			batch_id = %ticket.id,
			priority = priority.as_str(),
			size = ticket.size,
			"Search batch formed."
		);

		self.runtime.spawn(async move {
			let _slot = slot;

			executor.execute(batch).await;
		});

		Some(ticket)
	}
}

impl SearchHandle {
	fn rejected(key: DedupKey, err: Error) -> Self {
		Self { key, attached: false, state: HandleState::Rejected(err) }
	}

	pub fn key(&self) -> &DedupKey {
		&self.key
	}

	/// True when the submission joined an in-flight or recently resolved search.
	pub fn is_attached(&self) -> bool {
		self.attached
	}

	pub async fn wait(self) -> Result<SearchHits> {
		match self.state {
			HandleState::Pending(rx) => rx.await.unwrap_or(Err(Error::Abandoned)),
			HandleState::Rejected(err) => Err(err),
		}
	}
}

impl ExecutionSlot {
	fn acquire(counter: &Arc<AtomicUsize>, max: usize) -> Option<Self> {
		counter
			.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
				(current < max).then_some(current + 1)
			})
			.ok()
			.map(|_| Self { counter: counter.clone() })
	}
}
impl Drop for ExecutionSlot {
	fn drop(&mut self) {
		self.counter.fetch_sub(1, Ordering::SeqCst);
	}
}

async fn run_ticker(shared: Arc<Shared>) {
	let mut interval = time::interval(shared.cfg.tick_interval);

	interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

	loop {
		tokio::select! {
			_ = shared.stop.notified() => break,
			_ = interval.tick() => {},
			_ = shared.wake.notified() => {
				tracing::trace!("High-priority submission triggered a scheduling pass.");
			},
		}

		if shared.stopped.load(Ordering::SeqCst) {
			break;
		}

		shared.schedule_pass();
	}

	tracing::debug!("Dispatcher ticker exited.");
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(|err| err.into_inner())
}
