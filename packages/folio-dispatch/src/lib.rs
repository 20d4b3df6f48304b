//! Request coalescing in front of a book-search provider.
//!
//! Callers submit searches with a priority. A recurring tick drains the highest non-empty
//! priority lane into a batch, identical searches inside and across batches share one provider
//! call, and failures are retried per request with exponential backoff.

pub mod config;
pub mod dispatcher;
pub mod executor;
pub mod normalize;
pub mod queue;
pub mod request;
pub mod retry;
pub mod stats;
pub mod tracker;

mod error;

pub use config::DispatchConfig;
pub use dispatcher::{Dispatcher, SearchHandle};
pub use error::{Error, Result};
pub use executor::BatchTicket;
pub use normalize::DedupKey;
pub use queue::QueueDepths;
pub use request::Priority;
pub use stats::StatsSnapshot;

pub use folio_providers::{SearchHit, SearchProvider};

use std::sync::Arc;

/// Result list shared by every caller a provider call answered.
pub type SearchHits = Arc<[SearchHit]>;
