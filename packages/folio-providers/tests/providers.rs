use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};

use reqwest::header::AUTHORIZATION;
use serde_json::Map;

use folio_providers::{BoxFuture, Error, FallbackChain, Result, SearchHit, SearchProvider};

enum Reply {
	Hits(usize),
	Fail(&'static str),
}

struct StubProvider {
	id: &'static str,
	reply: Reply,
	calls: Arc<AtomicUsize>,
}
impl StubProvider {
	fn new(id: &'static str, reply: Reply) -> Self {
		Self { id, reply, calls: Arc::new(AtomicUsize::new(0)) }
	}
}
impl SearchProvider for StubProvider {
	fn provider_id(&self) -> &str {
		self.id
	}

	fn search<'a>(
		&'a self,
		query: &'a str,
		_search_type: &'a str,
	) -> BoxFuture<'a, Result<Vec<SearchHit>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let outcome = match self.reply {
			Reply::Hits(count) => Ok((0..count)
				.map(|idx| SearchHit {
					provider_id: self.id.to_string(),
					id: format!("{}-{idx}", self.id),
					title: format!("{query} {idx}"),
					authors: Vec::new(),
					year: None,
				})
				.collect()),
			Reply::Fail(message) => Err(Error::Unavailable {
				provider_id: self.id.to_string(),
				message: message.to_string(),
			}),
		};

		Box::pin(async move { outcome })
	}
}

#[test]
fn builds_bearer_auth_header() {
	let headers = folio_providers::auth_headers(Some("secret"), &Map::new())
		.expect("Failed to build headers.");
	let value = headers.get(AUTHORIZATION).expect("Missing authorization header.");

	assert_eq!(value, "Bearer secret");
}

#[test]
fn omits_auth_header_without_key() {
	let mut defaults = Map::new();

	defaults.insert("x-client".to_string(), serde_json::json!("folio"));

	let headers =
		folio_providers::auth_headers(None, &defaults).expect("Failed to build headers.");

	assert!(headers.get(AUTHORIZATION).is_none());
	assert_eq!(headers.get("x-client").expect("Missing default header."), "folio");
}

#[test]
fn rejects_non_string_default_headers() {
	let mut defaults = Map::new();

	defaults.insert("x-retries".to_string(), serde_json::json!(3));

	assert!(folio_providers::auth_headers(None, &defaults).is_err());
}

#[test]
fn empty_chain_is_rejected() {
	assert!(FallbackChain::new(Vec::new()).is_err());
}

#[tokio::test]
async fn chain_returns_first_non_empty_success() {
	let empty = Arc::new(StubProvider::new("empty", Reply::Hits(0)));
	let primary = Arc::new(StubProvider::new("primary", Reply::Hits(2)));
	let unused = Arc::new(StubProvider::new("unused", Reply::Hits(5)));
	let providers: Vec<Arc<dyn SearchProvider>> = vec![empty.clone(), primary, unused.clone()];
	let chain = FallbackChain::new(providers).expect("Failed to build chain.");
	let hits = chain.search("dune", "title").await.expect("Chain should succeed.");

	assert_eq!(hits.len(), 2);
	assert_eq!(hits[0].provider_id, "primary");
	assert_eq!(empty.calls.load(Ordering::SeqCst), 1);
	assert_eq!(unused.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn chain_skips_failures() {
	let broken = Arc::new(StubProvider::new("broken", Reply::Fail("timeout")));
	let backup = Arc::new(StubProvider::new("backup", Reply::Hits(1)));
	let providers: Vec<Arc<dyn SearchProvider>> = vec![broken, backup];
	let chain = FallbackChain::new(providers).expect("Failed to build chain.");
	let hits = chain.search("emma", "title").await.expect("Chain should succeed.");

	assert_eq!(hits[0].provider_id, "backup");
}

#[tokio::test]
async fn chain_fails_with_most_recent_error() {
	let first = Arc::new(StubProvider::new("first", Reply::Fail("first down")));
	let second = Arc::new(StubProvider::new("second", Reply::Fail("second down")));
	let providers: Vec<Arc<dyn SearchProvider>> = vec![first, second];
	let chain = FallbackChain::new(providers).expect("Failed to build chain.");
	let err = chain.search("emma", "title").await.expect_err("Chain should fail.");

	assert!(err.to_string().contains("second down"), "Unexpected error: {err}");
}

#[tokio::test]
async fn chain_of_empty_successes_is_empty() {
	let a = Arc::new(StubProvider::new("a", Reply::Hits(0)));
	let b = Arc::new(StubProvider::new("b", Reply::Hits(0)));
	let providers: Vec<Arc<dyn SearchProvider>> = vec![a, b];
	let chain = FallbackChain::new(providers).expect("Failed to build chain.");
	let hits = chain.search("nothing", "title").await.expect("Chain should succeed.");

	assert!(hits.is_empty());
}
