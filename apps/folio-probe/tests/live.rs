use std::sync::Arc;

use serde_json::Map;

use folio_config::SearchProviderConfig;
use folio_dispatch::{DispatchConfig, Dispatcher, Priority};
use folio_providers::{FallbackChain, HttpSearchProvider, SearchProvider};

#[tokio::test]
#[ignore = "Requires a live search backend. Set FOLIO_SEARCH_URL to run."]
async fn probe_against_live_backend() {
	let Some(api_base) = folio_testkit::env_search_url() else {
		eprintln!("Skipping probe_against_live_backend; set FOLIO_SEARCH_URL to run this test.");

		return;
	};
	let cfg = SearchProviderConfig {
		provider_id: "live".to_string(),
		api_base,
		path: "/search.json".to_string(),
		api_key: None,
		timeout_ms: 10_000,
		max_results: 5,
		default_headers: Map::new(),
	};
	let http: Arc<dyn SearchProvider> =
		Arc::new(HttpSearchProvider::new(cfg).expect("Failed to build HTTP provider."));
	let chain = FallbackChain::new(vec![http]).expect("Failed to build provider chain.");
	let dispatcher = Dispatcher::new(DispatchConfig::default(), Arc::new(chain))
		.expect("Dispatcher should build.");

	dispatcher.start().expect("Dispatcher should start.");

	let queries = vec!["the hobbit".to_string(), "The Hobbit".to_string()];
	let report = folio_probe::probe(&dispatcher, &queries, "title", Priority::High, None).await;

	assert_eq!(report.results.len(), 2);
	assert_eq!(report.results[0].key, report.results[1].key);
	assert!(report.stats.provider_calls <= 1 + u64::from(DispatchConfig::default().retry_attempts));
}
