use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	#[serde(default)]
	pub dispatch: Dispatch,
	/// Ordered lookup backends. The first non-empty success wins.
	pub providers: Vec<SearchProviderConfig>,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	#[serde(default = "default_log_level")]
	pub log_level: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Dispatch {
	pub tick_interval_ms: u64,
	pub max_batch_size: usize,
	pub max_concurrent_batches: usize,
	/// Additional attempts after the first failed call.
	pub retry_attempts: u32,
	pub retry_delay_ms: u64,
	pub retry_max_delay_ms: u64,
	/// How long a resolved key keeps absorbing duplicate submissions.
	pub active_ttl_ms: u64,
}
impl Default for Dispatch {
	fn default() -> Self {
		Self {
			tick_interval_ms: 100,
			max_batch_size: 10,
			max_concurrent_batches: 3,
			retry_attempts: 2,
			retry_delay_ms: 1_000,
			retry_max_delay_ms: 30_000,
			active_ttl_ms: 30_000,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct SearchProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	#[serde(default = "default_search_path")]
	pub path: String,
	#[serde(default)]
	pub api_key: Option<String>,
	#[serde(default = "default_timeout_ms")]
	pub timeout_ms: u64,
	#[serde(default = "default_max_results")]
	pub max_results: u32,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_search_path() -> String {
	"/search.json".to_string()
}

fn default_timeout_ms() -> u64 {
	5_000
}

fn default_max_results() -> u32 {
	20
}
