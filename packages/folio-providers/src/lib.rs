pub mod chain;
pub mod http;

mod error;

pub use chain::FallbackChain;
pub use error::{Error, Result};
pub use http::HttpSearchProvider;

use std::{future::Future, pin::Pin};

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One book record returned by a lookup backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
	pub provider_id: String,
	pub id: String,
	pub title: String,
	#[serde(default)]
	pub authors: Vec<String>,
	#[serde(default)]
	pub year: Option<i32>,
}

/// Abstract search contract the dispatcher calls into.
///
/// An `Ok` with an empty list means "no results"; any `Err` means the backend could not answer.
pub trait SearchProvider
where
	Self: Send + Sync,
{
	fn provider_id(&self) -> &str;

	fn search<'a>(
		&'a self,
		query: &'a str,
		search_type: &'a str,
	) -> BoxFuture<'a, Result<Vec<SearchHit>>>;
}

pub fn auth_headers(api_key: Option<&str>, default_headers: &Map<String, Value>) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	if let Some(api_key) = api_key {
		headers.insert(AUTHORIZATION, format!("Bearer {api_key}").parse()?);
	}

	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(Error::InvalidConfig {
				message: "Default header values must be strings.".to_string(),
			});
		};

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}

	Ok(headers)
}
