use std::sync::Arc;

use crate::{BoxFuture, Error, HttpSearchProvider, Result, SearchHit, SearchProvider};
use folio_config::SearchProviderConfig;

const CHAIN_PROVIDER_ID: &str = "fallback_chain";

/// Ordered list of backends consulted until one returns a non-empty result.
#[derive(Clone)]
pub struct FallbackChain {
	providers: Vec<Arc<dyn SearchProvider>>,
}
impl FallbackChain {
	pub fn new(providers: Vec<Arc<dyn SearchProvider>>) -> Result<Self> {
		if providers.is_empty() {
			return Err(Error::InvalidConfig {
				message: "A fallback chain needs at least one provider.".to_string(),
			});
		}

		Ok(Self { providers })
	}

	pub fn from_config(configs: &[SearchProviderConfig]) -> Result<Self> {
		let mut providers: Vec<Arc<dyn SearchProvider>> = Vec::with_capacity(configs.len());

		for cfg in configs {
			providers.push(Arc::new(HttpSearchProvider::new(cfg.clone())?));
		}

		Self::new(providers)
	}

	pub fn len(&self) -> usize {
		self.providers.len()
	}

	pub fn is_empty(&self) -> bool {
		self.providers.is_empty()
	}

	async fn search_in_order(&self, query: &str, search_type: &str) -> Result<Vec<SearchHit>> {
		let mut last_err = None;

		for provider in &self.providers {
			match provider.search(query, search_type).await {
				Ok(hits) if !hits.is_empty() => return Ok(hits),
				Ok(_) => {
					tracing::debug!(
						provider_id = provider.provider_id(),
						"Search provider returned no results; trying next provider."
					);
				},
				Err(err) => {
					tracing::warn!(
						provider_id = provider.provider_id(),
						error = %err,
						"Search provider failed; trying next provider."
					);

					last_err = Some(err);
				},
			}
		}

		match last_err {
			Some(err) => Err(err),
			None => Ok(Vec::new()),
		}
	}
}
impl SearchProvider for FallbackChain {
	fn provider_id(&self) -> &str {
		CHAIN_PROVIDER_ID
	}

	fn search<'a>(
		&'a self,
		query: &'a str,
		search_type: &'a str,
	) -> BoxFuture<'a, Result<Vec<SearchHit>>> {
		Box::pin(self.search_in_order(query, search_type))
	}
}
