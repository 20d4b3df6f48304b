// std
use std::time::Duration as StdDuration;

// crates.io
use reqwest::Client;
use serde_json::Value;

use crate::{BoxFuture, Error, Result, SearchHit, SearchProvider};
use folio_config::SearchProviderConfig;

const RESULT_ARRAY_FIELDS: [&str; 3] = ["docs", "items", "results"];

/// Generic JSON-over-HTTP lookup backend.
pub struct HttpSearchProvider {
	cfg: SearchProviderConfig,
	client: Client,
}
impl HttpSearchProvider {
	pub fn new(cfg: SearchProviderConfig) -> Result<Self> {
		let client = Client::builder().timeout(StdDuration::from_millis(cfg.timeout_ms)).build()?;

		Ok(Self { cfg, client })
	}

	pub async fn search_once(&self, query: &str, search_type: &str) -> Result<Vec<SearchHit>> {
		let url = format!("{}{}", self.cfg.api_base, self.cfg.path);
		let limit = self.cfg.max_results.to_string();
		let res = self
			.client
			.get(url)
			.headers(crate::auth_headers(self.cfg.api_key.as_deref(), &self.cfg.default_headers)?)
			.query(&[("q", query), ("type", search_type), ("limit", limit.as_str())])
			.send()
			.await?;
		let json: Value = res.error_for_status()?.json().await?;
		let mut hits = parse_search_response(&self.cfg.provider_id, json)?;

		hits.truncate(self.cfg.max_results as usize);

		Ok(hits)
	}
}
impl SearchProvider for HttpSearchProvider {
	fn provider_id(&self) -> &str {
		&self.cfg.provider_id
	}

	fn search<'a>(
		&'a self,
		query: &'a str,
		search_type: &'a str,
	) -> BoxFuture<'a, Result<Vec<SearchHit>>> {
		Box::pin(self.search_once(query, search_type))
	}
}

fn parse_search_response(provider_id: &str, json: Value) -> Result<Vec<SearchHit>> {
	let items = if let Some(items) = json.as_array() {
		items
	} else {
		RESULT_ARRAY_FIELDS
			.iter()
			.find_map(|field| json.get(field).and_then(|v| v.as_array()))
			.ok_or_else(|| Error::InvalidResponse {
				message: format!("Search response from {provider_id} is missing a results array."),
			})?
	};
	let mut hits = Vec::with_capacity(items.len());

	for (index, item) in items.iter().enumerate() {
		let volume = item.get("volumeInfo");
		let Some(title) = item
			.get("title")
			.or_else(|| volume.and_then(|v| v.get("title")))
			.and_then(|v| v.as_str())
			.map(str::trim)
			.filter(|title| !title.is_empty())
		else {
			continue;
		};
		let id = item
			.get("key")
			.or_else(|| item.get("id"))
			.and_then(scalar_to_string)
			.unwrap_or_else(|| format!("{provider_id}:{index}"));
		let authors = item
			.get("author_name")
			.or_else(|| item.get("authors"))
			.or_else(|| volume.and_then(|v| v.get("authors")))
			.map(parse_authors)
			.unwrap_or_default();
		let year = item
			.get("first_publish_year")
			.or_else(|| item.get("year"))
			.and_then(|v| v.as_i64())
			.and_then(|v| i32::try_from(v).ok())
			.or_else(|| {
				volume
					.and_then(|v| v.get("publishedDate"))
					.and_then(|v| v.as_str())
					.and_then(parse_year_prefix)
			});

		hits.push(SearchHit {
			provider_id: provider_id.to_string(),
			id,
			title: title.to_string(),
			authors,
			year,
		});
	}

	Ok(hits)
}

fn scalar_to_string(value: &Value) -> Option<String> {
	match value {
		Value::String(raw) if !raw.trim().is_empty() => Some(raw.trim().to_string()),
		Value::Number(number) => Some(number.to_string()),
		_ => None,
	}
}

fn parse_authors(value: &Value) -> Vec<String> {
	let Some(entries) = value.as_array() else {
		return value.as_str().map(|name| vec![name.to_string()]).unwrap_or_default();
	};

	entries
		.iter()
		.filter_map(|entry| {
			entry.as_str().or_else(|| entry.get("name").and_then(|name| name.as_str()))
		})
		.map(|name| name.trim().to_string())
		.filter(|name| !name.is_empty())
		.collect()
}

fn parse_year_prefix(raw: &str) -> Option<i32> {
	raw.get(..4).and_then(|prefix| prefix.parse().ok())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_open_library_docs() {
		let json = serde_json::json!({
			"numFound": 2,
			"docs": [
				{
					"key": "/works/OL27448W",
					"title": "The Lord of the Rings",
					"author_name": ["J.R.R. Tolkien"],
					"first_publish_year": 1954
				},
				{ "key": "/works/OL1W", "title": "  " }
			]
		});
		let hits = parse_search_response("openlibrary", json).expect("parse failed");

		assert_eq!(hits.len(), 1);
		assert_eq!(hits[0].id, "/works/OL27448W");
		assert_eq!(hits[0].authors, vec!["J.R.R. Tolkien".to_string()]);
		assert_eq!(hits[0].year, Some(1954));
	}

	#[test]
	fn parses_volume_info_items() {
		let json = serde_json::json!({
			"items": [
				{
					"id": "zyTCAlFPjgYC",
					"volumeInfo": {
						"title": "The Google Story",
						"authors": ["David A. Vise", "Mark Malseed"],
						"publishedDate": "2005-11-15"
					}
				}
			]
		});
		let hits = parse_search_response("books", json).expect("parse failed");

		assert_eq!(hits.len(), 1);
		assert_eq!(hits[0].title, "The Google Story");
		assert_eq!(hits[0].authors.len(), 2);
		assert_eq!(hits[0].year, Some(2005));
	}

	#[test]
	fn falls_back_to_positional_ids_and_author_objects() {
		let json = serde_json::json!([
			{ "title": "Dune", "authors": [{ "name": "Frank Herbert" }], "year": 1965 }
		]);
		let hits = parse_search_response("catalog", json).expect("parse failed");

		assert_eq!(hits[0].id, "catalog:0");
		assert_eq!(hits[0].authors, vec!["Frank Herbert".to_string()]);
	}

	#[test]
	fn rejects_responses_without_results() {
		let json = serde_json::json!({ "error": "quota" });

		assert!(parse_search_response("catalog", json).is_err());
	}
}
