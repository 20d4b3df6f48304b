use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use serde::Serialize;
use tokio::time::{self, Duration};

use folio_cli::OutputFormat;
use folio_dispatch::{DispatchConfig, Dispatcher, Priority, SearchHit, StatsSnapshot};
use folio_providers::FallbackChain;

const DRAIN_POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Parser)]
#[command(
	version = folio_cli::VERSION,
	rename_all = "kebab",
	styles = folio_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[arg(long, short = 'p', value_name = "LEVEL", default_value = "medium")]
	pub priority: Priority,
	#[arg(long, short = 't', value_name = "TYPE", default_value = "title")]
	pub search_type: String,
	#[arg(long, value_name = "ID")]
	pub caller_id: Option<String>,
	#[arg(long, short = 'f', value_enum, default_value_t)]
	pub format: OutputFormat,
	#[arg(required = true, value_name = "QUERY")]
	pub queries: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ProbeReport {
	pub results: Vec<QueryReport>,
	pub stats: StatsSnapshot,
}

#[derive(Debug, Serialize)]
pub struct QueryReport {
	pub query: String,
	pub key: String,
	pub attached: bool,
	pub hits: Vec<SearchHit>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = folio_config::load(&args.config)?;

	folio_cli::init_tracing(&config.service.log_level);

	let provider = FallbackChain::from_config(&config.providers)?;

	tracing::info!(providers = provider.len(), "Search provider chain ready.");

	let dispatcher =
		Dispatcher::new(DispatchConfig::from_config(&config.dispatch), Arc::new(provider))?;

	dispatcher.start()?;

	let report = probe(
		&dispatcher,
		&args.queries,
		&args.search_type,
		args.priority,
		args.caller_id.as_deref(),
	)
	.await;

	println!("{}", args.format.render(&report)?);

	Ok(())
}

/// Submits every query at once, waits for all of them, then stops the dispatcher.
pub async fn probe(
	dispatcher: &Dispatcher,
	queries: &[String],
	search_type: &str,
	priority: Priority,
	caller_id: Option<&str>,
) -> ProbeReport {
	let handles: Vec<_> = queries
		.iter()
		.map(|query| {
			let handle = dispatcher.submit(
				query.as_str(),
				search_type,
				priority,
				caller_id.map(str::to_string),
			);

			(query.clone(), handle)
		})
		.collect();
	let mut results = Vec::with_capacity(handles.len());

	for (query, handle) in handles {
		let key = handle.key().short().to_string();
		let attached = handle.is_attached();
		let (hits, error) = match handle.wait().await {
			Ok(hits) => (hits.to_vec(), None),
			Err(err) => {
				tracing::error!(query = %query, error = %err, "Search failed.");

				(Vec::new(), Some(err.to_string()))
			},
		};

		results.push(QueryReport { query, key, attached, hits, error });
	}

	dispatcher.shutdown().await;

	while dispatcher.executing_batches() > 0 {
		time::sleep(DRAIN_POLL).await;
	}

	ProbeReport { results, stats: dispatcher.stats() }
}
