mod error;
mod types;

pub use error::{Error, Result};
pub use types::{Config, Dispatch, SearchProviderConfig, Service};

use std::{collections::HashSet, fs, path::Path};

const MAX_RETRY_ATTEMPTS: u32 = 10;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}

	validate_dispatch(&cfg.dispatch)?;

	if cfg.providers.is_empty() {
		return Err(Error::Validation {
			message: "At least one [[providers]] entry is required.".to_string(),
		});
	}

	let mut seen = HashSet::new();

	for provider in &cfg.providers {
		if provider.provider_id.trim().is_empty() {
			return Err(Error::Validation {
				message: "providers.provider_id must be non-empty.".to_string(),
			});
		}
		if !seen.insert(provider.provider_id.as_str()) {
			return Err(Error::Validation {
				message: format!(
					"providers.provider_id {} is declared more than once.",
					provider.provider_id
				),
			});
		}
		if provider.api_base.trim().is_empty() {
			return Err(Error::Validation {
				message: format!(
					"Provider {} api_base must be non-empty.",
					provider.provider_id
				),
			});
		}
		if provider.timeout_ms == 0 {
			return Err(Error::Validation {
				message: format!(
					"Provider {} timeout_ms must be greater than zero.",
					provider.provider_id
				),
			});
		}
		if provider.max_results == 0 {
			return Err(Error::Validation {
				message: format!(
					"Provider {} max_results must be greater than zero.",
					provider.provider_id
				),
			});
		}
	}

	Ok(())
}

fn validate_dispatch(dispatch: &Dispatch) -> Result<()> {
	if dispatch.tick_interval_ms == 0 {
		return Err(Error::Validation {
			message: "dispatch.tick_interval_ms must be greater than zero.".to_string(),
		});
	}
	if dispatch.max_batch_size == 0 {
		return Err(Error::Validation {
			message: "dispatch.max_batch_size must be greater than zero.".to_string(),
		});
	}
	if dispatch.max_concurrent_batches == 0 {
		return Err(Error::Validation {
			message: "dispatch.max_concurrent_batches must be greater than zero.".to_string(),
		});
	}
	if dispatch.retry_attempts > MAX_RETRY_ATTEMPTS {
		return Err(Error::Validation {
			message: format!("dispatch.retry_attempts must be {MAX_RETRY_ATTEMPTS} or less."),
		});
	}
	if dispatch.retry_delay_ms > dispatch.retry_max_delay_ms {
		return Err(Error::Validation {
			message: "dispatch.retry_delay_ms must not exceed dispatch.retry_max_delay_ms."
				.to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	for provider in &mut cfg.providers {
		provider.provider_id = provider.provider_id.trim().to_string();

		if provider.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
			provider.api_key = None;
		}
	}
}
