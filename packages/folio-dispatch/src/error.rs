pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
	/// A single provider call failed. Never handed to callers directly.
	#[error("Provider error: {message}")]
	ProviderFailure { message: String },
	/// Every configured attempt failed. `attempts` counts the initial call.
	#[error("Search provider unavailable after {attempts} attempts: {message}")]
	RetryExhausted { attempts: u32, message: String },
	#[error("Dispatcher stopped.")]
	DispatcherStopped,
	#[error("Search request was dropped before it resolved.")]
	Abandoned,
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Invalid dispatcher config: {message}")]
	InvalidConfig { message: String },
}
impl Error {
	/// True when the search could not be answered, as opposed to answering with no results.
	pub fn is_unavailable(&self) -> bool {
		matches!(self, Self::RetryExhausted { .. } | Self::ProviderFailure { .. })
	}
}

impl From<folio_providers::Error> for Error {
	fn from(err: folio_providers::Error) -> Self {
		Self::ProviderFailure { message: err.to_string() }
	}
}
