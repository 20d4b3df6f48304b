use clap::{
	ValueEnum,
	builder::{
		Styles,
		styling::{AnsiColor, Effects},
	},
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

pub const VERSION: &str = concat!(
	env!("CARGO_PKG_VERSION"),
	"-",
	env!("VERGEN_GIT_SHA"),
	"-",
	env!("VERGEN_CARGO_TARGET_TRIPLE"),
);

const FALLBACK_LOG_LEVEL: &str = "info";

/// How binaries print reports on stdout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
	/// One JSON document per line.
	Json,
	#[default]
	Pretty,
}
impl OutputFormat {
	pub fn render<T>(self, value: &T) -> serde_json::Result<String>
	where
		T: ?Sized + Serialize,
	{
		match self {
			Self::Json => serde_json::to_string(value),
			Self::Pretty => serde_json::to_string_pretty(value),
		}
	}
}

pub fn styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Yellow.on_default() | Effects::BOLD)
		.usage(AnsiColor::Yellow.on_default() | Effects::BOLD)
		.literal(AnsiColor::Cyan.on_default() | Effects::BOLD)
		.placeholder(AnsiColor::Green.on_default())
}

/// Installs the global subscriber on stderr so stdout stays machine-readable.
pub fn init_tracing(log_level: &str) {
	let filter =
		EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new(FALLBACK_LOG_LEVEL));

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}
