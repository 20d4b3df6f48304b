use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = folio_probe::Args::parse();

	folio_probe::run(args).await
}
