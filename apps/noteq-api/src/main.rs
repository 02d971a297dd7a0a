// crates.io
use clap::Parser;
// self
use noteq_api::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = Args::parse();
	noteq_api::run(args).await
}
