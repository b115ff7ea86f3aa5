use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = mx_api::Args::parse();
	mx_api::run(args).await
}
