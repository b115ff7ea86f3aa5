use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = mx_worker::Args::parse();
	mx_worker::run(args).await
}
