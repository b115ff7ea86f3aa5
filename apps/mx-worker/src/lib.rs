pub mod worker;

mod error;

pub use error::{Error, Result};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use mx_service::{MatchService, Stores};
use mx_storage::db::Db;

#[derive(Debug, Parser)]
#[command(version, rename_all = "kebab")]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: std::path::PathBuf,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = mx_config::load(&args.config)?;
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
	tracing_subscriber::fmt().with_env_filter(filter).init();

	let db = Db::connect(&config.storage.postgres).await?;
	db.ensure_schema(config.storage.vector_dim).await?;
	let stores = Stores::postgres(&db);
	let service = MatchService::new(config, stores);

	worker::run_worker(worker::WorkerState { service }).await
}
