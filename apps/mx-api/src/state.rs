use mx_service::{MatchService, Stores};
use mx_storage::db::Db;

#[derive(Clone)]
pub struct AppState {
	pub service: MatchService,
}
impl AppState {
	pub async fn new(config: mx_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema(config.storage.vector_dim).await?;

		let stores = Stores::postgres(&db);

		Ok(Self { service: MatchService::new(config, stores) })
	}
}
