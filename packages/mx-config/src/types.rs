use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub matching: Matching,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub admin_bind: String,
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	/// Fixed embedding dimension for this deployment. Every stored vector
	/// must carry exactly this many components.
	pub vector_dim: u32,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Matching {
	/// Candidates scored per batch task.
	#[serde(default = "default_batch_size")]
	pub batch_size: u32,
	/// Deployment-time ceiling on concurrent batch tasks, independent of
	/// request concurrency.
	#[serde(default = "default_max_concurrency")]
	pub max_concurrency: u32,
	#[serde(default)]
	pub default_min_score: f32,
	#[serde(default = "default_max_results")]
	pub default_max_results: u32,
	/// Pool sizes above this threshold use the delegated nearest-neighbor
	/// backend instead of brute-force cosine.
	#[serde(default = "default_accelerated_pool_threshold")]
	pub accelerated_pool_threshold: u32,
	#[serde(default = "default_level_step_penalty")]
	pub level_step_penalty: f32,
	#[serde(default = "default_partial_region_credit")]
	pub partial_region_credit: f32,
	/// Running histories older than this are reconciled to failed.
	#[serde(default = "default_stale_run_timeout_secs")]
	pub stale_run_timeout_secs: u64,
	#[serde(default = "default_history_page_limit")]
	pub history_page_limit: u32,
	#[serde(default)]
	pub retry: Retry,
}

#[derive(Debug, Deserialize)]
pub struct Retry {
	pub max_attempts: u32,
	pub base_backoff_ms: u64,
	pub max_backoff_ms: u64,
}
impl Default for Retry {
	fn default() -> Self {
		Self { max_attempts: 3, base_backoff_ms: 200, max_backoff_ms: 5_000 }
	}
}

fn default_batch_size() -> u32 {
	25
}

fn default_max_concurrency() -> u32 {
	4
}

fn default_max_results() -> u32 {
	100
}

fn default_accelerated_pool_threshold() -> u32 {
	500
}

fn default_level_step_penalty() -> f32 {
	0.25
}

fn default_partial_region_credit() -> f32 {
	0.5
}

fn default_stale_run_timeout_secs() -> u64 {
	900
}

fn default_history_page_limit() -> u32 {
	20
}
