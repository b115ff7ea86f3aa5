mod error;
mod types;

pub use error::{Error, Result};
pub use types::{Config, Matching, Postgres, Retry, Service, Storage};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.service.admin_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.admin_bind must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.storage.vector_dim == 0 {
		return Err(Error::Validation {
			message: "storage.vector_dim must be greater than zero.".to_string(),
		});
	}
	if cfg.matching.batch_size == 0 {
		return Err(Error::Validation {
			message: "matching.batch_size must be greater than zero.".to_string(),
		});
	}
	if cfg.matching.max_concurrency == 0 {
		return Err(Error::Validation {
			message: "matching.max_concurrency must be greater than zero.".to_string(),
		});
	}
	if cfg.matching.default_max_results == 0 {
		return Err(Error::Validation {
			message: "matching.default_max_results must be greater than zero.".to_string(),
		});
	}
	if !cfg.matching.default_min_score.is_finite()
		|| !(0.0..=1.0).contains(&cfg.matching.default_min_score)
	{
		return Err(Error::Validation {
			message: "matching.default_min_score must be in the range 0.0-1.0.".to_string(),
		});
	}
	if !cfg.matching.level_step_penalty.is_finite()
		|| !(0.0..=1.0).contains(&cfg.matching.level_step_penalty)
	{
		return Err(Error::Validation {
			message: "matching.level_step_penalty must be in the range 0.0-1.0.".to_string(),
		});
	}
	if !cfg.matching.partial_region_credit.is_finite()
		|| !(0.0..=1.0).contains(&cfg.matching.partial_region_credit)
	{
		return Err(Error::Validation {
			message: "matching.partial_region_credit must be in the range 0.0-1.0.".to_string(),
		});
	}
	if cfg.matching.stale_run_timeout_secs == 0 {
		return Err(Error::Validation {
			message: "matching.stale_run_timeout_secs must be greater than zero.".to_string(),
		});
	}
	if cfg.matching.history_page_limit == 0 {
		return Err(Error::Validation {
			message: "matching.history_page_limit must be greater than zero.".to_string(),
		});
	}
	if cfg.matching.retry.max_attempts == 0 {
		return Err(Error::Validation {
			message: "matching.retry.max_attempts must be greater than zero.".to_string(),
		});
	}
	if cfg.matching.retry.base_backoff_ms == 0 {
		return Err(Error::Validation {
			message: "matching.retry.base_backoff_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.matching.retry.max_backoff_ms < cfg.matching.retry.base_backoff_ms {
		return Err(Error::Validation {
			message: "matching.retry.max_backoff_ms must not be less than base_backoff_ms."
				.to_string(),
		});
	}

	Ok(())
}
