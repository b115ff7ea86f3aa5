use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Failed to read config at {path}: {source}")]
	ReadConfig { path: PathBuf, source: std::io::Error },
	#[error("Failed to parse config at {path}: {source}")]
	ParseConfig { path: PathBuf, source: toml::de::Error },
	#[error("Invalid config: {message}")]
	Validation { message: String },
}
