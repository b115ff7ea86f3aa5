use mx_domain::MatchStatus;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Invalid weight configuration: {message}")]
	InvalidWeightConfiguration { message: String },
	#[error("Invalid status transition: {from} -> {to}.")]
	InvalidTransition { from: MatchStatus, to: MatchStatus },
	#[error("Embedding dimension mismatch: expected {expected}, got {actual}.")]
	EmbeddingDimensionMismatch { expected: usize, actual: usize },
	#[error("Backend unavailable: {message}")]
	BackendUnavailable { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl Error {
	/// Only connectivity-class failures are retried; everything else is a
	/// deterministic outcome and retrying would just repeat it.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::BackendUnavailable { .. })
	}
}

impl From<mx_domain::Error> for Error {
	fn from(err: mx_domain::Error) -> Self {
		match err {
			mx_domain::Error::EmbeddingDimensionMismatch { expected, actual } =>
				Self::EmbeddingDimensionMismatch { expected, actual },
			mx_domain::Error::InvalidWeightConfiguration { message } =>
				Self::InvalidWeightConfiguration { message },
			mx_domain::Error::InvalidTransition { from, to } => Self::InvalidTransition { from, to },
		}
	}
}

impl From<sqlx::Error> for Error {
	fn from(err: sqlx::Error) -> Self {
		match err {
			sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed =>
				Self::BackendUnavailable { message: err.to_string() },
			other => Self::Storage { message: other.to_string() },
		}
	}
}

impl From<mx_storage::Error> for Error {
	fn from(err: mx_storage::Error) -> Self {
		match err {
			mx_storage::Error::Sqlx(inner) => inner.into(),
			mx_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			mx_storage::Error::NotFound(message) => Self::NotFound { message },
		}
	}
}
