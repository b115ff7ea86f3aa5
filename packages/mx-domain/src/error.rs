use crate::status::MatchStatus;

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Error {
	#[error("Embedding dimension mismatch: expected {expected}, got {actual}.")]
	EmbeddingDimensionMismatch { expected: usize, actual: usize },
	#[error("Invalid weight configuration: {message}")]
	InvalidWeightConfiguration { message: String },
	#[error("Invalid status transition: {from} -> {to}.")]
	InvalidTransition { from: MatchStatus, to: MatchStatus },
}
