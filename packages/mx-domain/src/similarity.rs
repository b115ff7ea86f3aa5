use crate::{Error, Result, entity::Embedding};

/// Cosine similarity in [-1, 1]. A length mismatch is a data-integrity error
/// (corrupt or mixed embedding model versions) and must never be swallowed
/// as zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
	if a.len() != b.len() {
		return Err(Error::EmbeddingDimensionMismatch { expected: a.len(), actual: b.len() });
	}

	let mut dot = 0.0_f32;
	let mut norm_a = 0.0_f32;
	let mut norm_b = 0.0_f32;

	for (x, y) in a.iter().zip(b.iter()) {
		dot += x * y;
		norm_a += x * x;
		norm_b += y * y;
	}

	if norm_a == 0.0 || norm_b == 0.0 {
		return Ok(0.0);
	}

	Ok((dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0))
}

/// Rescales cosine from [-1, 1] to [0, 1] so the composite formula operates
/// on a uniform range across all terms.
pub fn rescale_unit(cosine: f32) -> f32 {
	((cosine + 1.0) / 2.0).clamp(0.0, 1.0)
}

/// Rescaled similarity of two optional embeddings. A missing embedding on
/// either side degrades deterministically to 0.0; only a dimension mismatch
/// between two present vectors is an error.
pub fn semantic_score(a: Option<&Embedding>, b: Option<&Embedding>) -> Result<f32> {
	let (Some(a), Some(b)) = (a, b) else {
		return Ok(0.0);
	};

	Ok(rescale_unit(cosine_similarity(&a.vec, &b.vec)?))
}
