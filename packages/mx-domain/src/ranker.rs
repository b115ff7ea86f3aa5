use std::{cmp::Ordering, collections::BTreeMap};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
	scorer::StructuredScores,
	weights::{Dimension, Weights},
};

/// Engine-level blend constants. The split is fixed and deliberately not
/// tenant- or request-tunable.
pub const STRUCTURED_BLEND_WEIGHT: f32 = 0.7;
pub const SEMANTIC_BLEND_WEIGHT: f32 = 0.3;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
	High,
	Medium,
	Low,
}
impl QualityTier {
	pub fn from_composite(composite: f32) -> Self {
		if composite >= 0.8 {
			Self::High
		} else if composite >= 0.6 {
			Self::Medium
		} else {
			Self::Low
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::High => "high",
			Self::Medium => "medium",
			Self::Low => "low",
		}
	}

	pub fn parse(value: &str) -> Option<Self> {
		match value {
			"high" => Some(Self::High),
			"medium" => Some(Self::Medium),
			"low" => Some(Self::Low),
			_ => None,
		}
	}
}

/// One candidate after structured and semantic scoring, before ranking.
#[derive(Clone, Debug)]
pub struct ScoredCandidate {
	pub candidate_id: Uuid,
	pub structured: StructuredScores,
	pub semantic_score: f32,
	/// Required skills the candidate covers, kept as explanation payload.
	pub overlapping_skills: Vec<String>,
}

/// One ranked source/candidate pair, not yet persisted.
#[derive(Clone, Debug)]
pub struct RankedMatch {
	pub candidate_id: Uuid,
	pub per_dimension: BTreeMap<Dimension, f32>,
	pub structured_score: f32,
	pub semantic_score: f32,
	pub composite_score: f32,
	pub tier: QualityTier,
	pub overlapping_skills: Vec<String>,
}

pub fn structured_composite(per_dimension: &BTreeMap<Dimension, f32>, weights: &Weights) -> f32 {
	let mut composite = 0.0_f32;

	for (dimension, weight) in weights.iter() {
		let score = per_dimension.get(&dimension).copied().unwrap_or(0.0);

		composite += weight * score;
	}

	composite.clamp(0.0, 1.0)
}

pub fn composite(structured: f32, semantic: f32) -> f32 {
	(STRUCTURED_BLEND_WEIGHT * structured + SEMANTIC_BLEND_WEIGHT * semantic).clamp(0.0, 1.0)
}

/// Filters, orders, and truncates scored candidates. Ordering is
/// deterministic regardless of scoring arrival order: composite descending,
/// then semantic descending, then candidate id ascending. Truncation to
/// `max_results` happens only after the full filter and sort.
pub fn rank(
	scored: Vec<ScoredCandidate>,
	weights: &Weights,
	min_score: f32,
	max_results: usize,
) -> Vec<RankedMatch> {
	let mut ranked = Vec::with_capacity(scored.len());

	for candidate in scored {
		if !candidate.structured.passes_filters {
			continue;
		}

		let structured_score = structured_composite(&candidate.structured.per_dimension, weights);
		let composite_score = composite(structured_score, candidate.semantic_score);

		if composite_score < min_score {
			continue;
		}

		ranked.push(RankedMatch {
			candidate_id: candidate.candidate_id,
			per_dimension: candidate.structured.per_dimension,
			structured_score,
			semantic_score: candidate.semantic_score,
			composite_score,
			tier: QualityTier::from_composite(composite_score),
			overlapping_skills: candidate.overlapping_skills,
		});
	}

	ranked.sort_by(|left, right| {
		cmp_f32_desc(left.composite_score, right.composite_score)
			.then_with(|| cmp_f32_desc(left.semantic_score, right.semantic_score))
			.then_with(|| left.candidate_id.cmp(&right.candidate_id))
	});
	ranked.truncate(max_results);

	ranked
}

pub fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::scorer::StructuredScores;

	fn scored(candidate_id: Uuid, skills: f32, semantic: f32) -> ScoredCandidate {
		ScoredCandidate {
			candidate_id,
			structured: StructuredScores {
				per_dimension: [(Dimension::Skills, skills)].into_iter().collect(),
				passes_filters: true,
			},
			semantic_score: semantic,
			overlapping_skills: Vec::new(),
		}
	}

	fn skills_only() -> Weights {
		Weights::resolve(&[("skills".to_string(), 1.0)].into_iter().collect())
			.expect("expected valid weights")
	}

	#[test]
	fn composite_blend_and_tier_match_the_fixed_split() {
		let score = composite(0.9, 0.5);

		assert!((score - 0.78).abs() < 1e-6);
		assert_eq!(QualityTier::from_composite(score), QualityTier::Medium);
		assert_eq!(QualityTier::from_composite(0.8), QualityTier::High);
		assert_eq!(QualityTier::from_composite(0.59), QualityTier::Low);
	}

	#[test]
	fn ties_break_on_semantic_then_candidate_id() {
		let low_id = Uuid::from_u128(1);
		let high_id = Uuid::from_u128(2);
		// Equal composites: structured 1.0/semantic 0.0 vs structured ~0.571/semantic 1.0.
		let a = scored(high_id, 1.0, 0.0);
		let b = scored(low_id, 4.0 / 7.0, 1.0);
		let ranked = rank(vec![a, b], &skills_only(), 0.0, 10);

		assert_eq!(ranked.len(), 2);
		assert_eq!(ranked[0].candidate_id, low_id);

		let a = scored(high_id, 0.5, 0.5);
		let b = scored(low_id, 0.5, 0.5);
		let ranked = rank(vec![a, b], &skills_only(), 0.0, 10);

		assert_eq!(ranked[0].candidate_id, low_id);
	}

	#[test]
	fn truncation_happens_after_filtering_and_sorting() {
		let mut pool = Vec::new();

		for index in 0..10_u128 {
			pool.push(scored(Uuid::from_u128(index), index as f32 / 10.0, 0.0));
		}

		let ranked = rank(pool, &skills_only(), 0.3, 2);

		assert_eq!(ranked.len(), 2);
		assert_eq!(ranked[0].candidate_id, Uuid::from_u128(9));
		assert_eq!(ranked[1].candidate_id, Uuid::from_u128(8));
	}

	#[test]
	fn filtered_candidates_never_enter_the_output() {
		let mut filtered = scored(Uuid::from_u128(7), 1.0, 1.0);

		filtered.structured = StructuredScores::filtered_out();

		let ranked = rank(vec![filtered], &skills_only(), 0.0, 10);

		assert!(ranked.is_empty());
	}

	#[test]
	fn structured_composite_stays_in_unit_range() {
		let weights = Weights::uniform();
		let all_ones: BTreeMap<Dimension, f32> =
			Dimension::ALL.iter().map(|dim| (*dim, 1.0)).collect();

		assert!((structured_composite(&all_ones, &weights) - 1.0).abs() < 1e-6);
		assert_eq!(structured_composite(&BTreeMap::new(), &weights), 0.0);
	}
}
