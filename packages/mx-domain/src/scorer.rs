use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{
	entity::{Entity, Proficiency, normalize_skill},
	weights::{Dimension, Weights},
};

/// Hard filters short-circuit before any dimension scoring; a filtered
/// candidate never enters the ranked output and is not charged scoring cost
/// beyond the filter check.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct HardFilters {
	pub proficiency_in: Option<Vec<Proficiency>>,
	pub regions: Option<Vec<String>>,
	#[serde(default)]
	pub require_embedding: bool,
}
impl HardFilters {
	pub fn passes(&self, candidate: &Entity) -> bool {
		if let Some(allowed) = &self.proficiency_in {
			match candidate.proficiency {
				Some(level) if allowed.contains(&level) => {},
				_ => return false,
			}
		}
		if let Some(regions) = &self.regions {
			match &candidate.location {
				Some(location) if regions.iter().any(|region| *region == location.region) => {},
				_ => return false,
			}
		}
		if self.require_embedding && candidate.embedding.is_none() {
			return false;
		}

		true
	}
}

#[derive(Clone, Copy, Debug)]
pub struct ScoringPolicy {
	pub level_step_penalty: f32,
	pub partial_region_credit: f32,
}
impl Default for ScoringPolicy {
	fn default() -> Self {
		Self { level_step_penalty: 0.25, partial_region_credit: 0.5 }
	}
}

#[derive(Clone, Debug)]
pub struct StructuredScores {
	pub per_dimension: BTreeMap<Dimension, f32>,
	pub passes_filters: bool,
}
impl StructuredScores {
	pub fn filtered_out() -> Self {
		Self { per_dimension: BTreeMap::new(), passes_filters: false }
	}
}

/// Scores the dimensions configured in `weights` for one oriented pair.
/// Missing attributes on either side score 0 for that dimension, never an
/// error.
pub fn score_structured(
	source: &Entity,
	candidate: &Entity,
	weights: &Weights,
	filters: &HardFilters,
	policy: &ScoringPolicy,
) -> StructuredScores {
	if !filters.passes(candidate) {
		return StructuredScores::filtered_out();
	}

	let mut per_dimension = BTreeMap::new();

	for (dimension, _) in weights.iter() {
		let score = match dimension {
			Dimension::Skills => skill_coverage(&source.skills, &candidate.skills),
			Dimension::Experience =>
				experience_fit(source.experience_years, candidate.experience_years),
			Dimension::Proficiency =>
				proficiency_fit(source.proficiency, candidate.proficiency, policy),
			Dimension::Location => location_fit(source, candidate, policy),
			Dimension::DomainTags => skill_coverage(&source.domain_tags, &candidate.domain_tags),
		};

		per_dimension.insert(dimension, score.clamp(0.0, 1.0));
	}

	StructuredScores { per_dimension, passes_filters: true }
}

/// Asymmetric coverage: how much of what is required is offered. An empty
/// required set is vacuously satisfied.
pub fn skill_coverage(required: &[String], offered: &[String]) -> f32 {
	let required: BTreeSet<String> = required
		.iter()
		.map(|skill| normalize_skill(skill))
		.filter(|skill| !skill.is_empty())
		.collect();

	if required.is_empty() {
		return 1.0;
	}

	let offered: BTreeSet<String> = offered
		.iter()
		.map(|skill| normalize_skill(skill))
		.filter(|skill| !skill.is_empty())
		.collect();
	let covered = required.intersection(&offered).count();

	covered as f32 / required.len() as f32
}

/// Required skills the offering side actually covers, normalized, sorted,
/// deduplicated. Persisted with each match as its explanation payload.
pub fn overlapping_skills(required: &[String], offered: &[String]) -> Vec<String> {
	let offered: BTreeSet<String> = offered
		.iter()
		.map(|skill| normalize_skill(skill))
		.filter(|skill| !skill.is_empty())
		.collect();
	let mut overlap: Vec<String> = required
		.iter()
		.map(|skill| normalize_skill(skill))
		.filter(|skill| !skill.is_empty() && offered.contains(skill))
		.collect();

	overlap.sort();
	overlap.dedup();

	overlap
}

/// Bounded ratio of held experience to the requested minimum. Experience
/// beyond the minimum does not keep increasing the score.
pub fn experience_fit(required_min_years: f32, candidate_years: f32) -> f32 {
	if required_min_years <= 0.0 {
		return 1.0;
	}
	if candidate_years <= 0.0 {
		return 0.0;
	}

	(candidate_years / required_min_years).min(1.0)
}

pub fn proficiency_fit(
	required: Option<Proficiency>,
	held: Option<Proficiency>,
	policy: &ScoringPolicy,
) -> f32 {
	let (Some(required), Some(held)) = (required, held) else {
		return 0.0;
	};
	let steps = required.step_distance(held);

	(1.0 - steps as f32 * policy.level_step_penalty).max(0.0)
}

pub fn location_fit(source: &Entity, candidate: &Entity, policy: &ScoringPolicy) -> f32 {
	let (Some(wanted), Some(offered)) = (&source.location, &candidate.location) else {
		return 0.0;
	};

	if wanted.region == offered.region {
		return 1.0;
	}

	match (&wanted.area, &offered.area) {
		(Some(a), Some(b)) if a == b => policy.partial_region_credit,
		_ => 0.0,
	}
}

#[cfg(test)]
mod tests {
	use uuid::Uuid;

	use super::*;
	use crate::entity::{EntityKind, Location};

	fn entity(kind: EntityKind) -> Entity {
		Entity {
			entity_id: Uuid::new_v4(),
			tenant_id: "t1".to_string(),
			kind,
			skills: Vec::new(),
			experience_years: 0.0,
			proficiency: None,
			location: None,
			domain_tags: Vec::new(),
			active: true,
			embedding: None,
		}
	}

	#[test]
	fn extra_candidate_skills_do_not_change_full_coverage() {
		let required = vec!["go".to_string(), "sql".to_string()];
		let offered = vec!["go".to_string(), "sql".to_string(), "python".to_string()];

		assert_eq!(skill_coverage(&required, &offered), 1.0);
	}

	#[test]
	fn skill_coverage_is_case_insensitive_and_partial() {
		let required = vec!["Go".to_string(), "SQL".to_string()];
		let offered = vec!["go".to_string()];

		assert_eq!(skill_coverage(&required, &offered), 0.5);
	}

	#[test]
	fn empty_required_set_is_vacuously_satisfied() {
		assert_eq!(skill_coverage(&[], &["go".to_string()]), 1.0);
	}

	#[test]
	fn overlapping_skills_are_normalized_and_sorted() {
		let required = vec!["SQL".to_string(), "Go".to_string(), "Rust".to_string()];
		let offered = vec![" go ".to_string(), "sql".to_string(), "python".to_string()];

		assert_eq!(overlapping_skills(&required, &offered), vec!["go", "sql"]);
	}

	#[test]
	fn experience_is_capped_at_the_requested_minimum() {
		assert_eq!(experience_fit(4.0, 2.0), 0.5);
		assert_eq!(experience_fit(4.0, 8.0), 1.0);
		assert_eq!(experience_fit(0.0, 0.0), 1.0);
	}

	#[test]
	fn two_proficiency_steps_cost_half_at_default_penalty() {
		let policy = ScoringPolicy::default();
		let fit =
			proficiency_fit(Some(Proficiency::Expert), Some(Proficiency::Intermediate), &policy);

		assert_eq!(fit, 0.5);
		assert_eq!(proficiency_fit(None, Some(Proficiency::Expert), &policy), 0.0);
	}

	#[test]
	fn location_awards_partial_credit_for_shared_area() {
		let policy = ScoringPolicy::default();
		let mut source = entity(EntityKind::Request);
		let mut candidate = entity(EntityKind::Candidate);

		source.location =
			Some(Location { region: "shibuya".to_string(), area: Some("tokyo".to_string()) });
		candidate.location =
			Some(Location { region: "minato".to_string(), area: Some("tokyo".to_string()) });

		assert_eq!(location_fit(&source, &candidate, &policy), 0.5);

		candidate.location =
			Some(Location { region: "shibuya".to_string(), area: Some("tokyo".to_string()) });

		assert_eq!(location_fit(&source, &candidate, &policy), 1.0);
	}

	#[test]
	fn hard_filters_short_circuit_before_scoring() {
		let mut candidate = entity(EntityKind::Candidate);

		candidate.proficiency = Some(Proficiency::Basic);

		let filters = HardFilters {
			proficiency_in: Some(vec![Proficiency::Expert, Proficiency::Advanced]),
			..Default::default()
		};
		let scores = score_structured(
			&entity(EntityKind::Request),
			&candidate,
			&Weights::uniform(),
			&filters,
			&ScoringPolicy::default(),
		);

		assert!(!scores.passes_filters);
		assert!(scores.per_dimension.is_empty());
	}

	#[test]
	fn suppressed_dimensions_are_not_scored() {
		let weights = Weights::resolve(
			&[("skills".to_string(), 1.0)].into_iter().collect(),
		)
		.expect("expected valid weights");
		let scores = score_structured(
			&entity(EntityKind::Request),
			&entity(EntityKind::Candidate),
			&weights,
			&HardFilters::default(),
			&ScoringPolicy::default(),
		);

		assert_eq!(scores.per_dimension.len(), 1);
		assert!(scores.per_dimension.contains_key(&Dimension::Skills));
	}
}
