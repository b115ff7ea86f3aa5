use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
	Request,
	Candidate,
}
impl EntityKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Request => "request",
			Self::Candidate => "candidate",
		}
	}

	pub fn parse(value: &str) -> Option<Self> {
		match value {
			"request" => Some(Self::Request),
			"candidate" => Some(Self::Candidate),
			_ => None,
		}
	}
}

/// Ordered proficiency scale. `rank` distance drives the level dimension:
/// one step costs `level_step_penalty`, floored at zero.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Proficiency {
	Basic,
	Intermediate,
	Advanced,
	Expert,
}
impl Proficiency {
	pub fn rank(self) -> i32 {
		match self {
			Self::Basic => 0,
			Self::Intermediate => 1,
			Self::Advanced => 2,
			Self::Expert => 3,
		}
	}

	pub fn step_distance(self, other: Self) -> u32 {
		self.rank().abs_diff(other.rank())
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Basic => "basic",
			Self::Intermediate => "intermediate",
			Self::Advanced => "advanced",
			Self::Expert => "expert",
		}
	}

	pub fn parse(value: &str) -> Option<Self> {
		match value {
			"basic" => Some(Self::Basic),
			"intermediate" => Some(Self::Intermediate),
			"advanced" => Some(Self::Advanced),
			"expert" => Some(Self::Expert),
			_ => None,
		}
	}
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Location {
	pub region: String,
	/// Broader area the region belongs to, e.g. a prefecture or country code.
	pub area: Option<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Embedding {
	pub vec: Vec<f32>,
	/// Normalized text the vector was derived from.
	pub text: String,
}

/// A request (open position) or candidate (profile). Read-only from the
/// engine's perspective; ownership and mutation live outside.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Entity {
	pub entity_id: Uuid,
	pub tenant_id: String,
	pub kind: EntityKind,
	pub skills: Vec<String>,
	/// Candidates: years of experience held. Requests: minimum years required.
	pub experience_years: f32,
	pub proficiency: Option<Proficiency>,
	pub location: Option<Location>,
	pub domain_tags: Vec<String>,
	pub active: bool,
	pub embedding: Option<Embedding>,
}

pub fn normalize_skill(skill: &str) -> String {
	skill.trim().to_lowercase()
}

/// Splits a free-text skill list on commas, tolerating fullwidth commas from
/// CJK input sources.
pub fn parse_skill_list(text: &str) -> Vec<String> {
	text.replace('\u{ff0c}', ",")
		.split(',')
		.map(str::trim)
		.filter(|part| !part.is_empty())
		.map(str::to_string)
		.collect()
}
