use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use mx_domain::{Dimension, EntityKind, HardFilters, MatchStatus, QualityTier};

/// Which side of the pairing drives the run. The scorer always sees the pair
/// as (requirements side, offering side), so both directions share one
/// scoring path.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
	RequestToCandidates,
	CandidateToRequests,
}
impl Direction {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::RequestToCandidates => "request_to_candidates",
			Self::CandidateToRequests => "candidate_to_requests",
		}
	}

	pub fn parse(value: &str) -> Option<Self> {
		match value {
			"request_to_candidates" => Some(Self::RequestToCandidates),
			"candidate_to_requests" => Some(Self::CandidateToRequests),
			_ => None,
		}
	}

	pub fn source_kind(self) -> EntityKind {
		match self {
			Self::RequestToCandidates => EntityKind::Request,
			Self::CandidateToRequests => EntityKind::Candidate,
		}
	}

	pub fn candidate_kind(self) -> EntityKind {
		match self {
			Self::RequestToCandidates => EntityKind::Candidate,
			Self::CandidateToRequests => EntityKind::Request,
		}
	}
}

/// Which entities to match against. `AllActive` is the common case; `Ids`
/// restricts the pool to an explicit set (inactive entities are still
/// excluded).
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolSelector {
	AllActive,
	Ids(Vec<Uuid>),
}
impl PoolSelector {
	pub fn ids(&self) -> Option<&[Uuid]> {
		match self {
			Self::AllActive => None,
			Self::Ids(ids) => Some(ids),
		}
	}
}

/// Per-run knobs. Anything left `None` falls back to the deployment defaults
/// in `[matching]`.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct MatchParams {
	/// Raw name -> weight map; validated and normalized before scoring. Absent
	/// means uniform weights over every dimension.
	pub weights: Option<BTreeMap<String, f32>>,
	pub min_score: Option<f32>,
	pub max_results: Option<u32>,
	#[serde(default)]
	pub filters: HardFilters,
}

/// Terminal shape of a run. `Running` only ever appears on rows whose run is
/// still in flight (or died without finalizing; the worker reconciles those).
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryStatus {
	Running,
	Completed,
	CompletedWithErrors,
	CompletedEmpty,
	Failed,
}
impl HistoryStatus {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Running => "running",
			Self::Completed => "completed",
			Self::CompletedWithErrors => "completed_with_errors",
			Self::CompletedEmpty => "completed_empty",
			Self::Failed => "failed",
		}
	}

	pub fn parse(value: &str) -> Option<Self> {
		match value {
			"running" => Some(Self::Running),
			"completed" => Some(Self::Completed),
			"completed_with_errors" => Some(Self::CompletedWithErrors),
			"completed_empty" => Some(Self::CompletedEmpty),
			"failed" => Some(Self::Failed),
			_ => None,
		}
	}
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
	OneToMany,
	Bulk,
}
impl RunMode {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::OneToMany => "one_to_many",
			Self::Bulk => "bulk",
		}
	}

	pub fn parse(value: &str) -> Option<Self> {
		match value {
			"one_to_many" => Some(Self::OneToMany),
			"bulk" => Some(Self::Bulk),
			_ => None,
		}
	}
}

/// Audit record of one run. `params` is the raw request snapshot so a run can
/// be explained after the defaults or weights change.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MatchHistory {
	pub history_id: Uuid,
	pub tenant_id: String,
	pub mode: RunMode,
	pub direction: Direction,
	pub params: serde_json::Value,
	pub status: HistoryStatus,
	pub candidates_considered: u32,
	pub results_returned: u32,
	pub errors_count: u32,
	pub high_quality_count: u32,
	pub error_message: Option<String>,
	#[serde(with = "time::serde::rfc3339")]
	pub started_at: OffsetDateTime,
	#[serde(with = "time::serde::rfc3339::option")]
	pub completed_at: Option<OffsetDateTime>,
}

/// One persisted source/candidate pair. Immutable after creation except for
/// `status`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MatchRecord {
	pub match_id: Uuid,
	pub history_id: Uuid,
	pub tenant_id: String,
	pub source_id: Uuid,
	pub candidate_id: Uuid,
	pub per_dimension: BTreeMap<Dimension, f32>,
	pub structured_score: f32,
	pub semantic_score: f32,
	pub composite_score: f32,
	pub tier: QualityTier,
	pub overlapping_skills: Vec<String>,
	pub status: MatchStatus,
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
	#[serde(with = "time::serde::rfc3339")]
	pub updated_at: OffsetDateTime,
}

/// Counts passed to the single finalize write that closes a run.
#[derive(Clone, Debug)]
pub struct HistoryFinalize {
	pub history_id: Uuid,
	pub status: HistoryStatus,
	pub candidates_considered: u32,
	pub results_returned: u32,
	pub errors_count: u32,
	pub high_quality_count: u32,
	pub error_message: Option<String>,
	pub completed_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn direction_orients_the_kinds() {
		assert_eq!(Direction::RequestToCandidates.source_kind(), EntityKind::Request);
		assert_eq!(Direction::RequestToCandidates.candidate_kind(), EntityKind::Candidate);
		assert_eq!(Direction::CandidateToRequests.source_kind(), EntityKind::Candidate);
		assert_eq!(Direction::CandidateToRequests.candidate_kind(), EntityKind::Request);
	}

	#[test]
	fn status_strings_round_trip() {
		for status in [
			HistoryStatus::Running,
			HistoryStatus::Completed,
			HistoryStatus::CompletedWithErrors,
			HistoryStatus::CompletedEmpty,
			HistoryStatus::Failed,
		] {
			assert_eq!(HistoryStatus::parse(status.as_str()), Some(status));
		}
	}
}
