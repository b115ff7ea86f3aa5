use sqlx::types::Json;
use time::OffsetDateTime;
use uuid::Uuid;

/// Entity read model. `embedding` is selected as `embedding::text` so rows
/// decode without a pgvector client type.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct EntityRow {
	pub entity_id: Uuid,
	pub tenant_id: String,
	pub kind: String,
	pub skills: Json<Vec<String>>,
	pub experience_years: f32,
	pub proficiency: Option<String>,
	pub region: Option<String>,
	pub area: Option<String>,
	pub domain_tags: Json<Vec<String>>,
	pub active: bool,
	pub embedding: Option<String>,
	pub embedding_text: Option<String>,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct MatchHistoryRow {
	pub history_id: Uuid,
	pub tenant_id: String,
	pub mode: String,
	pub direction: String,
	pub params: serde_json::Value,
	pub status: String,
	pub candidates_considered: i32,
	pub results_returned: i32,
	pub errors_count: i32,
	pub high_quality_count: i32,
	pub error_message: Option<String>,
	pub started_at: OffsetDateTime,
	pub completed_at: Option<OffsetDateTime>,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct MatchResultRow {
	pub match_id: Uuid,
	pub history_id: Uuid,
	pub tenant_id: String,
	pub source_id: Uuid,
	pub candidate_id: Uuid,
	pub skills_score: Option<f32>,
	pub experience_score: Option<f32>,
	pub proficiency_score: Option<f32>,
	pub location_score: Option<f32>,
	pub domain_tags_score: Option<f32>,
	pub structured_score: f32,
	pub semantic_score: f32,
	pub composite_score: f32,
	pub quality_tier: String,
	pub overlapping_skills: Json<Vec<String>>,
	pub status: String,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}
