use std::{collections::BTreeMap, sync::Arc};

use sqlx::{PgPool, types::Json};
use time::OffsetDateTime;
use uuid::Uuid;

use mx_domain::{
	Dimension, Embedding, Entity, EntityKind, Location, MatchStatus, Proficiency, QualityTier,
};
use mx_storage::{
	db::Db,
	entities, matches,
	models::{EntityRow, MatchHistoryRow, MatchResultRow},
	vector,
};

use crate::{
	BoxFuture, EntityStore, Error, MatchStore, Result, SimilarityBackend,
	types::{Direction, HistoryFinalize, HistoryStatus, MatchHistory, MatchRecord, RunMode},
};

/// Store handles shared by every operation. All three default to the same
/// Postgres pool; tests swap in in-memory implementations.
#[derive(Clone)]
pub struct Stores {
	pub entities: Arc<dyn EntityStore>,
	pub matches: Arc<dyn MatchStore>,
	pub similarity: Arc<dyn SimilarityBackend>,
}
impl Stores {
	pub fn new(
		entities: Arc<dyn EntityStore>,
		matches: Arc<dyn MatchStore>,
		similarity: Arc<dyn SimilarityBackend>,
	) -> Self {
		Self { entities, matches, similarity }
	}

	pub fn postgres(db: &Db) -> Self {
		let pg = Arc::new(PgStores { pool: db.pool.clone() });

		Self { entities: pg.clone(), matches: pg.clone(), similarity: pg }
	}
}

struct PgStores {
	pool: PgPool,
}

impl EntityStore for PgStores {
	fn fetch<'a>(
		&'a self,
		tenant_id: &'a str,
		entity_id: Uuid,
	) -> BoxFuture<'a, Result<Option<Entity>>> {
		Box::pin(async move {
			let row = entities::fetch(&self.pool, tenant_id, entity_id).await?;

			row.map(entity_from_row).transpose()
		})
	}

	fn list_pool<'a>(
		&'a self,
		tenant_id: &'a str,
		kind: EntityKind,
		ids: Option<&'a [Uuid]>,
	) -> BoxFuture<'a, Result<Vec<Entity>>> {
		Box::pin(async move {
			let rows = entities::list_pool(&self.pool, tenant_id, kind.as_str(), ids).await?;

			rows.into_iter().map(entity_from_row).collect()
		})
	}
}

impl SimilarityBackend for PgStores {
	fn nearest<'a>(
		&'a self,
		tenant_id: &'a str,
		kind: EntityKind,
		query: &'a [f32],
		ids: Option<&'a [Uuid]>,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<(Uuid, f32)>>> {
		Box::pin(async move {
			Ok(entities::nearest(&self.pool, tenant_id, kind.as_str(), query, ids, limit as i64)
				.await?)
		})
	}
}

impl MatchStore for PgStores {
	fn insert_history<'a>(&'a self, history: &'a MatchHistory) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			Ok(matches::insert_history(&self.pool, &history_to_row(history)).await?)
		})
	}

	fn finalize_history<'a>(&'a self, finalize: &'a HistoryFinalize) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			Ok(matches::finalize_history(
				&self.pool,
				finalize.history_id,
				finalize.status.as_str(),
				finalize.candidates_considered as i32,
				finalize.results_returned as i32,
				finalize.errors_count as i32,
				finalize.high_quality_count as i32,
				finalize.error_message.as_deref(),
				finalize.completed_at,
			)
			.await?)
		})
	}

	fn fetch_history<'a>(
		&'a self,
		tenant_id: &'a str,
		history_id: Uuid,
	) -> BoxFuture<'a, Result<Option<MatchHistory>>> {
		Box::pin(async move {
			let row = matches::fetch_history(&self.pool, tenant_id, history_id).await?;

			row.map(history_from_row).transpose()
		})
	}

	fn list_histories<'a>(
		&'a self,
		tenant_id: &'a str,
		limit: u32,
		offset: u32,
	) -> BoxFuture<'a, Result<Vec<MatchHistory>>> {
		Box::pin(async move {
			let rows =
				matches::list_histories(&self.pool, tenant_id, limit as i64, offset as i64).await?;

			rows.into_iter().map(history_from_row).collect()
		})
	}

	fn insert_results<'a>(&'a self, records: &'a [MatchRecord]) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let rows = records.iter().map(record_to_row).collect::<Vec<_>>();

			Ok(matches::insert_results(&self.pool, &rows).await?)
		})
	}

	fn list_results<'a>(
		&'a self,
		tenant_id: &'a str,
		history_id: Uuid,
		limit: u32,
		offset: u32,
	) -> BoxFuture<'a, Result<Vec<MatchRecord>>> {
		Box::pin(async move {
			let rows = matches::list_results(
				&self.pool,
				tenant_id,
				history_id,
				limit as i64,
				offset as i64,
			)
			.await?;

			rows.into_iter().map(record_from_row).collect()
		})
	}

	fn fetch_result<'a>(
		&'a self,
		tenant_id: &'a str,
		match_id: Uuid,
	) -> BoxFuture<'a, Result<Option<MatchRecord>>> {
		Box::pin(async move {
			let row = matches::fetch_result(&self.pool, tenant_id, match_id).await?;

			row.map(record_from_row).transpose()
		})
	}

	fn update_result_status<'a>(
		&'a self,
		tenant_id: &'a str,
		match_id: Uuid,
		expected: MatchStatus,
		status: MatchStatus,
		updated_at: OffsetDateTime,
	) -> BoxFuture<'a, Result<Option<MatchRecord>>> {
		Box::pin(async move {
			let row = matches::update_result_status(
				&self.pool,
				tenant_id,
				match_id,
				expected.as_str(),
				status.as_str(),
				updated_at,
			)
			.await?;

			row.map(record_from_row).transpose()
		})
	}

	fn reconcile_stale_running<'a>(
		&'a self,
		cutoff: OffsetDateTime,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<u64>> {
		Box::pin(async move { Ok(matches::reconcile_stale_running(&self.pool, cutoff, now).await?) })
	}
}

fn corrupt(what: &str, value: &str) -> Error {
	Error::Storage { message: format!("Unknown {what} in storage: {value}.") }
}

fn entity_from_row(row: EntityRow) -> Result<Entity> {
	let kind = EntityKind::parse(&row.kind).ok_or_else(|| corrupt("entity kind", &row.kind))?;
	let proficiency = row
		.proficiency
		.as_deref()
		.map(|raw| Proficiency::parse(raw).ok_or_else(|| corrupt("proficiency", raw)))
		.transpose()?;
	let location = row.region.map(|region| Location { region, area: row.area });
	let embedding = row
		.embedding
		.as_deref()
		.map(|raw| {
			Ok::<_, Error>(Embedding {
				vec: vector::parse_pg_vector(raw)?,
				text: row.embedding_text.clone().unwrap_or_default(),
			})
		})
		.transpose()?;

	Ok(Entity {
		entity_id: row.entity_id,
		tenant_id: row.tenant_id,
		kind,
		skills: row.skills.0,
		experience_years: row.experience_years,
		proficiency,
		location,
		domain_tags: row.domain_tags.0,
		active: row.active,
		embedding,
	})
}

fn history_to_row(history: &MatchHistory) -> MatchHistoryRow {
	MatchHistoryRow {
		history_id: history.history_id,
		tenant_id: history.tenant_id.clone(),
		mode: history.mode.as_str().to_string(),
		direction: history.direction.as_str().to_string(),
		params: history.params.clone(),
		status: history.status.as_str().to_string(),
		candidates_considered: history.candidates_considered as i32,
		results_returned: history.results_returned as i32,
		errors_count: history.errors_count as i32,
		high_quality_count: history.high_quality_count as i32,
		error_message: history.error_message.clone(),
		started_at: history.started_at,
		completed_at: history.completed_at,
	}
}

fn history_from_row(row: MatchHistoryRow) -> Result<MatchHistory> {
	let mode = RunMode::parse(&row.mode).ok_or_else(|| corrupt("run mode", &row.mode))?;
	let direction =
		Direction::parse(&row.direction).ok_or_else(|| corrupt("direction", &row.direction))?;
	let status =
		HistoryStatus::parse(&row.status).ok_or_else(|| corrupt("history status", &row.status))?;

	Ok(MatchHistory {
		history_id: row.history_id,
		tenant_id: row.tenant_id,
		mode,
		direction,
		params: row.params,
		status,
		candidates_considered: row.candidates_considered.max(0) as u32,
		results_returned: row.results_returned.max(0) as u32,
		errors_count: row.errors_count.max(0) as u32,
		high_quality_count: row.high_quality_count.max(0) as u32,
		error_message: row.error_message,
		started_at: row.started_at,
		completed_at: row.completed_at,
	})
}

fn record_to_row(record: &MatchRecord) -> MatchResultRow {
	let dimension = |dim: Dimension| record.per_dimension.get(&dim).copied();

	MatchResultRow {
		match_id: record.match_id,
		history_id: record.history_id,
		tenant_id: record.tenant_id.clone(),
		source_id: record.source_id,
		candidate_id: record.candidate_id,
		skills_score: dimension(Dimension::Skills),
		experience_score: dimension(Dimension::Experience),
		proficiency_score: dimension(Dimension::Proficiency),
		location_score: dimension(Dimension::Location),
		domain_tags_score: dimension(Dimension::DomainTags),
		structured_score: record.structured_score,
		semantic_score: record.semantic_score,
		composite_score: record.composite_score,
		quality_tier: record.tier.as_str().to_string(),
		overlapping_skills: Json(record.overlapping_skills.clone()),
		status: record.status.as_str().to_string(),
		created_at: record.created_at,
		updated_at: record.updated_at,
	}
}

fn record_from_row(row: MatchResultRow) -> Result<MatchRecord> {
	let tier = QualityTier::parse(&row.quality_tier)
		.ok_or_else(|| corrupt("quality tier", &row.quality_tier))?;
	let status =
		MatchStatus::parse(&row.status).ok_or_else(|| corrupt("match status", &row.status))?;
	let mut per_dimension = BTreeMap::new();

	for (dim, score) in [
		(Dimension::Skills, row.skills_score),
		(Dimension::Experience, row.experience_score),
		(Dimension::Proficiency, row.proficiency_score),
		(Dimension::Location, row.location_score),
		(Dimension::DomainTags, row.domain_tags_score),
	] {
		if let Some(score) = score {
			per_dimension.insert(dim, score);
		}
	}

	Ok(MatchRecord {
		match_id: row.match_id,
		history_id: row.history_id,
		tenant_id: row.tenant_id,
		source_id: row.source_id,
		candidate_id: row.candidate_id,
		per_dimension,
		structured_score: row.structured_score,
		semantic_score: row.semantic_score,
		composite_score: row.composite_score,
		tier,
		overlapping_skills: row.overlapping_skills.0,
		status,
		created_at: row.created_at,
		updated_at: row.updated_at,
	})
}
