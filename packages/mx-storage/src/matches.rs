use sqlx::{PgPool, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	Result,
	models::{MatchHistoryRow, MatchResultRow},
};

const HISTORY_COLUMNS: &str = "\
history_id, tenant_id, mode, direction, params, status, candidates_considered, results_returned, \
errors_count, high_quality_count, error_message, started_at, completed_at";
const RESULT_COLUMNS: &str = "\
match_id, history_id, tenant_id, source_id, candidate_id, skills_score, experience_score, \
proficiency_score, location_score, domain_tags_score, structured_score, semantic_score, \
composite_score, quality_tier, overlapping_skills, status, created_at, updated_at";

pub async fn insert_history(pool: &PgPool, history: &MatchHistoryRow) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO match_histories
	(history_id, tenant_id, mode, direction, params, status, started_at)
VALUES
	($1, $2, $3, $4, $5, $6, $7)",
	)
	.bind(history.history_id)
	.bind(&history.tenant_id)
	.bind(&history.mode)
	.bind(&history.direction)
	.bind(&history.params)
	.bind(&history.status)
	.bind(history.started_at)
	.execute(pool)
	.await?;

	Ok(())
}

/// Closes out a run. Counts and status are written once, when the run owner
/// has merged every batch outcome.
#[allow(clippy::too_many_arguments)]
pub async fn finalize_history(
	pool: &PgPool,
	history_id: Uuid,
	status: &str,
	candidates_considered: i32,
	results_returned: i32,
	errors_count: i32,
	high_quality_count: i32,
	error_message: Option<&str>,
	completed_at: OffsetDateTime,
) -> Result<()> {
	sqlx::query(
		"\
UPDATE match_histories
SET status = $2,
	candidates_considered = $3,
	results_returned = $4,
	errors_count = $5,
	high_quality_count = $6,
	error_message = $7,
	completed_at = $8
WHERE history_id = $1",
	)
	.bind(history_id)
	.bind(status)
	.bind(candidates_considered)
	.bind(results_returned)
	.bind(errors_count)
	.bind(high_quality_count)
	.bind(error_message)
	.bind(completed_at)
	.execute(pool)
	.await?;

	Ok(())
}

pub async fn fetch_history(
	pool: &PgPool,
	tenant_id: &str,
	history_id: Uuid,
) -> Result<Option<MatchHistoryRow>> {
	let row = sqlx::query_as::<_, MatchHistoryRow>(&format!(
		"\
SELECT {HISTORY_COLUMNS}
FROM match_histories
WHERE tenant_id = $1
	AND history_id = $2",
	))
	.bind(tenant_id)
	.bind(history_id)
	.fetch_optional(pool)
	.await?;

	Ok(row)
}

pub async fn list_histories(
	pool: &PgPool,
	tenant_id: &str,
	limit: i64,
	offset: i64,
) -> Result<Vec<MatchHistoryRow>> {
	let rows = sqlx::query_as::<_, MatchHistoryRow>(&format!(
		"\
SELECT {HISTORY_COLUMNS}
FROM match_histories
WHERE tenant_id = $1
ORDER BY started_at DESC, history_id
LIMIT $2 OFFSET $3",
	))
	.bind(tenant_id)
	.bind(limit)
	.bind(offset)
	.fetch_all(pool)
	.await?;

	Ok(rows)
}

pub async fn insert_results(pool: &PgPool, rows: &[MatchResultRow]) -> Result<()> {
	if rows.is_empty() {
		return Ok(());
	}

	let mut builder = QueryBuilder::new(format!("INSERT INTO match_results ({RESULT_COLUMNS}) "));

	builder.push_values(rows, |mut b, row| {
		b.push_bind(row.match_id)
			.push_bind(row.history_id)
			.push_bind(row.tenant_id.clone())
			.push_bind(row.source_id)
			.push_bind(row.candidate_id)
			.push_bind(row.skills_score)
			.push_bind(row.experience_score)
			.push_bind(row.proficiency_score)
			.push_bind(row.location_score)
			.push_bind(row.domain_tags_score)
			.push_bind(row.structured_score)
			.push_bind(row.semantic_score)
			.push_bind(row.composite_score)
			.push_bind(row.quality_tier.clone())
			.push_bind(row.overlapping_skills.clone())
			.push_bind(row.status.clone())
			.push_bind(row.created_at)
			.push_bind(row.updated_at);
	});
	builder.build().execute(pool).await?;

	Ok(())
}

/// Pages a run's results in the presentation order: best composite first,
/// semantic score then candidate id breaking ties.
pub async fn list_results(
	pool: &PgPool,
	tenant_id: &str,
	history_id: Uuid,
	limit: i64,
	offset: i64,
) -> Result<Vec<MatchResultRow>> {
	let rows = sqlx::query_as::<_, MatchResultRow>(&format!(
		"\
SELECT {RESULT_COLUMNS}
FROM match_results
WHERE tenant_id = $1
	AND history_id = $2
ORDER BY composite_score DESC, semantic_score DESC, candidate_id
LIMIT $3 OFFSET $4",
	))
	.bind(tenant_id)
	.bind(history_id)
	.bind(limit)
	.bind(offset)
	.fetch_all(pool)
	.await?;

	Ok(rows)
}

pub async fn fetch_result(
	pool: &PgPool,
	tenant_id: &str,
	match_id: Uuid,
) -> Result<Option<MatchResultRow>> {
	let row = sqlx::query_as::<_, MatchResultRow>(&format!(
		"\
SELECT {RESULT_COLUMNS}
FROM match_results
WHERE tenant_id = $1
	AND match_id = $2",
	))
	.bind(tenant_id)
	.bind(match_id)
	.fetch_optional(pool)
	.await?;

	Ok(row)
}

/// Writes an already validated status. Transition legality is checked by the
/// caller against the current row; the write itself is conditional on that
/// observed status so a concurrent writer cannot be overwritten. No row back
/// means the row is gone or the status moved underneath the caller.
pub async fn update_result_status(
	pool: &PgPool,
	tenant_id: &str,
	match_id: Uuid,
	expected: &str,
	status: &str,
	updated_at: OffsetDateTime,
) -> Result<Option<MatchResultRow>> {
	let row = sqlx::query_as::<_, MatchResultRow>(&format!(
		"\
UPDATE match_results
SET status = $4, updated_at = $5
WHERE tenant_id = $1
	AND match_id = $2
	AND status = $3
RETURNING {RESULT_COLUMNS}",
	))
	.bind(tenant_id)
	.bind(match_id)
	.bind(expected)
	.bind(status)
	.bind(updated_at)
	.fetch_optional(pool)
	.await?;

	Ok(row)
}

/// Fails any run still marked running past the cutoff. Returns the number of
/// rows reconciled.
pub async fn reconcile_stale_running(
	pool: &PgPool,
	cutoff: OffsetDateTime,
	now: OffsetDateTime,
) -> Result<u64> {
	let outcome = sqlx::query(
		"\
UPDATE match_histories
SET status = 'failed',
	error_message = 'Run exceeded the stale timeout while still running.',
	completed_at = $2
WHERE status = 'running'
	AND started_at <= $1",
	)
	.bind(cutoff)
	.bind(now)
	.execute(pool)
	.await?;

	Ok(outcome.rows_affected())
}
