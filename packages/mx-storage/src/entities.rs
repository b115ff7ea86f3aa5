use sqlx::PgPool;
use uuid::Uuid;

use crate::{Result, models::EntityRow};

const ENTITY_COLUMNS: &str = "\
entity_id, tenant_id, kind, skills, experience_years, proficiency, region, area, domain_tags, \
active, embedding::text AS embedding, embedding_text";

pub async fn fetch(pool: &PgPool, tenant_id: &str, entity_id: Uuid) -> Result<Option<EntityRow>> {
	let row = sqlx::query_as::<_, EntityRow>(&format!(
		"\
SELECT {ENTITY_COLUMNS}
FROM entities
WHERE tenant_id = $1
	AND entity_id = $2",
	))
	.bind(tenant_id)
	.bind(entity_id)
	.fetch_optional(pool)
	.await?;

	Ok(row)
}

/// Lists the active candidate pool for a tenant and kind. When `ids` is given
/// the pool is restricted to that set; inactive entities are excluded either
/// way.
pub async fn list_pool(
	pool: &PgPool,
	tenant_id: &str,
	kind: &str,
	ids: Option<&[Uuid]>,
) -> Result<Vec<EntityRow>> {
	let rows = sqlx::query_as::<_, EntityRow>(&format!(
		"\
SELECT {ENTITY_COLUMNS}
FROM entities
WHERE tenant_id = $1
	AND kind = $2
	AND active = TRUE
	AND ($3::uuid[] IS NULL OR entity_id = ANY($3))
ORDER BY entity_id",
	))
	.bind(tenant_id)
	.bind(kind)
	.bind(ids)
	.fetch_all(pool)
	.await?;

	Ok(rows)
}

/// Nearest neighbors by raw cosine similarity, delegated to pgvector.
/// Returned similarities are the unrescaled cosine in `[-1, 1]` so callers
/// apply the same rescaling as the brute-force path.
pub async fn nearest(
	pool: &PgPool,
	tenant_id: &str,
	kind: &str,
	query: &[f32],
	ids: Option<&[Uuid]>,
	limit: i64,
) -> Result<Vec<(Uuid, f32)>> {
	let query_text = crate::vector::vector_to_pg(query);
	let rows: Vec<(Uuid, f64)> = sqlx::query_as(
		"\
SELECT entity_id, 1 - (embedding <=> $3::vector) AS similarity
FROM entities
WHERE tenant_id = $1
	AND kind = $2
	AND active = TRUE
	AND embedding IS NOT NULL
	AND ($4::uuid[] IS NULL OR entity_id = ANY($4))
ORDER BY embedding <=> $3::vector, entity_id
LIMIT $5",
	)
	.bind(tenant_id)
	.bind(kind)
	.bind(query_text)
	.bind(ids)
	.bind(limit)
	.fetch_all(pool)
	.await?;

	Ok(rows.into_iter().map(|(id, sim)| (id, sim as f32)).collect())
}
