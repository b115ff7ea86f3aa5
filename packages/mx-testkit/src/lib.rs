//! In-memory store implementations and entity fixtures for exercising the
//! matching pipeline without a live database.

use std::{
	collections::HashMap,
	sync::{
		Arc, Mutex,
		atomic::{AtomicU32, Ordering},
	},
};

use time::OffsetDateTime;
use uuid::Uuid;

use mx_domain::{
	Embedding, Entity, EntityKind, Location, MatchStatus, Proficiency, ranker::cmp_f32_desc,
	similarity,
};
use mx_service::{
	BoxFuture, EntityStore, HistoryFinalize, MatchHistory, MatchRecord, MatchService, MatchStore,
	SimilarityBackend, Stores,
};

/// A config with small batches and a fast retry schedule so concurrency and
/// retry paths are exercised without slowing the suite down.
pub fn test_config() -> mx_config::Config {
	mx_config::Config {
		service: mx_config::Service {
			http_bind: "127.0.0.1:0".to_string(),
			admin_bind: "127.0.0.1:0".to_string(),
			log_level: "debug".to_string(),
		},
		storage: mx_config::Storage {
			postgres: mx_config::Postgres {
				dsn: "postgres://mx:mx@localhost:5432/mx_test".to_string(),
				pool_max_conns: 2,
			},
			vector_dim: 4,
		},
		matching: mx_config::Matching {
			batch_size: 2,
			max_concurrency: 2,
			default_min_score: 0.0,
			default_max_results: 100,
			accelerated_pool_threshold: 500,
			level_step_penalty: 0.25,
			partial_region_credit: 0.5,
			stale_run_timeout_secs: 900,
			history_page_limit: 20,
			retry: mx_config::Retry { max_attempts: 3, base_backoff_ms: 1, max_backoff_ms: 5 },
		},
	}
}

/// Service wired against fresh in-memory stores.
pub fn test_service() -> (MatchService, Arc<InMemoryStores>) {
	let stores = InMemoryStores::new();

	(MatchService::new(test_config(), stores.as_stores()), stores)
}

#[derive(Clone)]
pub struct EntityBuilder {
	entity: Entity,
}
impl EntityBuilder {
	pub fn request(tenant_id: &str) -> Self {
		Self::new(tenant_id, EntityKind::Request)
	}

	pub fn candidate(tenant_id: &str) -> Self {
		Self::new(tenant_id, EntityKind::Candidate)
	}

	fn new(tenant_id: &str, kind: EntityKind) -> Self {
		Self {
			entity: Entity {
				entity_id: Uuid::new_v4(),
				tenant_id: tenant_id.to_string(),
				kind,
				skills: Vec::new(),
				experience_years: 0.0,
				proficiency: None,
				location: None,
				domain_tags: Vec::new(),
				active: true,
				embedding: None,
			},
		}
	}

	/// Deterministic id so tie-break assertions are stable.
	pub fn id(mut self, id: u128) -> Self {
		self.entity.entity_id = Uuid::from_u128(id);

		self
	}

	pub fn skills(mut self, skills: &[&str]) -> Self {
		self.entity.skills = skills.iter().map(|skill| skill.to_string()).collect();

		self
	}

	pub fn experience(mut self, years: f32) -> Self {
		self.entity.experience_years = years;

		self
	}

	pub fn proficiency(mut self, level: Proficiency) -> Self {
		self.entity.proficiency = Some(level);

		self
	}

	pub fn location(mut self, region: &str, area: Option<&str>) -> Self {
		self.entity.location =
			Some(Location { region: region.to_string(), area: area.map(str::to_string) });

		self
	}

	pub fn domain_tags(mut self, tags: &[&str]) -> Self {
		self.entity.domain_tags = tags.iter().map(|tag| tag.to_string()).collect();

		self
	}

	pub fn embedding(mut self, vec: &[f32]) -> Self {
		self.entity.embedding = Some(Embedding { vec: vec.to_vec(), text: String::new() });

		self
	}

	pub fn inactive(mut self) -> Self {
		self.entity.active = false;

		self
	}

	pub fn build(self) -> Entity {
		self.entity
	}
}

/// All three store traits over plain maps. Ordering mirrors the SQL queries
/// so in-memory runs and Postgres runs agree on result order.
#[derive(Default)]
pub struct InMemoryStores {
	entities: Mutex<HashMap<Uuid, Entity>>,
	histories: Mutex<HashMap<Uuid, MatchHistory>>,
	results: Mutex<HashMap<Uuid, MatchRecord>>,
	pool_load_failures: AtomicU32,
}
impl InMemoryStores {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn as_stores(self: &Arc<Self>) -> Stores {
		Stores::new(self.clone(), self.clone(), self.clone())
	}

	pub fn insert_entity(&self, entity: Entity) {
		let mut entities = self.entities.lock().unwrap_or_else(|err| err.into_inner());

		entities.insert(entity.entity_id, entity);
	}

	/// The next `count` pool loads fail as backend-unavailable, then recover.
	pub fn fail_pool_loads(&self, count: u32) {
		self.pool_load_failures.store(count, Ordering::SeqCst);
	}

	pub fn history(&self, history_id: Uuid) -> Option<MatchHistory> {
		let histories = self.histories.lock().unwrap_or_else(|err| err.into_inner());

		histories.get(&history_id).cloned()
	}

	pub fn results_for(&self, history_id: Uuid) -> Vec<MatchRecord> {
		let results = self.results.lock().unwrap_or_else(|err| err.into_inner());
		let mut rows: Vec<MatchRecord> =
			results.values().filter(|row| row.history_id == history_id).cloned().collect();

		sort_results(&mut rows);

		rows
	}
}

fn sort_results(rows: &mut [MatchRecord]) {
	rows.sort_by(|left, right| {
		cmp_f32_desc(left.composite_score, right.composite_score)
			.then_with(|| cmp_f32_desc(left.semantic_score, right.semantic_score))
			.then_with(|| left.candidate_id.cmp(&right.candidate_id))
	});
}

impl EntityStore for InMemoryStores {
	fn fetch<'a>(
		&'a self,
		tenant_id: &'a str,
		entity_id: Uuid,
	) -> BoxFuture<'a, mx_service::Result<Option<Entity>>> {
		Box::pin(async move {
			let entities = self.entities.lock().unwrap_or_else(|err| err.into_inner());

			Ok(entities.get(&entity_id).filter(|entity| entity.tenant_id == tenant_id).cloned())
		})
	}

	fn list_pool<'a>(
		&'a self,
		tenant_id: &'a str,
		kind: EntityKind,
		ids: Option<&'a [Uuid]>,
	) -> BoxFuture<'a, mx_service::Result<Vec<Entity>>> {
		Box::pin(async move {
			if self
				.pool_load_failures
				.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
					(left > 0).then(|| left - 1)
				})
				.is_ok()
			{
				return Err(mx_service::Error::BackendUnavailable {
					message: "Injected pool load failure.".to_string(),
				});
			}

			let entities = self.entities.lock().unwrap_or_else(|err| err.into_inner());
			let mut pool: Vec<Entity> = entities
				.values()
				.filter(|entity| {
					entity.tenant_id == tenant_id
						&& entity.kind == kind && entity.active
						&& ids.is_none_or(|ids| ids.contains(&entity.entity_id))
				})
				.cloned()
				.collect();

			pool.sort_by_key(|entity| entity.entity_id);

			Ok(pool)
		})
	}
}

impl SimilarityBackend for InMemoryStores {
	fn nearest<'a>(
		&'a self,
		tenant_id: &'a str,
		kind: EntityKind,
		query: &'a [f32],
		ids: Option<&'a [Uuid]>,
		limit: u32,
	) -> BoxFuture<'a, mx_service::Result<Vec<(Uuid, f32)>>> {
		Box::pin(async move {
			let entities = self.entities.lock().unwrap_or_else(|err| err.into_inner());
			let mut neighbors: Vec<(Uuid, f32)> = entities
				.values()
				.filter(|entity| {
					entity.tenant_id == tenant_id
						&& entity.kind == kind && entity.active
						&& ids.is_none_or(|ids| ids.contains(&entity.entity_id))
				})
				.filter_map(|entity| {
					let embedding = entity.embedding.as_ref()?;

					similarity::cosine_similarity(query, &embedding.vec)
						.ok()
						.map(|cosine| (entity.entity_id, cosine))
				})
				.collect();

			neighbors.sort_by(|left, right| {
				cmp_f32_desc(left.1, right.1).then_with(|| left.0.cmp(&right.0))
			});
			neighbors.truncate(limit as usize);

			Ok(neighbors)
		})
	}
}

impl MatchStore for InMemoryStores {
	fn insert_history<'a>(
		&'a self,
		history: &'a MatchHistory,
	) -> BoxFuture<'a, mx_service::Result<()>> {
		Box::pin(async move {
			let mut histories = self.histories.lock().unwrap_or_else(|err| err.into_inner());

			histories.insert(history.history_id, history.clone());

			Ok(())
		})
	}

	fn finalize_history<'a>(
		&'a self,
		finalize: &'a HistoryFinalize,
	) -> BoxFuture<'a, mx_service::Result<()>> {
		Box::pin(async move {
			let mut histories = self.histories.lock().unwrap_or_else(|err| err.into_inner());
			let Some(history) = histories.get_mut(&finalize.history_id) else {
				return Err(mx_service::Error::NotFound {
					message: format!("Match history {} not found.", finalize.history_id),
				});
			};

			history.status = finalize.status;
			history.candidates_considered = finalize.candidates_considered;
			history.results_returned = finalize.results_returned;
			history.errors_count = finalize.errors_count;
			history.high_quality_count = finalize.high_quality_count;
			history.error_message = finalize.error_message.clone();
			history.completed_at = Some(finalize.completed_at);

			Ok(())
		})
	}

	fn fetch_history<'a>(
		&'a self,
		tenant_id: &'a str,
		history_id: Uuid,
	) -> BoxFuture<'a, mx_service::Result<Option<MatchHistory>>> {
		Box::pin(async move {
			let histories = self.histories.lock().unwrap_or_else(|err| err.into_inner());

			Ok(histories
				.get(&history_id)
				.filter(|history| history.tenant_id == tenant_id)
				.cloned())
		})
	}

	fn list_histories<'a>(
		&'a self,
		tenant_id: &'a str,
		limit: u32,
		offset: u32,
	) -> BoxFuture<'a, mx_service::Result<Vec<MatchHistory>>> {
		Box::pin(async move {
			let histories = self.histories.lock().unwrap_or_else(|err| err.into_inner());
			let mut rows: Vec<MatchHistory> = histories
				.values()
				.filter(|history| history.tenant_id == tenant_id)
				.cloned()
				.collect();

			rows.sort_by(|left, right| {
				right
					.started_at
					.cmp(&left.started_at)
					.then_with(|| left.history_id.cmp(&right.history_id))
			});

			Ok(rows.into_iter().skip(offset as usize).take(limit as usize).collect())
		})
	}

	fn insert_results<'a>(
		&'a self,
		records: &'a [MatchRecord],
	) -> BoxFuture<'a, mx_service::Result<()>> {
		Box::pin(async move {
			let mut results = self.results.lock().unwrap_or_else(|err| err.into_inner());

			for record in records {
				results.insert(record.match_id, record.clone());
			}

			Ok(())
		})
	}

	fn list_results<'a>(
		&'a self,
		tenant_id: &'a str,
		history_id: Uuid,
		limit: u32,
		offset: u32,
	) -> BoxFuture<'a, mx_service::Result<Vec<MatchRecord>>> {
		Box::pin(async move {
			let results = self.results.lock().unwrap_or_else(|err| err.into_inner());
			let mut rows: Vec<MatchRecord> = results
				.values()
				.filter(|row| row.tenant_id == tenant_id && row.history_id == history_id)
				.cloned()
				.collect();

			sort_results(&mut rows);

			Ok(rows.into_iter().skip(offset as usize).take(limit as usize).collect())
		})
	}

	fn fetch_result<'a>(
		&'a self,
		tenant_id: &'a str,
		match_id: Uuid,
	) -> BoxFuture<'a, mx_service::Result<Option<MatchRecord>>> {
		Box::pin(async move {
			let results = self.results.lock().unwrap_or_else(|err| err.into_inner());

			Ok(results.get(&match_id).filter(|row| row.tenant_id == tenant_id).cloned())
		})
	}

	fn update_result_status<'a>(
		&'a self,
		tenant_id: &'a str,
		match_id: Uuid,
		expected: MatchStatus,
		status: MatchStatus,
		updated_at: OffsetDateTime,
	) -> BoxFuture<'a, mx_service::Result<Option<MatchRecord>>> {
		Box::pin(async move {
			let mut results = self.results.lock().unwrap_or_else(|err| err.into_inner());
			let Some(row) = results
				.get_mut(&match_id)
				.filter(|row| row.tenant_id == tenant_id && row.status == expected)
			else {
				return Ok(None);
			};

			row.status = status;
			row.updated_at = updated_at;

			Ok(Some(row.clone()))
		})
	}

	fn reconcile_stale_running<'a>(
		&'a self,
		cutoff: OffsetDateTime,
		now: OffsetDateTime,
	) -> BoxFuture<'a, mx_service::Result<u64>> {
		Box::pin(async move {
			let mut histories = self.histories.lock().unwrap_or_else(|err| err.into_inner());
			let mut affected = 0_u64;

			for history in histories.values_mut() {
				if history.status == mx_service::HistoryStatus::Running
					&& history.started_at <= cutoff
				{
					history.status = mx_service::HistoryStatus::Failed;
					history.error_message =
						Some("Run exceeded the stale timeout while still running.".to_string());
					history.completed_at = Some(now);

					affected += 1;
				}
			}

			Ok(affected)
		})
	}
}
