use std::{collections::HashMap, sync::Arc};

use tokio::{sync::Semaphore, task::JoinSet};
use uuid::Uuid;

use mx_domain::{
	Entity, HardFilters, RankedMatch, ScoredCandidate, ScoringPolicy, Weights, ranker, scorer,
	similarity,
};

use crate::{
	Error, MatchService, Result,
	types::{Direction, MatchParams, PoolSelector},
	with_retry,
};

/// A run's resolved knobs: validated weights plus defaults filled in from the
/// deployment config.
#[derive(Clone)]
pub(crate) struct RunPlan {
	pub(crate) weights: Weights,
	pub(crate) min_score: f32,
	pub(crate) max_results: usize,
	pub(crate) filters: HardFilters,
	pub(crate) policy: ScoringPolicy,
}

/// Scoring outcome of one source against its pool, before persistence.
pub(crate) struct SourceOutcome {
	pub(crate) matches: Vec<RankedMatch>,
	pub(crate) candidates_considered: u32,
	pub(crate) errors_count: u32,
	pub(crate) scored_count: u32,
}
impl SourceOutcome {
	/// Every considered candidate failed to score. Distinct from an empty
	/// pool and from a pool where every candidate was filtered out.
	pub(crate) fn all_failed(&self) -> bool {
		self.candidates_considered > 0 && self.scored_count == 0 && self.errors_count > 0
	}
}

impl MatchService {
	pub(crate) fn plan(&self, params: &MatchParams) -> Result<RunPlan> {
		let weights = match &params.weights {
			Some(raw) => Weights::resolve(raw)?,
			None => Weights::uniform(),
		};
		let min_score = params.min_score.unwrap_or(self.cfg.matching.default_min_score);

		if !(0.0..=1.0).contains(&min_score) {
			return Err(Error::InvalidRequest {
				message: format!("min_score must be within [0, 1], got {min_score}."),
			});
		}

		let max_results =
			params.max_results.unwrap_or(self.cfg.matching.default_max_results) as usize;

		if max_results == 0 {
			return Err(Error::InvalidRequest {
				message: "max_results must be greater than zero.".to_string(),
			});
		}

		Ok(RunPlan {
			weights,
			min_score,
			max_results,
			filters: params.filters.clone(),
			policy: ScoringPolicy {
				level_step_penalty: self.cfg.matching.level_step_penalty,
				partial_region_credit: self.cfg.matching.partial_region_credit,
			},
		})
	}

	/// Scores one source against the selected pool and ranks the survivors.
	/// Per-candidate scoring failures are isolated: they increment the error
	/// count and never abort the surviving candidates.
	pub(crate) async fn score_source(
		&self,
		tenant_id: &str,
		source: &Entity,
		direction: Direction,
		pool_selector: &PoolSelector,
		plan: &RunPlan,
	) -> Result<SourceOutcome> {
		let retry = &self.cfg.matching.retry;
		let candidate_kind = direction.candidate_kind();
		let pool = with_retry(retry, "pool load", || {
			self.stores.entities.list_pool(tenant_id, candidate_kind, pool_selector.ids())
		})
		.await?;
		let candidates_considered = pool.len() as u32;

		if pool.is_empty() {
			return Ok(SourceOutcome {
				matches: Vec::new(),
				candidates_considered: 0,
				errors_count: 0,
				scored_count: 0,
			});
		}

		// Above the threshold, semantic scoring is delegated to the storage
		// backend. The full pool stays in play: a candidate absent from the
		// neighbor map (no embedding stored) scores semantic 0, exactly as the
		// brute-force path treats it, so both paths rank identically.
		let threshold = self.cfg.matching.accelerated_pool_threshold;
		let semantic_map = if candidates_considered > threshold
			&& let Some(embedding) = &source.embedding
		{
			let neighbors = with_retry(retry, "similarity search", || {
				self.stores.similarity.nearest(
					tenant_id,
					candidate_kind,
					&embedding.vec,
					pool_selector.ids(),
					candidates_considered,
				)
			})
			.await?;
			let map: HashMap<Uuid, f32> = neighbors
				.into_iter()
				.map(|(id, cosine)| (id, similarity::rescale_unit(cosine)))
				.collect();

			Some(Arc::new(map))
		} else {
			None
		};
		let semaphore = Arc::new(Semaphore::new(self.cfg.matching.max_concurrency as usize));
		let source = Arc::new(source.clone());
		let weights = Arc::new(plan.weights.clone());
		let filters = Arc::new(plan.filters.clone());
		let policy = plan.policy;
		let mut tasks = JoinSet::new();

		for chunk in pool.chunks(self.cfg.matching.batch_size as usize) {
			let chunk = chunk.to_vec();
			let semaphore = semaphore.clone();
			let source = source.clone();
			let weights = weights.clone();
			let filters = filters.clone();
			let semantic_map = semantic_map.clone();

			tasks.spawn(async move {
				// The semaphore is held for the whole chunk so at most
				// `max_concurrency` chunks score at once.
				let _permit = semaphore.acquire_owned().await;

				score_chunk(&source, &chunk, &weights, &filters, &policy, semantic_map.as_deref())
			});
		}

		let mut scored = Vec::new();
		let mut errors_count = 0_u32;

		while let Some(joined) = tasks.join_next().await {
			let outcome = joined
				.map_err(|err| Error::Storage { message: format!("Scoring task failed: {err}.") })?;

			scored.extend(outcome.0);
			errors_count += outcome.1;
		}

		let scored_count = scored.len() as u32;
		let matches = ranker::rank(scored, &plan.weights, plan.min_score, plan.max_results);

		Ok(SourceOutcome { matches, candidates_considered, errors_count, scored_count })
	}
}

fn score_chunk(
	source: &Entity,
	chunk: &[Entity],
	weights: &Weights,
	filters: &HardFilters,
	policy: &ScoringPolicy,
	semantic_map: Option<&HashMap<Uuid, f32>>,
) -> (Vec<ScoredCandidate>, u32) {
	let mut scored = Vec::with_capacity(chunk.len());
	let mut errors = 0_u32;

	for candidate in chunk {
		// Hard filters short-circuit first: a filtered candidate is charged
		// nothing beyond the check, and a corrupt embedding on it cannot
		// degrade the run.
		if !filters.passes(candidate) {
			continue;
		}

		let semantic_score = match semantic_map {
			Some(map) => map.get(&candidate.entity_id).copied().unwrap_or(0.0),
			None =>
				match similarity::semantic_score(
					source.embedding.as_ref(),
					candidate.embedding.as_ref(),
				) {
					Ok(score) => score,
					Err(err) => {
						tracing::warn!(
							error = %err,
							candidate_id = %candidate.entity_id,
							"Skipping candidate with unscorable embedding."
						);

						errors += 1;

						continue;
					},
				},
		};

		scored.push(ScoredCandidate {
			candidate_id: candidate.entity_id,
			structured: scorer::score_structured(source, candidate, weights, filters, policy),
			semantic_score,
			overlapping_skills: scorer::overlapping_skills(&source.skills, &candidate.skills),
		});
	}

	(scored, errors)
}
