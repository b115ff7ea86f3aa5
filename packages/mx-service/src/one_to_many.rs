use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use mx_domain::{Entity, MatchStatus, QualityTier};

use crate::{
	Error, MatchService, Result,
	orchestrate::{RunPlan, SourceOutcome},
	types::{
		Direction, HistoryFinalize, HistoryStatus, MatchHistory, MatchParams, MatchRecord,
		PoolSelector, RunMode,
	},
	with_retry,
};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct OneToManyRequest {
	pub tenant_id: String,
	pub source_id: Uuid,
	pub direction: Direction,
	#[serde(default = "default_pool")]
	pub pool: PoolSelector,
	#[serde(default)]
	pub params: MatchParams,
}

fn default_pool() -> PoolSelector {
	PoolSelector::AllActive
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct OneToManyResponse {
	pub history_id: Uuid,
	pub status: HistoryStatus,
	pub matches: Vec<MatchRecord>,
	pub candidates_considered: u32,
	pub errors_count: u32,
	pub high_quality_count: u32,
}

impl MatchService {
	/// Runs a single source against the selected pool and waits for the
	/// outcome. The history row is created before scoring starts and
	/// finalized exactly once, on every path out.
	pub async fn match_one_to_many(&self, request: OneToManyRequest) -> Result<OneToManyResponse> {
		let plan = self.plan(&request.params)?;
		let source = self.load_source(&request).await?;
		let history = self.open_history(&request, &source).await?;

		self.run_one_to_many(&request, &source, &plan, history).await
	}

	/// Fire-and-forget variant: validates and opens the history
	/// synchronously, then detaches the scoring run. The returned history id
	/// is immediately pollable.
	pub async fn submit_one_to_many(&self, request: OneToManyRequest) -> Result<Uuid> {
		let plan = self.plan(&request.params)?;
		let source = self.load_source(&request).await?;
		let history = self.open_history(&request, &source).await?;
		let history_id = history.history_id;
		let service = self.clone();

		tokio::spawn(async move {
			if let Err(err) = service.run_one_to_many(&request, &source, &plan, history).await {
				tracing::error!(error = %err, history_id = %history_id, "Detached match run failed.");
			}
		});

		Ok(history_id)
	}

	async fn load_source(&self, request: &OneToManyRequest) -> Result<Entity> {
		let retry = &self.cfg.matching.retry;
		let source = with_retry(retry, "source fetch", || {
			self.stores.entities.fetch(&request.tenant_id, request.source_id)
		})
		.await?
		.ok_or_else(|| Error::NotFound {
			message: format!(
				"Entity {} not found for tenant {}.",
				request.source_id, request.tenant_id
			),
		})?;

		if source.kind != request.direction.source_kind() {
			return Err(Error::InvalidRequest {
				message: format!(
					"Entity {} is a {} and cannot drive a {} run.",
					source.entity_id,
					source.kind.as_str(),
					request.direction.as_str()
				),
			});
		}
		if !source.active {
			return Err(Error::InvalidRequest {
				message: format!("Entity {} is inactive.", source.entity_id),
			});
		}

		Ok(source)
	}

	async fn open_history(
		&self,
		request: &OneToManyRequest,
		source: &Entity,
	) -> Result<MatchHistory> {
		let params = serde_json::to_value(request).map_err(|err| Error::InvalidRequest {
			message: format!("Parameters are not serializable: {err}."),
		})?;
		let history = MatchHistory {
			history_id: Uuid::new_v4(),
			tenant_id: request.tenant_id.clone(),
			mode: RunMode::OneToMany,
			direction: request.direction,
			params,
			status: HistoryStatus::Running,
			candidates_considered: 0,
			results_returned: 0,
			errors_count: 0,
			high_quality_count: 0,
			error_message: None,
			started_at: OffsetDateTime::now_utc(),
			completed_at: None,
		};

		with_retry(&self.cfg.matching.retry, "history insert", || {
			self.stores.matches.insert_history(&history)
		})
		.await?;

		tracing::info!(
			history_id = %history.history_id,
			tenant_id = %history.tenant_id,
			source_id = %source.entity_id,
			direction = request.direction.as_str(),
			"Opened match run."
		);

		Ok(history)
	}

	async fn run_one_to_many(
		&self,
		request: &OneToManyRequest,
		source: &Entity,
		plan: &RunPlan,
		history: MatchHistory,
	) -> Result<OneToManyResponse> {
		let outcome = match self
			.score_source(&request.tenant_id, source, request.direction, &request.pool, plan)
			.await
		{
			Ok(outcome) => outcome,
			Err(err) => {
				self.finalize_failed(&history, &err).await;

				return Err(err);
			},
		};
		let now = OffsetDateTime::now_utc();
		let records = build_records(&history, source.entity_id, &outcome, now);

		if !records.is_empty()
			&& let Err(err) = with_retry(&self.cfg.matching.retry, "result insert", || {
				self.stores.matches.insert_results(&records)
			})
			.await
		{
			self.finalize_failed(&history, &err).await;

			return Err(err);
		}

		let status = run_status(&outcome);
		let high_quality_count =
			records.iter().filter(|record| record.tier == QualityTier::High).count() as u32;
		let finalize = HistoryFinalize {
			history_id: history.history_id,
			status,
			candidates_considered: outcome.candidates_considered,
			results_returned: records.len() as u32,
			errors_count: outcome.errors_count,
			high_quality_count,
			error_message: outcome
				.all_failed()
				.then(|| "Every candidate failed to score.".to_string()),
			completed_at: OffsetDateTime::now_utc(),
		};

		with_retry(&self.cfg.matching.retry, "history finalize", || {
			self.stores.matches.finalize_history(&finalize)
		})
		.await?;

		tracing::info!(
			history_id = %history.history_id,
			status = status.as_str(),
			candidates_considered = outcome.candidates_considered,
			results_returned = records.len(),
			errors_count = outcome.errors_count,
			"Closed match run."
		);

		Ok(OneToManyResponse {
			history_id: history.history_id,
			status,
			matches: records,
			candidates_considered: outcome.candidates_considered,
			errors_count: outcome.errors_count,
			high_quality_count,
		})
	}

	/// Best-effort failure finalize. The original error is what the caller
	/// sees; a finalize failure here only gets logged (the reconciliation
	/// sweep will catch the stuck row).
	pub(crate) async fn finalize_failed(&self, history: &MatchHistory, cause: &Error) {
		let finalize = HistoryFinalize {
			history_id: history.history_id,
			status: HistoryStatus::Failed,
			candidates_considered: 0,
			results_returned: 0,
			errors_count: 0,
			high_quality_count: 0,
			error_message: Some(cause.to_string()),
			completed_at: OffsetDateTime::now_utc(),
		};

		if let Err(err) = with_retry(&self.cfg.matching.retry, "failure finalize", || {
			self.stores.matches.finalize_history(&finalize)
		})
		.await
		{
			tracing::error!(
				error = %err,
				history_id = %history.history_id,
				"Failed to finalize a failed match run."
			);
		}
	}
}

pub(crate) fn run_status(outcome: &SourceOutcome) -> HistoryStatus {
	if outcome.candidates_considered == 0 {
		HistoryStatus::CompletedEmpty
	} else if outcome.all_failed() {
		HistoryStatus::Failed
	} else if outcome.errors_count > 0 {
		HistoryStatus::CompletedWithErrors
	} else {
		HistoryStatus::Completed
	}
}

pub(crate) fn build_records(
	history: &MatchHistory,
	source_id: Uuid,
	outcome: &SourceOutcome,
	now: OffsetDateTime,
) -> Vec<MatchRecord> {
	outcome
		.matches
		.iter()
		.map(|ranked| MatchRecord {
			match_id: Uuid::new_v4(),
			history_id: history.history_id,
			tenant_id: history.tenant_id.clone(),
			source_id,
			candidate_id: ranked.candidate_id,
			per_dimension: ranked.per_dimension.clone(),
			structured_score: ranked.structured_score,
			semantic_score: ranked.semantic_score,
			composite_score: ranked.composite_score,
			tier: ranked.tier,
			overlapping_skills: ranked.overlapping_skills.clone(),
			status: MatchStatus::Proposed,
			created_at: now,
			updated_at: now,
		})
		.collect()
}
