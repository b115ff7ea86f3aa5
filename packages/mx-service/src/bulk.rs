use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use mx_domain::{Entity, QualityTier};

use crate::{
	Error, MatchService, Result,
	one_to_many::build_records,
	orchestrate::RunPlan,
	types::{
		Direction, HistoryFinalize, HistoryStatus, MatchHistory, MatchParams, PoolSelector, RunMode,
	},
	with_retry,
};

/// One run over many sources. `params.max_results` applies per source, not to
/// the run as a whole; every source gets its own top slice.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BulkRequest {
	pub tenant_id: String,
	pub direction: Direction,
	#[serde(default = "default_selector")]
	pub sources: PoolSelector,
	#[serde(default = "default_selector")]
	pub pool: PoolSelector,
	#[serde(default)]
	pub params: MatchParams,
	/// When unset, the per-source `min_score` cut is suspended and every scored
	/// pair is persisted for audit, still capped by `max_results`.
	#[serde(default = "default_top_matches_only")]
	pub top_matches_only: bool,
}

fn default_selector() -> PoolSelector {
	PoolSelector::AllActive
}

fn default_top_matches_only() -> bool {
	true
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BulkSummary {
	pub history_id: Uuid,
	pub status: HistoryStatus,
	pub sources_processed: u32,
	pub sources_failed: u32,
	pub candidates_considered: u32,
	pub results_returned: u32,
	pub errors_count: u32,
	pub high_quality_count: u32,
}

impl MatchService {
	/// Runs every selected source and waits for the aggregate outcome. A
	/// failing source is recorded and skipped; it never aborts the remaining
	/// sources.
	pub async fn match_bulk(&self, request: BulkRequest) -> Result<BulkSummary> {
		let plan = self.bulk_plan(&request)?;
		let history = self.open_bulk_history(&request).await?;

		self.run_bulk(&request, &plan, history).await
	}

	/// Fire-and-forget variant for large tenants: the history row is created
	/// synchronously and the run itself is detached.
	pub async fn submit_bulk(&self, request: BulkRequest) -> Result<Uuid> {
		let plan = self.bulk_plan(&request)?;
		let history = self.open_bulk_history(&request).await?;
		let history_id = history.history_id;
		let service = self.clone();

		tokio::spawn(async move {
			if let Err(err) = service.run_bulk(&request, &plan, history).await {
				tracing::error!(error = %err, history_id = %history_id, "Detached bulk run failed.");
			}
		});

		Ok(history_id)
	}

	fn bulk_plan(&self, request: &BulkRequest) -> Result<RunPlan> {
		let mut plan = self.plan(&request.params)?;

		if !request.top_matches_only {
			plan.min_score = 0.0;
		}

		Ok(plan)
	}

	async fn open_bulk_history(&self, request: &BulkRequest) -> Result<MatchHistory> {
		let params = serde_json::to_value(request).map_err(|err| Error::InvalidRequest {
			message: format!("Parameters are not serializable: {err}."),
		})?;
		let history = MatchHistory {
			history_id: Uuid::new_v4(),
			tenant_id: request.tenant_id.clone(),
			mode: RunMode::Bulk,
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
			direction = request.direction.as_str(),
			"Opened bulk match run."
		);

		Ok(history)
	}

	async fn run_bulk(
		&self,
		request: &BulkRequest,
		plan: &RunPlan,
		history: MatchHistory,
	) -> Result<BulkSummary> {
		let sources = match self.load_bulk_sources(request).await {
			Ok(sources) => sources,
			Err(err) => {
				self.finalize_failed(&history, &err).await;

				return Err(err);
			},
		};
		let mut sources_failed = 0_u32;
		let mut candidates_considered = 0_u32;
		let mut results_returned = 0_u32;
		let mut errors_count = 0_u32;
		let mut high_quality_count = 0_u32;

		for source in &sources {
			let outcome = match self
				.score_source(&request.tenant_id, source, request.direction, &request.pool, plan)
				.await
			{
				Ok(outcome) => outcome,
				Err(err) => {
					tracing::error!(
						error = %err,
						history_id = %history.history_id,
						source_id = %source.entity_id,
						"Bulk source failed; continuing with the remaining sources."
					);

					sources_failed += 1;

					continue;
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
				tracing::error!(
					error = %err,
					history_id = %history.history_id,
					source_id = %source.entity_id,
					"Bulk source results could not be persisted; continuing."
				);

				sources_failed += 1;

				continue;
			}

			candidates_considered += outcome.candidates_considered;
			results_returned += records.len() as u32;
			errors_count += outcome.errors_count;
			high_quality_count +=
				records.iter().filter(|record| record.tier == QualityTier::High).count() as u32;
		}

		let status =
			bulk_status(sources.len() as u32, sources_failed, candidates_considered, errors_count);
		let finalize = HistoryFinalize {
			history_id: history.history_id,
			status,
			candidates_considered,
			results_returned,
			errors_count,
			high_quality_count,
			error_message: (sources_failed > 0)
				.then(|| format!("{sources_failed} of {} sources failed.", sources.len())),
			completed_at: OffsetDateTime::now_utc(),
		};

		with_retry(&self.cfg.matching.retry, "history finalize", || {
			self.stores.matches.finalize_history(&finalize)
		})
		.await?;

		tracing::info!(
			history_id = %history.history_id,
			status = status.as_str(),
			sources_processed = sources.len(),
			sources_failed,
			results_returned,
			"Closed bulk match run."
		);

		Ok(BulkSummary {
			history_id: history.history_id,
			status,
			sources_processed: sources.len() as u32,
			sources_failed,
			candidates_considered,
			results_returned,
			errors_count,
			high_quality_count,
		})
	}

	async fn load_bulk_sources(&self, request: &BulkRequest) -> Result<Vec<Entity>> {
		with_retry(&self.cfg.matching.retry, "source pool load", || {
			self.stores.entities.list_pool(
				&request.tenant_id,
				request.direction.source_kind(),
				request.sources.ids(),
			)
		})
		.await
	}
}

fn bulk_status(
	sources_total: u32,
	sources_failed: u32,
	candidates_considered: u32,
	errors_count: u32,
) -> HistoryStatus {
	if sources_total == 0 {
		HistoryStatus::CompletedEmpty
	} else if sources_failed == sources_total {
		HistoryStatus::Failed
	} else if candidates_considered == 0 && sources_failed == 0 {
		HistoryStatus::CompletedEmpty
	} else if sources_failed > 0 || errors_count > 0 {
		HistoryStatus::CompletedWithErrors
	} else {
		HistoryStatus::Completed
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn bulk_status_covers_the_aggregate_shapes() {
		assert_eq!(bulk_status(0, 0, 0, 0), HistoryStatus::CompletedEmpty);
		assert_eq!(bulk_status(3, 3, 0, 0), HistoryStatus::Failed);
		assert_eq!(bulk_status(3, 0, 0, 0), HistoryStatus::CompletedEmpty);
		assert_eq!(bulk_status(3, 1, 10, 0), HistoryStatus::CompletedWithErrors);
		assert_eq!(bulk_status(3, 0, 10, 2), HistoryStatus::CompletedWithErrors);
		assert_eq!(bulk_status(3, 0, 10, 0), HistoryStatus::Completed);
	}
}
