use uuid::Uuid;

use crate::{
	Error, MatchService, Result,
	types::{MatchHistory, MatchRecord},
	with_retry,
};

/// Audit read surface: histories and their persisted match rows.
impl MatchService {
	pub async fn history(&self, tenant_id: &str, history_id: Uuid) -> Result<MatchHistory> {
		with_retry(&self.cfg.matching.retry, "history fetch", || {
			self.stores.matches.fetch_history(tenant_id, history_id)
		})
		.await?
		.ok_or_else(|| Error::NotFound {
			message: format!("Match history {history_id} not found for tenant {tenant_id}."),
		})
	}

	/// Most recent runs first. The page size is capped by
	/// `matching.history_page_limit`.
	pub async fn list_histories(
		&self,
		tenant_id: &str,
		limit: Option<u32>,
		offset: u32,
	) -> Result<Vec<MatchHistory>> {
		let cap = self.cfg.matching.history_page_limit;
		let limit = limit.unwrap_or(cap).min(cap);

		if limit == 0 {
			return Err(Error::InvalidRequest {
				message: "limit must be greater than zero.".to_string(),
			});
		}

		with_retry(&self.cfg.matching.retry, "history list", || {
			self.stores.matches.list_histories(tenant_id, limit, offset)
		})
		.await
	}

	/// Pages a run's results in presentation order. The history must exist so
	/// an unknown id reads as not-found instead of an empty page.
	pub async fn history_results(
		&self,
		tenant_id: &str,
		history_id: Uuid,
		limit: Option<u32>,
		offset: u32,
	) -> Result<Vec<MatchRecord>> {
		let limit = limit.unwrap_or(self.cfg.matching.default_max_results);

		if limit == 0 {
			return Err(Error::InvalidRequest {
				message: "limit must be greater than zero.".to_string(),
			});
		}

		self.history(tenant_id, history_id).await?;

		with_retry(&self.cfg.matching.retry, "result list", || {
			self.stores.matches.list_results(tenant_id, history_id, limit, offset)
		})
		.await
	}

	pub async fn match_record(&self, tenant_id: &str, match_id: Uuid) -> Result<MatchRecord> {
		with_retry(&self.cfg.matching.retry, "match fetch", || {
			self.stores.matches.fetch_result(tenant_id, match_id)
		})
		.await?
		.ok_or_else(|| Error::NotFound {
			message: format!("Match {match_id} not found for tenant {tenant_id}."),
		})
	}
}
