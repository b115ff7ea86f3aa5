use time::{Duration, OffsetDateTime};

use crate::{MatchService, Result, with_retry};

impl MatchService {
	/// Fails any history still marked running past the stale timeout. Covers
	/// runs whose process died between opening and finalizing a history.
	/// Returns the number of rows reconciled.
	pub async fn reconcile_stale_runs(&self, now: OffsetDateTime) -> Result<u64> {
		let cutoff = now - Duration::seconds(self.cfg.matching.stale_run_timeout_secs as i64);
		let affected = with_retry(&self.cfg.matching.retry, "stale run reconcile", || {
			self.stores.matches.reconcile_stale_running(cutoff, now)
		})
		.await?;

		if affected > 0 {
			tracing::info!(affected, "Reconciled stale running match histories.");
		}

		Ok(affected)
	}
}
