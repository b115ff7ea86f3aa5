use time::OffsetDateTime;
use uuid::Uuid;

use mx_domain::MatchStatus;

use crate::{MatchService, Result, types::MatchRecord, with_retry};

impl MatchService {
	/// Moves a match through its lifecycle. Legality is checked against the
	/// current row, and the write is conditional on that observed status so a
	/// concurrent transition cannot be overwritten; losing the race re-reads
	/// and re-validates. A same-state update succeeds without touching
	/// storage so callers can retry safely.
	pub async fn update_match_status(
		&self,
		tenant_id: &str,
		match_id: Uuid,
		target: MatchStatus,
	) -> Result<MatchRecord> {
		let mut current = self.match_record(tenant_id, match_id).await?;

		loop {
			current.status.transition(target)?;

			if current.status == target {
				return Ok(current);
			}

			let updated = with_retry(&self.cfg.matching.retry, "status update", || {
				self.stores.matches.update_result_status(
					tenant_id,
					match_id,
					current.status,
					target,
					OffsetDateTime::now_utc(),
				)
			})
			.await?;

			let Some(updated) = updated else {
				// The row vanished or another writer moved it; the re-read
				// decides which.
				current = self.match_record(tenant_id, match_id).await?;

				continue;
			};

			tracing::info!(
				match_id = %match_id,
				from = current.status.as_str(),
				to = target.as_str(),
				"Updated match status."
			);

			return Ok(updated);
		}
	}
}
