use std::time::Duration;

use time::OffsetDateTime;
use tokio::time as tokio_time;

use mx_service::MatchService;

use crate::Result;

const SWEEP_INTERVAL_SECONDS: u64 = 60;

pub struct WorkerState {
	pub service: MatchService,
}

/// Periodic reconciliation loop. A run whose process died between opening
/// and finalizing its history stays `running` forever; the sweep fails those
/// rows once they pass the stale timeout.
pub async fn run_worker(state: WorkerState) -> color_eyre::Result<()> {
	tracing::info!(interval_secs = SWEEP_INTERVAL_SECONDS, "Stale run sweeper started.");

	loop {
		if let Err(err) = sweep_once(&state).await {
			tracing::error!(error = %err, "Stale run sweep failed.");
		}

		tokio_time::sleep(Duration::from_secs(SWEEP_INTERVAL_SECONDS)).await;
	}
}

async fn sweep_once(state: &WorkerState) -> Result<()> {
	state.service.reconcile_stale_runs(OffsetDateTime::now_utc()).await?;

	Ok(())
}
