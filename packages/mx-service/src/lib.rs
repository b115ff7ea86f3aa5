pub mod bulk;
pub mod history;
pub mod one_to_many;
pub mod reconcile;
pub mod status_update;
pub mod stores;
pub mod types;

mod error;
mod orchestrate;

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use time::OffsetDateTime;
use uuid::Uuid;

pub use bulk::{BulkRequest, BulkSummary};
pub use error::{Error, Result};
use mx_domain::{Entity, EntityKind, MatchStatus};
pub use one_to_many::{OneToManyRequest, OneToManyResponse};
pub use stores::Stores;
pub use types::{
	Direction, HistoryFinalize, HistoryStatus, MatchHistory, MatchParams, MatchRecord, PoolSelector,
	RunMode,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Read access to the entity catalog. The engine never writes entities.
pub trait EntityStore
where
	Self: Send + Sync,
{
	fn fetch<'a>(
		&'a self,
		tenant_id: &'a str,
		entity_id: Uuid,
	) -> BoxFuture<'a, Result<Option<Entity>>>;

	fn list_pool<'a>(
		&'a self,
		tenant_id: &'a str,
		kind: EntityKind,
		ids: Option<&'a [Uuid]>,
	) -> BoxFuture<'a, Result<Vec<Entity>>>;
}

/// Delegated nearest-neighbor search over stored embeddings. Returns raw
/// cosine similarity in [-1, 1], best first; callers apply the same rescaling
/// as the in-process path so both paths agree on the semantic term.
pub trait SimilarityBackend
where
	Self: Send + Sync,
{
	fn nearest<'a>(
		&'a self,
		tenant_id: &'a str,
		kind: EntityKind,
		query: &'a [f32],
		ids: Option<&'a [Uuid]>,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<(Uuid, f32)>>>;
}

/// Persistence for run histories and match rows.
pub trait MatchStore
where
	Self: Send + Sync,
{
	fn insert_history<'a>(&'a self, history: &'a MatchHistory) -> BoxFuture<'a, Result<()>>;

	fn finalize_history<'a>(&'a self, finalize: &'a HistoryFinalize) -> BoxFuture<'a, Result<()>>;

	fn fetch_history<'a>(
		&'a self,
		tenant_id: &'a str,
		history_id: Uuid,
	) -> BoxFuture<'a, Result<Option<MatchHistory>>>;

	fn list_histories<'a>(
		&'a self,
		tenant_id: &'a str,
		limit: u32,
		offset: u32,
	) -> BoxFuture<'a, Result<Vec<MatchHistory>>>;

	fn insert_results<'a>(&'a self, records: &'a [MatchRecord]) -> BoxFuture<'a, Result<()>>;

	fn list_results<'a>(
		&'a self,
		tenant_id: &'a str,
		history_id: Uuid,
		limit: u32,
		offset: u32,
	) -> BoxFuture<'a, Result<Vec<MatchRecord>>>;

	fn fetch_result<'a>(
		&'a self,
		tenant_id: &'a str,
		match_id: Uuid,
	) -> BoxFuture<'a, Result<Option<MatchRecord>>>;

	/// Writes `status` only if the row still carries `expected`. `None` means
	/// the row is gone or another writer got there first; callers re-read and
	/// re-validate.
	fn update_result_status<'a>(
		&'a self,
		tenant_id: &'a str,
		match_id: Uuid,
		expected: MatchStatus,
		status: MatchStatus,
		updated_at: OffsetDateTime,
	) -> BoxFuture<'a, Result<Option<MatchRecord>>>;

	fn reconcile_stale_running<'a>(
		&'a self,
		cutoff: OffsetDateTime,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<u64>>;
}

#[derive(Clone)]
pub struct MatchService {
	pub cfg: Arc<mx_config::Config>,
	pub stores: Stores,
}
impl MatchService {
	pub fn new(cfg: mx_config::Config, stores: Stores) -> Self {
		Self { cfg: Arc::new(cfg), stores }
	}
}

pub(crate) fn backoff_for_attempt(retry: &mx_config::Retry, attempt: u32) -> Duration {
	let exponent = attempt.saturating_sub(1).min(16);
	let millis = retry.base_backoff_ms.saturating_mul(1_u64 << exponent).min(retry.max_backoff_ms);

	Duration::from_millis(millis)
}

/// Runs `op` up to `retry.max_attempts` times, sleeping an exponential
/// backoff between attempts. Only retryable failures are retried.
pub(crate) async fn with_retry<T, F, Fut>(
	retry: &mx_config::Retry,
	operation: &str,
	mut op: F,
) -> Result<T>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T>>,
{
	let mut attempt = 1;

	loop {
		match op().await {
			Ok(value) => return Ok(value),
			Err(err) if err.is_retryable() && attempt < retry.max_attempts => {
				let delay = backoff_for_attempt(retry, attempt);

				tracing::warn!(
					error = %err,
					attempt,
					delay_ms = delay.as_millis() as u64,
					"Retrying {operation}."
				);
				tokio::time::sleep(delay).await;

				attempt += 1;
			},
			Err(err) => return Err(err),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn retry() -> mx_config::Retry {
		mx_config::Retry { max_attempts: 3, base_backoff_ms: 200, max_backoff_ms: 5_000 }
	}

	#[test]
	fn backoff_doubles_and_caps() {
		let retry = retry();

		assert_eq!(backoff_for_attempt(&retry, 1), Duration::from_millis(200));
		assert_eq!(backoff_for_attempt(&retry, 2), Duration::from_millis(400));
		assert_eq!(backoff_for_attempt(&retry, 3), Duration::from_millis(800));
		assert_eq!(backoff_for_attempt(&retry, 10), Duration::from_millis(5_000));
	}

	#[tokio::test]
	async fn non_retryable_errors_fail_on_first_attempt() {
		let mut calls = 0_u32;
		let outcome: Result<()> = with_retry(&retry(), "test op", || {
			calls += 1;

			async { Err(Error::Storage { message: "boom".to_string() }) }
		})
		.await;

		assert!(matches!(outcome, Err(Error::Storage { .. })));
		assert_eq!(calls, 1);
	}

	#[tokio::test(start_paused = true)]
	async fn retryable_errors_exhaust_the_attempt_budget() {
		let mut calls = 0_u32;
		let outcome: Result<()> = with_retry(&retry(), "test op", || {
			calls += 1;

			async { Err(Error::BackendUnavailable { message: "down".to_string() }) }
		})
		.await;

		assert!(matches!(outcome, Err(Error::BackendUnavailable { .. })));
		assert_eq!(calls, 3);
	}
}
