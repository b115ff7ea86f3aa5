use axum::{
	Json, Router,
	extract::{Path, Query, State},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mx_domain::MatchStatus;
use mx_service::{
	BulkRequest, Error as ServiceError, MatchHistory, MatchRecord, OneToManyRequest,
	OneToManyResponse,
};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/match/one_to_many", post(one_to_many))
		.route("/v1/match/bulk", post(bulk))
		.route("/v1/match/history", get(list_histories))
		.route("/v1/match/history/{history_id}", get(get_history))
		.route("/v1/match/results/{history_id}", get(list_results))
		.route("/v1/match/status", put(update_status))
		.with_state(state)
}

pub fn admin_router(state: AppState) -> Router {
	Router::new().route("/v1/admin/reconcile_stale", post(reconcile_stale)).with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn one_to_many(
	State(state): State<AppState>,
	Json(payload): Json<OneToManyRequest>,
) -> Result<Json<OneToManyResponse>, ApiError> {
	let response = state.service.match_one_to_many(payload).await?;
	Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct BulkAccepted {
	history_id: Uuid,
}

/// Bulk runs are detached: the response carries only the history id, which is
/// immediately pollable through the history routes.
async fn bulk(
	State(state): State<AppState>,
	Json(payload): Json<BulkRequest>,
) -> Result<(StatusCode, Json<BulkAccepted>), ApiError> {
	let history_id = state.service.submit_bulk(payload).await?;
	Ok((StatusCode::ACCEPTED, Json(BulkAccepted { history_id })))
}

#[derive(Debug, Deserialize)]
struct TenantQuery {
	tenant_id: String,
}

#[derive(Debug, Deserialize)]
struct PageQuery {
	tenant_id: String,
	limit: Option<u32>,
	#[serde(default)]
	offset: u32,
}

async fn list_histories(
	State(state): State<AppState>,
	Query(query): Query<PageQuery>,
) -> Result<Json<Vec<MatchHistory>>, ApiError> {
	let histories =
		state.service.list_histories(&query.tenant_id, query.limit, query.offset).await?;
	Ok(Json(histories))
}

async fn get_history(
	State(state): State<AppState>,
	Path(history_id): Path<Uuid>,
	Query(query): Query<TenantQuery>,
) -> Result<Json<MatchHistory>, ApiError> {
	let history = state.service.history(&query.tenant_id, history_id).await?;
	Ok(Json(history))
}

async fn list_results(
	State(state): State<AppState>,
	Path(history_id): Path<Uuid>,
	Query(query): Query<PageQuery>,
) -> Result<Json<Vec<MatchRecord>>, ApiError> {
	let results = state
		.service
		.history_results(&query.tenant_id, history_id, query.limit, query.offset)
		.await?;
	Ok(Json(results))
}

#[derive(Debug, Deserialize)]
struct StatusUpdateRequest {
	tenant_id: String,
	match_id: Uuid,
	status: MatchStatus,
}

async fn update_status(
	State(state): State<AppState>,
	Json(payload): Json<StatusUpdateRequest>,
) -> Result<Json<MatchRecord>, ApiError> {
	let record = state
		.service
		.update_match_status(&payload.tenant_id, payload.match_id, payload.status)
		.await?;
	Ok(Json(record))
}

#[derive(Debug, Serialize)]
struct ReconcileReport {
	reconciled: u64,
}

async fn reconcile_stale(
	State(state): State<AppState>,
) -> Result<Json<ReconcileReport>, ApiError> {
	let reconciled = state.service.reconcile_stale_runs(time::OffsetDateTime::now_utc()).await?;
	Ok(Json(ReconcileReport { reconciled }))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: &'static str,
	message: String,
}

impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		let (status, error_code) = match &err {
			ServiceError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
			ServiceError::InvalidTransition { .. } => (StatusCode::CONFLICT, "invalid_transition"),
			ServiceError::InvalidRequest { .. } =>
				(StatusCode::UNPROCESSABLE_ENTITY, "invalid_request"),
			ServiceError::InvalidWeightConfiguration { .. } =>
				(StatusCode::UNPROCESSABLE_ENTITY, "invalid_weight_configuration"),
			ServiceError::BackendUnavailable { .. } =>
				(StatusCode::SERVICE_UNAVAILABLE, "backend_unavailable"),
			ServiceError::EmbeddingDimensionMismatch { .. } | ServiceError::Storage { .. } =>
				(StatusCode::INTERNAL_SERVER_ERROR, "internal"),
		};

		Self { status, error_code, message: err.to_string() }
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body =
			ErrorBody { error_code: self.error_code.to_string(), message: self.message };

		(self.status, Json(body)).into_response()
	}
}
