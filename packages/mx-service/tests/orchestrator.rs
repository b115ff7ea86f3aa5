use std::collections::BTreeMap;

use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use mx_domain::{MatchStatus, Proficiency, QualityTier};
use mx_service::{
	BulkRequest, Direction, Error, HistoryStatus, MatchService, MatchStore, OneToManyRequest,
	PoolSelector,
};
use mx_testkit::{EntityBuilder, InMemoryStores, test_config, test_service};

const TENANT: &str = "acme";

fn request_entity() -> EntityBuilder {
	EntityBuilder::request(TENANT)
		.id(1)
		.skills(&["go", "sql"])
		.experience(3.0)
		.proficiency(Proficiency::Advanced)
		.location("shibuya", Some("tokyo"))
		.embedding(&[1.0, 0.0, 0.0, 0.0])
}

fn one_to_many(source_id: u128) -> OneToManyRequest {
	OneToManyRequest {
		tenant_id: TENANT.to_string(),
		source_id: Uuid::from_u128(source_id),
		direction: Direction::RequestToCandidates,
		pool: PoolSelector::AllActive,
		params: Default::default(),
	}
}

#[tokio::test]
async fn one_to_many_persists_ranked_proposed_matches() {
	let (service, stores) = test_service();

	stores.insert_entity(request_entity().build());
	stores.insert_entity(
		EntityBuilder::candidate(TENANT)
			.id(10)
			.skills(&["go", "sql", "python"])
			.experience(5.0)
			.proficiency(Proficiency::Advanced)
			.location("shibuya", Some("tokyo"))
			.embedding(&[1.0, 0.0, 0.0, 0.0])
			.build(),
	);
	stores.insert_entity(
		EntityBuilder::candidate(TENANT)
			.id(11)
			.skills(&["go"])
			.experience(1.0)
			.embedding(&[0.0, 1.0, 0.0, 0.0])
			.build(),
	);

	let response = service.match_one_to_many(one_to_many(1)).await.expect("expected a run");

	assert_eq!(response.status, HistoryStatus::Completed);
	assert_eq!(response.candidates_considered, 2);
	assert_eq!(response.errors_count, 0);
	assert_eq!(response.matches.len(), 2);
	// The full-coverage candidate outranks the partial one.
	assert_eq!(response.matches[0].candidate_id, Uuid::from_u128(10));
	assert_eq!(response.matches[0].tier, QualityTier::High);
	assert_eq!(response.matches[0].overlapping_skills, vec!["go", "sql"]);
	assert!(response.matches.iter().all(|m| m.status == MatchStatus::Proposed));

	let history = stores.history(response.history_id).expect("expected a history row");

	assert_eq!(history.status, HistoryStatus::Completed);
	assert_eq!(history.results_returned, 2);
	assert_eq!(history.high_quality_count, response.high_quality_count);
	assert!(history.completed_at.is_some());
	assert_eq!(stores.results_for(response.history_id).len(), 2);
}

#[tokio::test]
async fn repeated_runs_rank_identically() {
	let (service, stores) = test_service();

	stores.insert_entity(request_entity().build());

	for id in 20..30_u128 {
		stores.insert_entity(
			EntityBuilder::candidate(TENANT)
				.id(id)
				.skills(&["go"])
				.experience((id % 7) as f32)
				.embedding(&[0.5, (id % 3) as f32 * 0.1, 0.0, 0.0])
				.build(),
		);
	}

	let first = service.match_one_to_many(one_to_many(1)).await.expect("expected a run");
	let second = service.match_one_to_many(one_to_many(1)).await.expect("expected a run");
	let order =
		|response: &mx_service::OneToManyResponse| -> Vec<(Uuid, f32)> {
			response.matches.iter().map(|m| (m.candidate_id, m.composite_score)).collect()
		};

	assert_eq!(order(&first), order(&second));
}

#[tokio::test]
async fn corrupt_embedding_is_isolated_per_candidate() {
	let (service, stores) = test_service();

	stores.insert_entity(request_entity().build());
	stores.insert_entity(
		EntityBuilder::candidate(TENANT)
			.id(10)
			.skills(&["go"])
			.embedding(&[1.0, 0.0, 0.0, 0.0])
			.build(),
	);
	// Wrong dimension; scoring this candidate must fail without aborting the run.
	stores.insert_entity(
		EntityBuilder::candidate(TENANT).id(11).skills(&["go"]).embedding(&[1.0, 0.0]).build(),
	);

	let response = service.match_one_to_many(one_to_many(1)).await.expect("expected a run");

	assert_eq!(response.status, HistoryStatus::CompletedWithErrors);
	assert_eq!(response.candidates_considered, 2);
	assert_eq!(response.errors_count, 1);
	assert_eq!(response.matches.len(), 1);
	assert_eq!(response.matches[0].candidate_id, Uuid::from_u128(10));
}

#[tokio::test]
async fn every_candidate_failing_marks_the_run_failed() {
	let (service, stores) = test_service();

	stores.insert_entity(request_entity().build());
	stores.insert_entity(
		EntityBuilder::candidate(TENANT).id(10).embedding(&[1.0]).build(),
	);

	let response = service.match_one_to_many(one_to_many(1)).await.expect("expected a run");

	assert_eq!(response.status, HistoryStatus::Failed);
	assert!(response.matches.is_empty());

	let history = stores.history(response.history_id).expect("expected a history row");

	assert_eq!(history.status, HistoryStatus::Failed);
	assert!(history.error_message.is_some());
}

#[tokio::test]
async fn empty_pool_completes_empty_with_zero_counts() {
	let (service, stores) = test_service();

	stores.insert_entity(request_entity().build());

	let response = service.match_one_to_many(one_to_many(1)).await.expect("expected a run");

	assert_eq!(response.status, HistoryStatus::CompletedEmpty);
	assert_eq!(response.candidates_considered, 0);
	assert_eq!(response.errors_count, 0);
	assert!(response.matches.is_empty());
}

#[tokio::test]
async fn inactive_candidates_are_excluded_from_the_pool() {
	let (service, stores) = test_service();

	stores.insert_entity(request_entity().build());
	stores.insert_entity(
		EntityBuilder::candidate(TENANT)
			.id(10)
			.skills(&["go", "sql"])
			.embedding(&[1.0, 0.0, 0.0, 0.0])
			.inactive()
			.build(),
	);

	let response = service.match_one_to_many(one_to_many(1)).await.expect("expected a run");

	assert_eq!(response.status, HistoryStatus::CompletedEmpty);
}

#[tokio::test]
async fn unknown_source_is_not_found_before_any_history_is_written() {
	let (service, _stores) = test_service();
	let outcome = service.match_one_to_many(one_to_many(99)).await;

	assert!(matches!(outcome, Err(Error::NotFound { .. })));
}

#[tokio::test]
async fn source_kind_must_match_the_direction() {
	let (service, stores) = test_service();

	stores.insert_entity(EntityBuilder::candidate(TENANT).id(1).build());

	let outcome = service.match_one_to_many(one_to_many(1)).await;

	assert!(matches!(outcome, Err(Error::InvalidRequest { .. })));
}

#[tokio::test]
async fn invalid_weights_are_rejected_before_scoring() {
	let (service, stores) = test_service();

	stores.insert_entity(request_entity().build());

	let mut request = one_to_many(1);

	request.params.weights =
		Some([("charisma".to_string(), 1.0)].into_iter().collect::<BTreeMap<_, _>>());

	let outcome = service.match_one_to_many(request).await;

	assert!(matches!(outcome, Err(Error::InvalidWeightConfiguration { .. })));
}

#[tokio::test]
async fn min_score_and_max_results_shape_the_output() {
	let (service, stores) = test_service();

	stores.insert_entity(request_entity().build());

	for id in 10..20_u128 {
		stores.insert_entity(
			EntityBuilder::candidate(TENANT)
				.id(id)
				.skills(&["go", "sql"])
				.experience(5.0)
				.proficiency(Proficiency::Advanced)
				.location("shibuya", Some("tokyo"))
				.embedding(&[1.0, 0.0, 0.0, 0.0])
				.build(),
		);
	}

	let mut request = one_to_many(1);

	request.params.min_score = Some(0.9);
	request.params.max_results = Some(3);

	let response = service.match_one_to_many(request).await.expect("expected a run");

	assert_eq!(response.matches.len(), 3);
	assert!(response.matches.iter().all(|m| m.composite_score >= 0.9));
	assert_eq!(response.candidates_considered, 10);
}

#[tokio::test]
async fn transient_pool_failures_are_retried_within_budget() {
	let (service, stores) = test_service();

	stores.insert_entity(request_entity().build());
	stores.insert_entity(
		EntityBuilder::candidate(TENANT)
			.id(10)
			.skills(&["go"])
			.embedding(&[1.0, 0.0, 0.0, 0.0])
			.build(),
	);
	stores.fail_pool_loads(2);

	let response = service.match_one_to_many(one_to_many(1)).await.expect("expected a run");

	assert_eq!(response.status, HistoryStatus::Completed);
}

#[tokio::test]
async fn exhausted_retries_fail_the_run_and_the_history() {
	let (service, stores) = test_service();

	stores.insert_entity(request_entity().build());
	stores.fail_pool_loads(3);

	let outcome = service.match_one_to_many(one_to_many(1)).await;

	assert!(matches!(outcome, Err(Error::BackendUnavailable { .. })));

	let histories =
		service.list_histories(TENANT, None, 0).await.expect("expected a history page");

	assert_eq!(histories.len(), 1);
	assert_eq!(histories[0].status, HistoryStatus::Failed);
}

#[tokio::test]
async fn status_updates_follow_the_lifecycle() {
	let (service, stores) = test_service();

	stores.insert_entity(request_entity().build());
	stores.insert_entity(
		EntityBuilder::candidate(TENANT)
			.id(10)
			.skills(&["go"])
			.embedding(&[1.0, 0.0, 0.0, 0.0])
			.build(),
	);

	let response = service.match_one_to_many(one_to_many(1)).await.expect("expected a run");
	let match_id = response.matches[0].match_id;

	for target in [MatchStatus::Saved, MatchStatus::Contacted, MatchStatus::Closed] {
		let updated = service
			.update_match_status(TENANT, match_id, target)
			.await
			.expect("expected a legal transition");

		assert_eq!(updated.status, target);
	}

	// Closed is terminal.
	let outcome = service.update_match_status(TENANT, match_id, MatchStatus::Saved).await;

	assert!(matches!(
		outcome,
		Err(Error::InvalidTransition { from: MatchStatus::Closed, to: MatchStatus::Saved })
	));

	// Same-state updates stay idempotent.
	let updated = service
		.update_match_status(TENANT, match_id, MatchStatus::Closed)
		.await
		.expect("expected an idempotent success");

	assert_eq!(updated.status, MatchStatus::Closed);
}

#[tokio::test]
async fn skipping_the_lifecycle_is_rejected() {
	let (service, stores) = test_service();

	stores.insert_entity(request_entity().build());
	stores.insert_entity(
		EntityBuilder::candidate(TENANT)
			.id(10)
			.skills(&["go"])
			.embedding(&[1.0, 0.0, 0.0, 0.0])
			.build(),
	);

	let response = service.match_one_to_many(one_to_many(1)).await.expect("expected a run");
	let match_id = response.matches[0].match_id;
	let outcome = service.update_match_status(TENANT, match_id, MatchStatus::Contacted).await;

	assert!(matches!(
		outcome,
		Err(Error::InvalidTransition { from: MatchStatus::Proposed, to: MatchStatus::Contacted })
	));
}

#[tokio::test]
async fn bulk_continues_past_failing_sources() {
	let (service, stores) = test_service();

	stores.insert_entity(request_entity().build());
	stores.insert_entity(
		EntityBuilder::request(TENANT)
			.id(2)
			.skills(&["rust"])
			.embedding(&[0.0, 1.0, 0.0, 0.0])
			.build(),
	);
	stores.insert_entity(
		EntityBuilder::candidate(TENANT)
			.id(10)
			.skills(&["go", "sql", "rust"])
			.experience(5.0)
			.proficiency(Proficiency::Advanced)
			.location("shibuya", Some("tokyo"))
			.embedding(&[1.0, 0.0, 0.0, 0.0])
			.build(),
	);

	let summary = service
		.match_bulk(BulkRequest {
			tenant_id: TENANT.to_string(),
			direction: Direction::RequestToCandidates,
			sources: PoolSelector::AllActive,
			pool: PoolSelector::AllActive,
			params: Default::default(),
			top_matches_only: true,
		})
		.await
		.expect("expected a bulk run");

	assert_eq!(summary.status, HistoryStatus::Completed);
	assert_eq!(summary.sources_processed, 2);
	assert_eq!(summary.sources_failed, 0);
	assert_eq!(summary.results_returned, 2);

	// Both sources' matches hang off the single bulk history.
	let records = stores.results_for(summary.history_id);
	let mut source_ids: Vec<Uuid> = records.iter().map(|r| r.source_id).collect();

	source_ids.sort();
	source_ids.dedup();

	assert_eq!(source_ids, vec![Uuid::from_u128(1), Uuid::from_u128(2)]);
}

#[tokio::test]
async fn bulk_with_no_sources_completes_empty() {
	let (service, _stores) = test_service();
	let summary = service
		.match_bulk(BulkRequest {
			tenant_id: TENANT.to_string(),
			direction: Direction::RequestToCandidates,
			sources: PoolSelector::AllActive,
			pool: PoolSelector::AllActive,
			params: Default::default(),
			top_matches_only: true,
		})
		.await
		.expect("expected a bulk run");

	assert_eq!(summary.status, HistoryStatus::CompletedEmpty);
	assert_eq!(summary.sources_processed, 0);
}

#[tokio::test]
async fn bulk_without_top_matches_only_persists_below_threshold_rows() {
	let (service, stores) = test_service();

	stores.insert_entity(request_entity().build());
	// Scores far below the 0.9 cut: barely any skill overlap, opposed embedding.
	stores.insert_entity(
		EntityBuilder::candidate(TENANT)
			.id(10)
			.skills(&["cobol"])
			.embedding(&[-1.0, 0.0, 0.0, 0.0])
			.build(),
	);

	let mut request = BulkRequest {
		tenant_id: TENANT.to_string(),
		direction: Direction::RequestToCandidates,
		sources: PoolSelector::Ids(vec![Uuid::from_u128(1)]),
		pool: PoolSelector::AllActive,
		params: Default::default(),
		top_matches_only: true,
	};

	request.params.min_score = Some(0.9);

	let capped = service.match_bulk(request.clone()).await.expect("expected a bulk run");

	assert_eq!(capped.results_returned, 0);

	request.top_matches_only = false;

	let full = service.match_bulk(request).await.expect("expected a bulk run");

	assert_eq!(full.results_returned, 1);
	assert_eq!(stores.results_for(full.history_id).len(), 1);
}

#[tokio::test]
async fn accelerated_and_brute_force_paths_rank_identically() {
	let stores = InMemoryStores::new();
	let brute = MatchService::new(test_config(), stores.as_stores());
	let mut cfg = test_config();

	cfg.matching.accelerated_pool_threshold = 3;

	let accelerated = MatchService::new(cfg, stores.as_stores());

	stores.insert_entity(request_entity().build());
	// Perfect structured fit with no stored embedding; must survive both
	// paths with semantic 0.
	stores.insert_entity(
		EntityBuilder::candidate(TENANT)
			.id(10)
			.skills(&["go", "sql"])
			.experience(5.0)
			.proficiency(Proficiency::Advanced)
			.location("shibuya", Some("tokyo"))
			.build(),
	);

	for (id, x) in [(11_u128, 1.0_f32), (12, 0.5), (13, -1.0)] {
		stores.insert_entity(
			EntityBuilder::candidate(TENANT)
				.id(id)
				.skills(&["go"])
				.embedding(&[x, (1.0 - x.abs()).max(0.0), 0.0, 0.0])
				.build(),
		);
	}

	let baseline = brute.match_one_to_many(one_to_many(1)).await.expect("expected a run");
	let fast = accelerated.match_one_to_many(one_to_many(1)).await.expect("expected a run");
	let order = |response: &mx_service::OneToManyResponse| -> Vec<(Uuid, f32, f32)> {
		response
			.matches
			.iter()
			.map(|m| (m.candidate_id, m.composite_score, m.semantic_score))
			.collect()
	};

	assert_eq!(baseline.matches.len(), 4);
	assert_eq!(order(&baseline), order(&fast));
	assert_eq!(fast.matches[0].candidate_id, Uuid::from_u128(10));
}

#[tokio::test]
async fn filtered_candidates_are_not_charged_scoring_errors() {
	let (service, stores) = test_service();

	stores.insert_entity(request_entity().build());
	stores.insert_entity(
		EntityBuilder::candidate(TENANT)
			.id(10)
			.skills(&["go", "sql"])
			.proficiency(Proficiency::Expert)
			.embedding(&[1.0, 0.0, 0.0, 0.0])
			.build(),
	);
	// Excluded by the hard filter; its corrupt embedding must never be scored.
	stores.insert_entity(
		EntityBuilder::candidate(TENANT)
			.id(11)
			.skills(&["go"])
			.proficiency(Proficiency::Basic)
			.embedding(&[1.0, 0.0])
			.build(),
	);

	let mut request = one_to_many(1);

	request.params.filters.proficiency_in = Some(vec![Proficiency::Expert]);

	let response = service.match_one_to_many(request).await.expect("expected a run");

	assert_eq!(response.status, HistoryStatus::Completed);
	assert_eq!(response.errors_count, 0);
	assert_eq!(response.matches.len(), 1);
	assert_eq!(response.matches[0].candidate_id, Uuid::from_u128(10));
}

#[tokio::test]
async fn status_writes_are_conditional_on_the_observed_status() {
	let (service, stores) = test_service();

	stores.insert_entity(request_entity().build());
	stores.insert_entity(
		EntityBuilder::candidate(TENANT)
			.id(10)
			.skills(&["go"])
			.embedding(&[1.0, 0.0, 0.0, 0.0])
			.build(),
	);

	let response = service.match_one_to_many(one_to_many(1)).await.expect("expected a run");
	let match_id = response.matches[0].match_id;

	// A stale guard never wins against the row's actual status.
	let stale = stores
		.update_result_status(
			TENANT,
			match_id,
			MatchStatus::Saved,
			MatchStatus::Contacted,
			OffsetDateTime::now_utc(),
		)
		.await
		.expect("expected a store write");

	assert!(stale.is_none());

	service
		.update_match_status(TENANT, match_id, MatchStatus::Dismissed)
		.await
		.expect("expected a legal transition");

	// A writer that lost the race sees the re-validated outcome, not an
	// overwrite of the winner.
	let outcome = service.update_match_status(TENANT, match_id, MatchStatus::Saved).await;

	assert!(matches!(
		outcome,
		Err(Error::InvalidTransition { from: MatchStatus::Dismissed, to: MatchStatus::Saved })
	));
	assert_eq!(stores.results_for(response.history_id)[0].status, MatchStatus::Dismissed);
}

#[tokio::test]
async fn stale_running_histories_are_reconciled_to_failed() {
	let (service, stores) = test_service();
	let now = OffsetDateTime::now_utc();
	let stale = mx_service::MatchHistory {
		history_id: Uuid::from_u128(500),
		tenant_id: TENANT.to_string(),
		mode: mx_service::RunMode::OneToMany,
		direction: Direction::RequestToCandidates,
		params: serde_json::json!({}),
		status: HistoryStatus::Running,
		candidates_considered: 0,
		results_returned: 0,
		errors_count: 0,
		high_quality_count: 0,
		error_message: None,
		started_at: now - Duration::hours(2),
		completed_at: None,
	};
	let fresh = mx_service::MatchHistory {
		history_id: Uuid::from_u128(501),
		started_at: now,
		..stale.clone()
	};

	stores.insert_history(&stale).await.expect("expected an insert");
	stores.insert_history(&fresh).await.expect("expected an insert");

	let affected = service.reconcile_stale_runs(now).await.expect("expected a sweep");

	assert_eq!(affected, 1);
	assert_eq!(stores.history(stale.history_id).map(|h| h.status), Some(HistoryStatus::Failed));
	assert_eq!(stores.history(fresh.history_id).map(|h| h.status), Some(HistoryStatus::Running));
}

#[tokio::test]
async fn histories_and_results_page_through_the_audit_surface() {
	let (service, stores) = test_service();

	stores.insert_entity(request_entity().build());

	for id in 10..15_u128 {
		stores.insert_entity(
			EntityBuilder::candidate(TENANT)
				.id(id)
				.skills(&["go", "sql"])
				.embedding(&[1.0, 0.0, 0.0, 0.0])
				.build(),
		);
	}

	let response = service.match_one_to_many(one_to_many(1)).await.expect("expected a run");
	let page = service
		.history_results(TENANT, response.history_id, Some(2), 0)
		.await
		.expect("expected a result page");
	let rest = service
		.history_results(TENANT, response.history_id, Some(10), 2)
		.await
		.expect("expected a result page");

	assert_eq!(page.len(), 2);
	assert_eq!(rest.len(), 3);

	// Unknown history reads as not-found, not an empty page.
	let outcome = service.history_results(TENANT, Uuid::from_u128(9_999), None, 0).await;

	assert!(matches!(outcome, Err(Error::NotFound { .. })));

	// Another tenant's audit surface never sees this run.
	let foreign = service.list_histories("other", None, 0).await.expect("expected a page");

	assert!(foreign.is_empty());
}
