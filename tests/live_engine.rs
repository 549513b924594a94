//! End-to-end checks against a running Meilisearch.
//!
//! Ignored by default. Start an engine (`MEILI_HTTP_ADDR`, default
//! `localhost:7700`, master key from `MEILI_MASTER_KEY`, default `masterKey`)
//! and run `cargo test -- --ignored`. Every test works on its own index and
//! deletes it afterwards.

use actix_web::{http::StatusCode, test, web, App};
use meili_gateway::backend::SearchBackend;
use meili_gateway::config::{AppConfig, ConfigCache};
use meili_gateway::error::AppError;
use meili_gateway::poller::TaskPoller;
use meili_gateway::search_clients::meilisearch::MeilisearchClient;
use meili_gateway::web_server::configure;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const SMALL_MOVIES: &str = include_str!("assets/small_movies.json");

fn live_cache() -> ConfigCache {
    ConfigCache::new(|| {
        let mut config = AppConfig::from_sources("config", None)?;
        if config.master_key.is_none() {
            config.master_key = Some("masterKey".to_string());
        }
        config.poll_timeout_ms = 10_000;
        Ok(config)
    })
}

fn live_backend() -> (Arc<dyn SearchBackend>, TaskPoller) {
    let cache = live_cache();
    let config = cache.get().unwrap();
    let poller = TaskPoller::from_config(&config);
    let client = MeilisearchClient::new(cache).unwrap();
    (Arc::new(client), poller)
}

fn small_movies() -> Vec<Value> {
    serde_json::from_str(SMALL_MOVIES).unwrap()
}

async fn index_with_movies(backend: &dyn SearchBackend, poller: &TaskPoller, uid: &str) {
    let info = backend.create_index(uid, Some("id")).await.unwrap();
    poller.wait_for_task(backend, info.task_uid).await.unwrap();
    let info = backend.add_documents(uid, &small_movies(), None).await.unwrap();
    poller.wait_for_task(backend, info.task_uid).await.unwrap();
    let info = backend
        .update_setting(
            uid,
            meili_gateway::models::Setting::FilterableAttributes,
            &json!(["genre"]),
        )
        .await
        .unwrap();
    poller.wait_for_task(backend, info.task_uid).await.unwrap();
}

async fn drop_index(backend: &dyn SearchBackend, poller: &TaskPoller, uid: &str) {
    match backend.delete_index(uid).await {
        Ok(info) => {
            if let Err(e) = poller.wait_for_task(backend, info.task_uid).await {
                log::warn!("Deleting index '{}' did not finish: {}", uid, e);
            }
        }
        Err(e) => log::warn!("Could not delete index '{}': {}", uid, e),
    }
}

#[tokio::test]
#[ignore = "needs a running Meilisearch"]
async fn created_then_deleted_index_leaves_no_trace() {
    let (backend, poller) = live_backend();
    let uid = "gateway_lifecycle";

    let info = backend.create_index(uid, None).await.unwrap();
    poller.wait_for_task(&*backend, info.task_uid).await.unwrap();
    assert_eq!(backend.get_index(uid).await.unwrap().uid, uid);

    let info = backend.delete_index(uid).await.unwrap();
    poller.wait_for_task(&*backend, info.task_uid).await.unwrap();

    match backend.get_index(uid).await {
        Err(AppError::BackendRejected { status, .. }) => assert_eq!(status, 404),
        other => panic!("index still visible: {:?}", other),
    }
}

#[tokio::test]
#[ignore = "needs a running Meilisearch"]
async fn duplicate_index_creation_fails_as_a_task() {
    let (backend, poller) = live_backend();
    let uid = "gateway_duplicate";

    let info = backend.create_index(uid, None).await.unwrap();
    poller.wait_for_task(&*backend, info.task_uid).await.unwrap();
    let info = backend.create_index(uid, None).await.unwrap();
    let err = poller
        .wait_for_task(&*backend, info.task_uid)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::TaskFailed { .. }), "{:?}", err);

    drop_index(backend.as_ref(), &poller, uid).await;
}

#[tokio::test]
#[ignore = "needs a running Meilisearch"]
async fn zero_budget_reports_timeout_not_failure() {
    let (backend, poller) = live_backend();
    let uid = "gateway_budget";

    // the first status read is still in flight when a zero budget runs out
    let info = backend.add_documents(uid, &small_movies(), Some("id")).await.unwrap();
    let err = poller
        .with_timeout(Duration::ZERO)
        .wait_for_task(&*backend, info.task_uid)
        .await
        .unwrap_err();
    assert!(
        matches!(err, AppError::PollTimeout { task_uid, .. } if task_uid == info.task_uid),
        "{:?}",
        err
    );
    poller.wait_for_task(&*backend, info.task_uid).await.unwrap();

    drop_index(backend.as_ref(), &poller, uid).await;
}

#[actix_web::test]
#[ignore = "needs a running Meilisearch"]
async fn searches_through_the_gateway() {
    let (backend, poller) = live_backend();
    let uid = "gateway_search";
    index_with_movies(backend.as_ref(), &poller, uid).await;

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(backend.clone()))
            .app_data(web::Data::new(live_cache()))
            .configure(configure),
    )
    .await;

    // placeholder search: default page of 20 out of 24
    let req = test::TestRequest::post()
        .uri("/search")
        .set_json(json!({ "uid": uid, "query": "" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["hits"].as_array().unwrap().len(), 20);
    assert_eq!(body["estimatedTotalHits"], 24);
    assert_eq!(body["query"], "");

    let req = test::TestRequest::post()
        .uri("/search")
        .set_json(json!({ "uid": uid, "query": "", "limit": 5 }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["hits"].as_array().unwrap().len(), 5);

    // facet filter narrows to the three action movies, without distribution
    let req = test::TestRequest::post()
        .uri("/search")
        .set_json(json!({
            "uid": uid,
            "query": "world",
            "facetFilters": [["genre:action"]],
            "attributesToRetrieve": ["title", "poster"]
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    let hits = body["hits"].as_array().unwrap();
    assert_eq!(hits.len(), 3);
    assert!(body["facetDistribution"].is_null());
    for hit in hits {
        assert!(hit.get("title").is_some());
        assert!(hit.get("poster").is_some());
        assert!(hit.get("overview").is_none());
        assert!(hit.get("release_date").is_none());
    }

    // distribution only when asked for
    let req = test::TestRequest::post()
        .uri("/search")
        .set_json(json!({ "uid": uid, "query": "world", "facetsDistribution": ["genre"] }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["facetDistribution"]["genre"]["action"], 3);
    assert_eq!(body["facetDistribution"]["genre"]["cartoon"], 1);
    assert_eq!(body["facetDistribution"]["genre"]["fantasy"], 1);

    drop_index(backend.as_ref(), &poller, uid).await;
}
