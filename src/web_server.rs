use crate::backend::SearchBackend;
use crate::config::{AppConfig, ConfigCache};
use crate::error::AppError;
use crate::routes::{documents, indexes, meilisearch, search, settings};
use actix_web::{middleware, web, App, HttpServer};
use std::sync::Arc;

/// Bulk document payloads can be large; this matches the engine's own limit.
const MAX_PAYLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Registers every route group plus extractor error handlers that turn
/// malformed input into `400` responses.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(MAX_PAYLOAD_BYTES)
            .error_handler(|err, _req| {
                log::debug!("Rejected JSON body: {}", err);
                AppError::Validation(err.to_string()).into()
            }),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| AppError::Validation(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|err, _req| AppError::Validation(err.to_string()).into()),
    )
    .service(web::scope("/documents").configure(documents::configure))
    .service(web::scope("/indexes").configure(indexes::configure))
    .service(web::scope("/meilisearch").configure(meilisearch::configure))
    .service(web::scope("/search").configure(search::configure))
    .service(web::scope("/settings").configure(settings::configure));
}

pub async fn start_web_server(
    config: Arc<AppConfig>,
    backend: Arc<dyn SearchBackend>,
    cache: ConfigCache,
) -> std::io::Result<()> {
    let port = config.web_port;
    let backend_data = web::Data::new(backend);
    let config_data = web::Data::new(cache);

    log::info!("Starting web server on port: {}", port);
    log::debug!(
        "Task waits poll every {:?} for {:?} by default, {:?} at most.",
        config.poll_interval(),
        config.poll_timeout(),
        config.poll_max_timeout()
    );

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(backend_data.clone())
            .app_data(config_data.clone())
            .configure(configure)
    })
    .bind(format!("0.0.0.0:{}", port))?
    .run()
    .await
}

#[cfg(test)]
pub(crate) fn test_state_for_addr(
    addr: &str,
) -> (web::Data<Arc<dyn SearchBackend>>, web::Data<ConfigCache>) {
    use crate::config::test_config;
    use crate::search_clients::meilisearch::MeilisearchClient;

    let cache = ConfigCache::fixed(test_config(addr));
    let client = MeilisearchClient::new(cache.clone()).unwrap();
    let backend: Arc<dyn SearchBackend> = Arc::new(client);
    (web::Data::new(backend), web::Data::new(cache))
}

#[cfg(test)]
pub(crate) fn test_state(
    server: &wiremock::MockServer,
) -> (web::Data<Arc<dyn SearchBackend>>, web::Data<ConfigCache>) {
    test_state_for_addr(&server.uri())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test};
    use serde_json::json;

    #[actix_web::test]
    async fn malformed_json_is_a_validation_error() {
        let (backend, config) = test_state_for_addr("127.0.0.1:1");
        let app = test::init_service(App::new().app_data(backend).app_data(config).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/search")
            .insert_header(("content-type", "application/json"))
            .set_payload("{ \"uid\": ")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().starts_with("Invalid request"));
    }

    #[actix_web::test]
    async fn bad_query_string_is_a_validation_error() {
        let (backend, config) = test_state_for_addr("127.0.0.1:1");
        let app = test::init_service(App::new().app_data(backend).app_data(config).configure(configure)).await;

        let req = test::TestRequest::post()
            .uri("/indexes?wait=maybe")
            .set_json(json!({ "uid": "indexUID" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }
}
