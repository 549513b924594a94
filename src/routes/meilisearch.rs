use super::{BackendData, ConfigData, WaitParams};
use crate::backend::SearchBackend;
use crate::error::AppError;
use crate::models::{KeyRequest, Pagination, TasksQuery};
use crate::views;
use actix_web::{web, HttpResponse};

async fn health(backend: BackendData) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(views::health(&backend.health().await?)))
}

async fn version(backend: BackendData) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(views::version(&backend.version().await?)))
}

async fn stats(backend: BackendData) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(views::stats(&backend.stats().await?)))
}

async fn list_tasks(
    backend: BackendData,
    query: web::Query<TasksQuery>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(views::tasks(&backend.list_tasks(&query).await?)))
}

async fn get_task(
    backend: BackendData,
    path: web::Path<u32>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(views::task(&backend.get_task(path.into_inner()).await?)))
}

/// Blocks the request until the task finishes or the budget runs out.
async fn wait_for_task(
    backend: BackendData,
    config: ConfigData,
    path: web::Path<u32>,
    params: web::Query<WaitParams>,
) -> Result<HttpResponse, AppError> {
    let task_uid = path.into_inner();
    let poller = params.poller(&*config.get()?);
    let source: &dyn SearchBackend = backend.get_ref().as_ref();
    let task = poller.wait_for_task(source, task_uid).await?;
    Ok(HttpResponse::Ok().json(views::task(&task)))
}

async fn list_keys(
    backend: BackendData,
    page: web::Query<Pagination>,
) -> Result<HttpResponse, AppError> {
    let keys = backend.list_keys(*page).await?;
    Ok(HttpResponse::Ok().json(views::page(&keys, views::key)))
}

async fn get_key(
    backend: BackendData,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(views::key(&backend.get_key(&path).await?)))
}

async fn create_key(
    backend: BackendData,
    body: web::Json<KeyRequest>,
) -> Result<HttpResponse, AppError> {
    if body.actions.is_empty() || body.indexes.is_empty() {
        return Err(AppError::validation(
            "a key needs at least one action and one index",
        ));
    }
    Ok(HttpResponse::Created().json(views::key(&backend.create_key(&body).await?)))
}

async fn delete_key(
    backend: BackendData,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    backend.delete_key(&path).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(health)))
        .service(web::resource("/version").route(web::get().to(version)))
        .service(web::resource("/stats").route(web::get().to(stats)))
        .service(web::resource("/tasks").route(web::get().to(list_tasks)))
        .service(web::resource("/tasks/{task_uid}").route(web::get().to(get_task)))
        .service(web::resource("/tasks/{task_uid}/wait").route(web::get().to(wait_for_task)))
        .service(
            web::resource("/keys")
                .route(web::get().to(list_keys))
                .route(web::post().to(create_key)),
        )
        .service(
            web::resource("/keys/{key}")
                .route(web::get().to(get_key))
                .route(web::delete().to(delete_key)),
        );
}
