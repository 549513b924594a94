use super::{task_response, BackendData, ConfigData, WaitParams};
use crate::error::AppError;
use crate::models::{validate_index_uid, Pagination, Setting};
use crate::views;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIndexBody {
    pub uid: String,
    #[serde(default, alias = "primary_key")]
    pub primary_key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateIndexBody {
    pub uid: String,
    #[serde(alias = "primary_key")]
    pub primary_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetingBody {
    pub uid: String,
    #[serde(alias = "attributes_for_faceting")]
    pub attributes_for_faceting: Vec<String>,
}

async fn list_indexes(
    backend: BackendData,
    page: web::Query<Pagination>,
) -> Result<HttpResponse, AppError> {
    let indexes = backend.list_indexes(*page).await?;
    Ok(HttpResponse::Ok().json(views::page(&indexes, views::index)))
}

async fn create_index(
    backend: BackendData,
    config: ConfigData,
    body: web::Json<CreateIndexBody>,
    wait: web::Query<WaitParams>,
) -> Result<HttpResponse, AppError> {
    validate_index_uid(&body.uid)?;
    let info = backend
        .create_index(&body.uid, body.primary_key.as_deref())
        .await?;
    task_response(&backend, &config, info, &wait).await
}

async fn update_index(
    backend: BackendData,
    config: ConfigData,
    body: web::Json<UpdateIndexBody>,
    wait: web::Query<WaitParams>,
) -> Result<HttpResponse, AppError> {
    validate_index_uid(&body.uid)?;
    if body.primary_key.is_empty() {
        return Err(AppError::validation("primary key must not be empty"));
    }
    let info = backend.update_index(&body.uid, &body.primary_key).await?;
    task_response(&backend, &config, info, &wait).await
}

async fn get_index(
    backend: BackendData,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let uid = path.into_inner();
    validate_index_uid(&uid)?;
    Ok(HttpResponse::Ok().json(views::index(&backend.get_index(&uid).await?)))
}

async fn delete_index(
    backend: BackendData,
    config: ConfigData,
    path: web::Path<String>,
    wait: web::Query<WaitParams>,
) -> Result<HttpResponse, AppError> {
    let uid = path.into_inner();
    validate_index_uid(&uid)?;
    let info = backend.delete_index(&uid).await?;
    task_response(&backend, &config, info, &wait).await
}

async fn index_stats(
    backend: BackendData,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let uid = path.into_inner();
    validate_index_uid(&uid)?;
    Ok(HttpResponse::Ok().json(views::index_stats(&backend.index_stats(&uid).await?)))
}

/// Older clients declare facet attributes here; the engine now calls them
/// filterable attributes.
async fn update_attributes_for_faceting(
    backend: BackendData,
    config: ConfigData,
    body: web::Json<FacetingBody>,
    wait: web::Query<WaitParams>,
) -> Result<HttpResponse, AppError> {
    validate_index_uid(&body.uid)?;
    let value = Value::from(body.attributes_for_faceting.clone());
    let info = backend
        .update_setting(&body.uid, Setting::FilterableAttributes, &value)
        .await?;
    task_response(&backend, &config, info, &wait).await
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("")
            .route(web::get().to(list_indexes))
            .route(web::post().to(create_index))
            .route(web::put().to(update_index)),
    )
    .service(
        web::resource("/attributes-for-faceting")
            .route(web::put().to(update_attributes_for_faceting)),
    )
    .service(
        web::resource("/{uid}")
            .route(web::get().to(get_index))
            .route(web::delete().to(delete_index)),
    )
    .service(web::resource("/{uid}/stats").route(web::get().to(index_stats)));
}
