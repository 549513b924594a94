use super::{task_response, BackendData, ConfigData, WaitParams};
use crate::error::AppError;
use crate::models::{validate_index_uid, Setting};
use actix_web::{web, HttpResponse};
use meilisearch_sdk::settings::Settings;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct SettingsBody {
    pub uid: String,
    pub settings: Value,
}

fn setting_path(path: web::Path<(String, String)>) -> Result<(String, Setting), AppError> {
    let (uid, name) = path.into_inner();
    validate_index_uid(&uid)?;
    Ok((uid, name.parse()?))
}

async fn get_settings(
    backend: BackendData,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let uid = path.into_inner();
    validate_index_uid(&uid)?;
    let settings = backend.get_settings(&uid).await?;
    let body = serde_json::to_value(settings).map_err(|e| AppError::BackendResponse(e.to_string()))?;
    Ok(HttpResponse::Ok().json(body))
}

async fn update_settings(
    backend: BackendData,
    config: ConfigData,
    body: web::Json<SettingsBody>,
    wait: web::Query<WaitParams>,
) -> Result<HttpResponse, AppError> {
    validate_index_uid(&body.uid)?;
    if !body.settings.is_object() {
        return Err(AppError::validation("settings must be a JSON object"));
    }
    let settings: Settings = serde_json::from_value(body.settings.clone())
        .map_err(|e| AppError::validation(format!("invalid settings: {}", e)))?;
    let info = backend.update_settings(&body.uid, &settings).await?;
    task_response(&backend, &config, info, &wait).await
}

async fn reset_settings(
    backend: BackendData,
    config: ConfigData,
    path: web::Path<String>,
    wait: web::Query<WaitParams>,
) -> Result<HttpResponse, AppError> {
    let uid = path.into_inner();
    validate_index_uid(&uid)?;
    let info = backend.reset_settings(&uid).await?;
    task_response(&backend, &config, info, &wait).await
}

async fn get_setting(
    backend: BackendData,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, AppError> {
    let (uid, setting) = setting_path(path)?;
    Ok(HttpResponse::Ok().json(backend.get_setting(&uid, setting).await?))
}

async fn update_setting(
    backend: BackendData,
    config: ConfigData,
    path: web::Path<(String, String)>,
    value: web::Json<Value>,
    wait: web::Query<WaitParams>,
) -> Result<HttpResponse, AppError> {
    let (uid, setting) = setting_path(path)?;
    let info = backend.update_setting(&uid, setting, &value).await?;
    task_response(&backend, &config, info, &wait).await
}

async fn reset_setting(
    backend: BackendData,
    config: ConfigData,
    path: web::Path<(String, String)>,
    wait: web::Query<WaitParams>,
) -> Result<HttpResponse, AppError> {
    let (uid, setting) = setting_path(path)?;
    let info = backend.reset_setting(&uid, setting).await?;
    task_response(&backend, &config, info, &wait).await
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("").route(web::patch().to(update_settings)))
        .service(
            web::resource("/{uid}")
                .route(web::get().to(get_settings))
                .route(web::delete().to(reset_settings)),
        )
        .service(
            web::resource("/{uid}/{setting}")
                .route(web::get().to(get_setting))
                .route(web::put().to(update_setting))
                .route(web::delete().to(reset_setting)),
        );
}
