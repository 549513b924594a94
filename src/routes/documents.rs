use super::{task_response, BackendData, ConfigData, WaitParams};
use crate::error::AppError;
use crate::models::{validate_index_uid, DocumentsQuery};
use crate::views;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentsBody {
    pub uid: String,
    pub documents: Vec<Value>,
    #[serde(default, alias = "primary_key")]
    pub primary_key: Option<String>,
}

impl DocumentsBody {
    fn validate(&self) -> Result<(), AppError> {
        validate_index_uid(&self.uid)?;
        if let Some(position) = self.documents.iter().position(|d| !d.is_object()) {
            return Err(AppError::validation(format!(
                "document at position {} is not a JSON object",
                position
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteDocumentsBody {
    pub uid: String,
    #[serde(alias = "document_ids")]
    pub document_ids: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub struct FieldsParams {
    pub fields: Option<String>,
}

async fn add_documents(
    backend: BackendData,
    config: ConfigData,
    body: web::Json<DocumentsBody>,
    wait: web::Query<WaitParams>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    body.validate()?;
    let info = backend
        .add_documents(&body.uid, &body.documents, body.primary_key.as_deref())
        .await?;
    task_response(&backend, &config, info, &wait).await
}

async fn update_documents(
    backend: BackendData,
    config: ConfigData,
    body: web::Json<DocumentsBody>,
    wait: web::Query<WaitParams>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    body.validate()?;
    let info = backend
        .update_documents(&body.uid, &body.documents, body.primary_key.as_deref())
        .await?;
    task_response(&backend, &config, info, &wait).await
}

async fn list_documents(
    backend: BackendData,
    path: web::Path<String>,
    query: web::Query<DocumentsQuery>,
) -> Result<HttpResponse, AppError> {
    let uid = path.into_inner();
    validate_index_uid(&uid)?;
    let page = backend.list_documents(&uid, &query).await?;
    Ok(HttpResponse::Ok().json(views::page(&page, Value::clone)))
}

async fn get_document(
    backend: BackendData,
    path: web::Path<(String, String)>,
    query: web::Query<FieldsParams>,
) -> Result<HttpResponse, AppError> {
    let (uid, document_id) = path.into_inner();
    validate_index_uid(&uid)?;
    let document = backend
        .get_document(&uid, &document_id, query.fields.as_deref())
        .await?;
    Ok(HttpResponse::Ok().json(document))
}

async fn delete_document(
    backend: BackendData,
    config: ConfigData,
    path: web::Path<(String, String)>,
    wait: web::Query<WaitParams>,
) -> Result<HttpResponse, AppError> {
    let (uid, document_id) = path.into_inner();
    validate_index_uid(&uid)?;
    let info = backend.delete_document(&uid, &document_id).await?;
    task_response(&backend, &config, info, &wait).await
}

async fn delete_documents(
    backend: BackendData,
    config: ConfigData,
    body: web::Json<DeleteDocumentsBody>,
    wait: web::Query<WaitParams>,
) -> Result<HttpResponse, AppError> {
    validate_index_uid(&body.uid)?;
    if body.document_ids.iter().any(|id| !(id.is_string() || id.is_u64())) {
        return Err(AppError::validation(
            "document ids must be strings or non-negative integers",
        ));
    }
    let info = backend.delete_documents(&body.uid, &body.document_ids).await?;
    task_response(&backend, &config, info, &wait).await
}

async fn delete_all_documents(
    backend: BackendData,
    config: ConfigData,
    path: web::Path<String>,
    wait: web::Query<WaitParams>,
) -> Result<HttpResponse, AppError> {
    let uid = path.into_inner();
    validate_index_uid(&uid)?;
    let info = backend.delete_all_documents(&uid).await?;
    task_response(&backend, &config, info, &wait).await
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("")
            .route(web::post().to(add_documents))
            .route(web::put().to(update_documents)),
    )
    .service(web::resource("/delete").route(web::post().to(delete_documents)))
    .service(
        web::resource("/{uid}")
            .route(web::get().to(list_documents))
            .route(web::delete().to(delete_all_documents)),
    )
    .service(
        web::resource("/{uid}/{document_id}")
            .route(web::get().to(get_document))
            .route(web::delete().to(delete_document)),
    );
}
