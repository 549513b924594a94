use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use meilisearch_sdk::errors::{Error as MeilisearchSdkError, MeilisearchError};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Error detail as reported by the engine, for a request or a finished task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineError {
    pub message: String,
    pub code: String,
    #[serde(rename = "type")]
    pub error_type: String,
    pub link: String,
}

impl From<&MeilisearchError> for EngineError {
    fn from(e: &MeilisearchError) -> Self {
        Self {
            message: e.error_message.clone(),
            code: e.error_code.to_string(),
            error_type: e.error_type.to_string(),
            link: e.error_link.clone(),
        }
    }
}

impl EngineError {
    /// The status the engine answers with for this kind of error.
    pub fn status(&self) -> u16 {
        match self.code.as_str() {
            "missing_authorization_header" => 401,
            "invalid_api_key" => 403,
            "index_already_exists" => 409,
            "payload_too_large" => 413,
            "invalid_content_type" | "missing_content_type" => 415,
            code if code.ends_with("_not_found") => 404,
            _ => match self.error_type.as_str() {
                "internal" | "system" => 500,
                _ => 400,
            },
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Search engine unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Search engine rejected the request: {message}")]
    BackendRejected {
        status: u16,
        message: String,
        code: Option<String>,
        error_type: Option<String>,
        link: Option<String>,
    },

    #[error("Unexpected search engine response: {0}")]
    BackendResponse(String),

    #[error("Task {task_uid} did not succeed: {}", .error.as_ref().map(|e| e.message.as_str()).unwrap_or("no detail"))]
    TaskFailed {
        task_uid: u32,
        error: Option<EngineError>,
    },

    #[error("Gave up waiting for task {task_uid} after {}ms", .waited.as_millis())]
    PollTimeout { task_uid: u32, waited: Duration },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    /// Only network failures are worth another status read.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::BackendUnavailable(_))
    }

    pub(crate) fn client_setup(msg: impl Into<String>) -> Self {
        AppError::Config(config::ConfigError::Message(msg.into()))
    }
}

impl From<MeilisearchSdkError> for AppError {
    fn from(e: MeilisearchSdkError) -> Self {
        match e {
            MeilisearchSdkError::Meilisearch(e) => {
                let detail = EngineError::from(&e);
                AppError::BackendRejected {
                    status: detail.status(),
                    message: detail.message,
                    code: Some(detail.code),
                    error_type: Some(detail.error_type),
                    link: Some(detail.link),
                }
            }
            MeilisearchSdkError::MeilisearchCommunication(e) => AppError::BackendRejected {
                status: e.status_code,
                message: e
                    .message
                    .clone()
                    .unwrap_or_else(|| format!("HTTP {}", e.status_code)),
                code: None,
                error_type: None,
                link: None,
            },
            MeilisearchSdkError::ParseError(e) => AppError::BackendResponse(e.to_string()),
            MeilisearchSdkError::HttpError(e) if e.is_builder() => {
                AppError::client_setup(format!("cannot build engine request: {}", e))
            }
            MeilisearchSdkError::HttpError(e) => AppError::BackendUnavailable(e.to_string()),
            MeilisearchSdkError::Timeout => {
                AppError::BackendUnavailable("engine did not answer in time".to_string())
            }
            other => AppError::client_setup(other.to_string()),
        }
    }
}

impl From<url::ParseError> for AppError {
    fn from(e: url::ParseError) -> Self {
        AppError::client_setup(format!("invalid search engine address: {}", e))
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let mut body = serde_json::json!({
            "error": self.to_string(),
        });

        match self {
            AppError::BackendRejected {
                code,
                error_type,
                link,
                ..
            } => {
                body["code"] = serde_json::json!(code);
                body["type"] = serde_json::json!(error_type);
                body["link"] = serde_json::json!(link);
            }
            AppError::TaskFailed { task_uid, error } => {
                body["taskUid"] = serde_json::json!(task_uid);
                if let Some(error) = error {
                    body["code"] = serde_json::json!(error.code);
                    body["type"] = serde_json::json!(error.error_type);
                    body["link"] = serde_json::json!(error.link);
                }
            }
            AppError::PollTimeout { task_uid, .. } => {
                body["taskUid"] = serde_json::json!(task_uid);
            }
            _ => {}
        }

        HttpResponse::build(self.status_code()).json(body)
    }

    fn status_code(&self) -> StatusCode {
        match *self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::BackendUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::BackendRejected { status, .. } => {
                StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            AppError::BackendResponse(_) => StatusCode::BAD_GATEWAY,
            AppError::TaskFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::PollTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    fn engine_error(code: &str, error_type: &str) -> EngineError {
        EngineError {
            message: String::new(),
            code: code.to_string(),
            error_type: error_type.to_string(),
            link: String::new(),
        }
    }

    #[test]
    fn rejected_errors_keep_the_engine_status() {
        let err = AppError::BackendRejected {
            status: 404,
            message: "Index `movies` not found.".to_string(),
            code: Some("index_not_found".to_string()),
            error_type: Some("invalid_request".to_string()),
            link: None,
        };
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let odd = AppError::BackendRejected {
            status: 42,
            message: String::new(),
            code: None,
            error_type: None,
            link: None,
        };
        assert_eq!(odd.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn engine_codes_map_to_engine_statuses() {
        assert_eq!(engine_error("index_not_found", "invalid_request").status(), 404);
        assert_eq!(engine_error("document_not_found", "invalid_request").status(), 404);
        assert_eq!(engine_error("invalid_api_key", "auth").status(), 403);
        assert_eq!(engine_error("missing_authorization_header", "auth").status(), 401);
        assert_eq!(engine_error("invalid_search_filter", "invalid_request").status(), 400);
        assert_eq!(engine_error("no_space_left_on_device", "system").status(), 500);
    }

    #[test]
    fn failure_and_timeout_are_distinguishable() {
        let failed = AppError::TaskFailed {
            task_uid: 7,
            error: None,
        };
        let timed_out = AppError::PollTimeout {
            task_uid: 7,
            waited: Duration::from_millis(5000),
        };
        assert_eq!(failed.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(timed_out.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(timed_out.to_string(), "Gave up waiting for task 7 after 5000ms");
        assert!(!failed.is_transient());
        assert!(AppError::BackendUnavailable("refused".into()).is_transient());
    }

    #[test]
    fn setup_problems_are_not_retried() {
        let err = AppError::client_setup("bad key");
        assert!(!err.is_transient());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[actix_web::test]
    async fn task_failure_body_forwards_engine_detail() {
        let err = AppError::TaskFailed {
            task_uid: 3,
            error: Some(EngineError {
                message: "Document doesn't have a `id` attribute".to_string(),
                code: "missing_document_id".to_string(),
                error_type: "invalid_request".to_string(),
                link: "https://docs.meilisearch.com/errors#missing_document_id".to_string(),
            }),
        };
        let body = to_bytes(err.error_response().into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["taskUid"], 3);
        assert_eq!(json["code"], "missing_document_id");
        assert!(json["error"].as_str().unwrap().contains("`id` attribute"));
    }
}
