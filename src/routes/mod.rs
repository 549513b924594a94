pub mod documents;
pub mod indexes;
pub mod meilisearch;
pub mod search;
pub mod settings;

use crate::backend::SearchBackend;
use crate::config::{AppConfig, ConfigCache};
use crate::error::AppError;
use crate::poller::TaskPoller;
use crate::views;
use actix_web::{web, HttpResponse};
use meilisearch_sdk::task_info::TaskInfo;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

pub type BackendData = web::Data<Arc<dyn SearchBackend>>;
pub type ConfigData = web::Data<ConfigCache>;

/// `?wait=true[&timeout_ms=N]` on any mutating route.
#[derive(Debug, Deserialize, Default)]
pub struct WaitParams {
    #[serde(default)]
    pub wait: bool,
    pub timeout_ms: Option<u64>,
}

impl WaitParams {
    /// A caller-supplied budget is capped at the configured ceiling.
    fn poller(&self, config: &AppConfig) -> TaskPoller {
        let base = TaskPoller::from_config(config);
        match self.timeout_ms {
            Some(ms) => base.with_timeout(Duration::from_millis(ms).min(config.poll_max_timeout())),
            None => base,
        }
    }
}

/// Answers `202` with the task handle, or waits for the task when asked to and
/// answers `200` with the finished task.
pub async fn task_response(
    backend: &BackendData,
    config: &ConfigData,
    info: TaskInfo,
    params: &WaitParams,
) -> Result<HttpResponse, AppError> {
    if !params.wait {
        return Ok(HttpResponse::Accepted().json(views::task_info(&info)));
    }
    let poller = params.poller(&*config.get()?);
    let source: &dyn SearchBackend = backend.get_ref().as_ref();
    let task = poller.wait_for_task(source, info.task_uid).await?;
    Ok(HttpResponse::Ok().json(views::task(&task)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    #[test]
    fn caller_budget_is_capped_at_the_ceiling() {
        let config = test_config("localhost:7700");
        let huge = WaitParams {
            wait: true,
            timeout_ms: Some(u64::MAX),
        };
        assert_eq!(huge.poller(&config).timeout(), Duration::from_millis(3000));

        let short = WaitParams {
            wait: true,
            timeout_ms: Some(200),
        };
        assert_eq!(short.poller(&config).timeout(), Duration::from_millis(200));

        let default = WaitParams {
            wait: true,
            timeout_ms: None,
        };
        assert_eq!(default.poller(&config).timeout(), config.poll_timeout());
    }
}
