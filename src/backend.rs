use crate::error::AppError;
use crate::models::{DocumentsQuery, KeyRequest, Page, Pagination, SearchParams, Setting, TasksQuery};
use async_trait::async_trait;
use meilisearch_sdk::client::{ClientStats, Health, Version};
use meilisearch_sdk::indexes::{Index, IndexStats};
use meilisearch_sdk::key::Key;
use meilisearch_sdk::search::SearchResults;
use meilisearch_sdk::settings::Settings;
use meilisearch_sdk::task_info::TaskInfo;
use meilisearch_sdk::tasks::{Task, TasksResults};
use serde_json::Value;

/// Read access to task status, the only thing the poller needs.
#[async_trait]
pub trait TaskSource: Send + Sync {
    async fn get_task(&self, task_uid: u32) -> Result<Task, AppError>;
}

/// One call per capability of the search engine. Mutations answer with a
/// [`TaskInfo`] as soon as the engine has enqueued them.
#[async_trait]
pub trait SearchBackend: TaskSource {
    async fn health(&self) -> Result<Health, AppError>;
    async fn version(&self) -> Result<Version, AppError>;
    async fn stats(&self) -> Result<ClientStats, AppError>;
    async fn list_tasks(&self, query: &TasksQuery) -> Result<TasksResults, AppError>;

    async fn list_indexes(&self, page: Pagination) -> Result<Page<Index>, AppError>;
    async fn get_index(&self, uid: &str) -> Result<Index, AppError>;
    async fn create_index(&self, uid: &str, primary_key: Option<&str>)
        -> Result<TaskInfo, AppError>;
    async fn update_index(&self, uid: &str, primary_key: &str) -> Result<TaskInfo, AppError>;
    async fn delete_index(&self, uid: &str) -> Result<TaskInfo, AppError>;
    async fn index_stats(&self, uid: &str) -> Result<IndexStats, AppError>;

    async fn add_documents(
        &self,
        uid: &str,
        documents: &[Value],
        primary_key: Option<&str>,
    ) -> Result<TaskInfo, AppError>;
    async fn update_documents(
        &self,
        uid: &str,
        documents: &[Value],
        primary_key: Option<&str>,
    ) -> Result<TaskInfo, AppError>;
    async fn list_documents(
        &self,
        uid: &str,
        query: &DocumentsQuery,
    ) -> Result<Page<Value>, AppError>;
    async fn get_document(
        &self,
        uid: &str,
        document_id: &str,
        fields: Option<&str>,
    ) -> Result<Value, AppError>;
    async fn delete_document(&self, uid: &str, document_id: &str) -> Result<TaskInfo, AppError>;
    async fn delete_documents(&self, uid: &str, document_ids: &[Value])
        -> Result<TaskInfo, AppError>;
    async fn delete_all_documents(&self, uid: &str) -> Result<TaskInfo, AppError>;

    async fn get_settings(&self, uid: &str) -> Result<Settings, AppError>;
    async fn update_settings(&self, uid: &str, settings: &Settings)
        -> Result<TaskInfo, AppError>;
    async fn reset_settings(&self, uid: &str) -> Result<TaskInfo, AppError>;
    async fn get_setting(&self, uid: &str, setting: Setting) -> Result<Value, AppError>;
    async fn update_setting(
        &self,
        uid: &str,
        setting: Setting,
        value: &Value,
    ) -> Result<TaskInfo, AppError>;
    async fn reset_setting(&self, uid: &str, setting: Setting) -> Result<TaskInfo, AppError>;

    async fn search(&self, uid: &str, params: &SearchParams)
        -> Result<SearchResults<Value>, AppError>;

    async fn list_keys(&self, page: Pagination) -> Result<Page<Key>, AppError>;
    async fn get_key(&self, key: &str) -> Result<Key, AppError>;
    async fn create_key(&self, request: &KeyRequest) -> Result<Key, AppError>;
    async fn delete_key(&self, key: &str) -> Result<(), AppError>;
}
