use crate::backend::{SearchBackend, TaskSource};
use crate::config::{AppConfig, ConfigCache};
use crate::error::AppError;
use crate::models::{
    split_list, DocumentsQuery, KeyRequest, Page, Pagination, SearchParams, Setting, TasksQuery,
};
use async_trait::async_trait;
use meilisearch_sdk::client::{Client, ClientStats, Health, Version};
use meilisearch_sdk::documents::{DocumentQuery, DocumentsQuery as EngineDocumentsQuery};
use meilisearch_sdk::errors::Error as MeilisearchSdkError;
use meilisearch_sdk::indexes::{Index, IndexStats, IndexesQuery};
use meilisearch_sdk::key::{Action, Key, KeyBuilder, KeysQuery};
use meilisearch_sdk::search::{SearchResults, Selectors};
use meilisearch_sdk::settings::Settings;
use meilisearch_sdk::task_info::TaskInfo;
use meilisearch_sdk::tasks::{Task, TasksResults, TasksSearchQuery};
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Task uid in the form the SDK's task lookups accept.
struct TaskUid(u32);

impl AsRef<u32> for TaskUid {
    fn as_ref(&self) -> &u32 {
        &self.0
    }
}

/// An SDK client bound to one configuration snapshot.
struct Connection {
    config: Arc<AppConfig>,
    client: Client,
}

impl Connection {
    fn open(config: Arc<AppConfig>) -> Result<Self, AppError> {
        let host = config.base_url()?.as_str().trim_end_matches('/').to_string();
        if let Some(key) = &config.master_key {
            // must fit in an Authorization header
            if !key.bytes().all(|b| (0x20..0x7f).contains(&b)) {
                return Err(AppError::client_setup(
                    "master key contains characters that cannot be sent to the engine",
                ));
            }
        }

        log::debug!("Creating Meilisearch client for address: {}", host);
        let client = Client::new(host, config.master_key.as_deref())?;
        Ok(Self { config, client })
    }

    /// Runs one SDK call, bounded by the configured request timeout.
    async fn call<T, F>(&self, request: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, MeilisearchSdkError>>,
    {
        let timeout = self.config.request_timeout();
        match tokio::time::timeout(timeout, request).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(AppError::BackendUnavailable(format!(
                "no answer within {}ms",
                timeout.as_millis()
            ))),
        }
    }
}

/// Forwards every [`SearchBackend`] operation to a Meilisearch server through
/// the official SDK.
///
/// The SDK client is built from the [`ConfigCache`] and rebuilt once the cache
/// hands out a new configuration, so invalidating the cache redirects the next
/// request.
pub struct MeilisearchClient {
    config: ConfigCache,
    connection: RwLock<Option<Arc<Connection>>>,
}

impl MeilisearchClient {
    pub fn new(config: ConfigCache) -> Result<Self, AppError> {
        let client = Self {
            config,
            connection: RwLock::new(None),
        };
        client.connection()?;
        log::trace!("Meilisearch client created successfully.");
        Ok(client)
    }

    fn connection(&self) -> Result<Arc<Connection>, AppError> {
        let config = self.config.get()?;
        if let Some(current) = self
            .connection
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            if Arc::ptr_eq(&current.config, &config) {
                return Ok(current.clone());
            }
        }

        let fresh = Arc::new(Connection::open(config)?);
        *self
            .connection
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(fresh.clone());
        Ok(fresh)
    }

    fn enqueued(info: TaskInfo) -> TaskInfo {
        log::debug!(
            "Meilisearch enqueued task {} for index {:?}",
            info.task_uid,
            info.index_uid
        );
        info
    }
}

#[async_trait]
impl TaskSource for MeilisearchClient {
    async fn get_task(&self, task_uid: u32) -> Result<Task, AppError> {
        let conn = self.connection()?;
        conn.call(conn.client.get_task(TaskUid(task_uid))).await
    }
}

#[async_trait]
impl SearchBackend for MeilisearchClient {
    async fn health(&self) -> Result<Health, AppError> {
        let conn = self.connection()?;
        conn.call(conn.client.health()).await
    }

    async fn version(&self) -> Result<Version, AppError> {
        let conn = self.connection()?;
        conn.call(conn.client.get_version()).await
    }

    async fn stats(&self) -> Result<ClientStats, AppError> {
        let conn = self.connection()?;
        conn.call(conn.client.get_stats()).await
    }

    async fn list_tasks(&self, query: &TasksQuery) -> Result<TasksResults, AppError> {
        let conn = self.connection()?;
        let index_uids = query.index_uids.as_deref().map(split_list);
        let statuses = query.statuses.as_deref().map(split_list);
        let types = query.types.as_deref().map(split_list);

        let mut request = TasksSearchQuery::new(&conn.client);
        if let Some(index_uids) = &index_uids {
            request.with_index_uids(index_uids.iter().copied());
        }
        if let Some(statuses) = &statuses {
            request.with_statuses(statuses.iter().copied());
        }
        if let Some(types) = &types {
            request.with_types(types.iter().copied());
        }
        if let Some(limit) = query.limit {
            request.with_limit(limit);
        }
        if let Some(from) = query.from {
            request.with_from(from);
        }
        conn.call(conn.client.get_tasks_with(&request)).await
    }

    async fn list_indexes(&self, page: Pagination) -> Result<Page<Index>, AppError> {
        let conn = self.connection()?;
        let mut request = IndexesQuery::new(&conn.client);
        if let Some(offset) = page.offset {
            request.with_offset(offset);
        }
        if let Some(limit) = page.limit {
            request.with_limit(limit);
        }
        let indexes = conn.call(conn.client.list_all_indexes_with(&request)).await?;
        Ok(Page {
            results: indexes.results,
            offset: indexes.offset as u32,
            limit: indexes.limit as u32,
            total: indexes.total as u32,
        })
    }

    async fn get_index(&self, uid: &str) -> Result<Index, AppError> {
        let conn = self.connection()?;
        conn.call(conn.client.get_index(uid)).await
    }

    async fn create_index(
        &self,
        uid: &str,
        primary_key: Option<&str>,
    ) -> Result<TaskInfo, AppError> {
        log::info!("Creating index '{}'.", uid);
        let conn = self.connection()?;
        let info = conn.call(conn.client.create_index(uid, primary_key)).await?;
        Ok(Self::enqueued(info))
    }

    async fn update_index(&self, uid: &str, primary_key: &str) -> Result<TaskInfo, AppError> {
        let conn = self.connection()?;
        let mut index = conn.client.index(uid);
        let info = conn.call(index.set_primary_key(primary_key)).await?;
        Ok(Self::enqueued(info))
    }

    async fn delete_index(&self, uid: &str) -> Result<TaskInfo, AppError> {
        log::info!("Deleting index '{}'.", uid);
        let conn = self.connection()?;
        let info = conn.call(conn.client.delete_index(uid)).await?;
        Ok(Self::enqueued(info))
    }

    async fn index_stats(&self, uid: &str) -> Result<IndexStats, AppError> {
        let conn = self.connection()?;
        let index = conn.client.index(uid);
        conn.call(index.get_stats()).await
    }

    async fn add_documents(
        &self,
        uid: &str,
        documents: &[Value],
        primary_key: Option<&str>,
    ) -> Result<TaskInfo, AppError> {
        log::debug!("Adding {} documents to index '{}'.", documents.len(), uid);
        let conn = self.connection()?;
        let index = conn.client.index(uid);
        let info = conn.call(index.add_documents(documents, primary_key)).await?;
        Ok(Self::enqueued(info))
    }

    async fn update_documents(
        &self,
        uid: &str,
        documents: &[Value],
        primary_key: Option<&str>,
    ) -> Result<TaskInfo, AppError> {
        log::debug!("Updating {} documents in index '{}'.", documents.len(), uid);
        let conn = self.connection()?;
        let index = conn.client.index(uid);
        let info = conn.call(index.add_or_update(documents, primary_key)).await?;
        Ok(Self::enqueued(info))
    }

    async fn list_documents(
        &self,
        uid: &str,
        query: &DocumentsQuery,
    ) -> Result<Page<Value>, AppError> {
        let conn = self.connection()?;
        let index = conn.client.index(uid);
        let fields = query.fields.as_deref().map(split_list);

        let mut request = EngineDocumentsQuery::new(&index);
        if let Some(offset) = query.offset {
            request.with_offset(offset);
        }
        if let Some(limit) = query.limit {
            request.with_limit(limit);
        }
        if let Some(fields) = &fields {
            request.with_fields(fields.iter().copied());
        }
        let documents = conn.call(index.get_documents_with::<Value>(&request)).await?;
        Ok(Page {
            results: documents.results,
            offset: documents.offset as u32,
            limit: documents.limit as u32,
            total: documents.total as u32,
        })
    }

    async fn get_document(
        &self,
        uid: &str,
        document_id: &str,
        fields: Option<&str>,
    ) -> Result<Value, AppError> {
        let conn = self.connection()?;
        let index = conn.client.index(uid);
        match fields.map(split_list) {
            Some(fields) => {
                let mut request = DocumentQuery::new(&index);
                request.with_fields(fields.iter().copied());
                conn.call(request.execute::<Value>(document_id)).await
            }
            None => conn.call(index.get_document::<Value>(document_id)).await,
        }
    }

    async fn delete_document(&self, uid: &str, document_id: &str) -> Result<TaskInfo, AppError> {
        let conn = self.connection()?;
        let index = conn.client.index(uid);
        let info = conn.call(index.delete_document(document_id)).await?;
        Ok(Self::enqueued(info))
    }

    async fn delete_documents(
        &self,
        uid: &str,
        document_ids: &[Value],
    ) -> Result<TaskInfo, AppError> {
        let conn = self.connection()?;
        let index = conn.client.index(uid);
        let info = conn.call(index.delete_documents(document_ids)).await?;
        Ok(Self::enqueued(info))
    }

    async fn delete_all_documents(&self, uid: &str) -> Result<TaskInfo, AppError> {
        let conn = self.connection()?;
        let index = conn.client.index(uid);
        let info = conn.call(index.delete_all_documents()).await?;
        Ok(Self::enqueued(info))
    }

    async fn get_settings(&self, uid: &str) -> Result<Settings, AppError> {
        let conn = self.connection()?;
        let index = conn.client.index(uid);
        conn.call(index.get_settings()).await
    }

    async fn update_settings(
        &self,
        uid: &str,
        settings: &Settings,
    ) -> Result<TaskInfo, AppError> {
        let conn = self.connection()?;
        let index = conn.client.index(uid);
        let info = conn.call(index.set_settings(settings)).await?;
        Ok(Self::enqueued(info))
    }

    async fn reset_settings(&self, uid: &str) -> Result<TaskInfo, AppError> {
        let conn = self.connection()?;
        let index = conn.client.index(uid);
        let info = conn.call(index.reset_settings()).await?;
        Ok(Self::enqueued(info))
    }

    async fn get_setting(&self, uid: &str, setting: Setting) -> Result<Value, AppError> {
        let settings = self.get_settings(uid).await?;
        let mut fields = serde_json::to_value(settings)
            .map_err(|e| AppError::BackendResponse(e.to_string()))?;
        Ok(fields
            .get_mut(setting.field_name())
            .map(Value::take)
            .unwrap_or(Value::Null))
    }

    /// Sent as a partial settings object, so the other settings are kept.
    async fn update_setting(
        &self,
        uid: &str,
        setting: Setting,
        value: &Value,
    ) -> Result<TaskInfo, AppError> {
        let mut fields = Map::new();
        fields.insert(setting.field_name().to_string(), value.clone());
        let settings: Settings = serde_json::from_value(Value::Object(fields))
            .map_err(|e| AppError::validation(format!("invalid {}: {}", setting, e)))?;
        self.update_settings(uid, &settings).await
    }

    async fn reset_setting(&self, uid: &str, setting: Setting) -> Result<TaskInfo, AppError> {
        let conn = self.connection()?;
        let index = conn.client.index(uid);
        let info = match setting {
            Setting::DisplayedAttributes => conn.call(index.reset_displayed_attributes()).await,
            Setting::SearchableAttributes => conn.call(index.reset_searchable_attributes()).await,
            Setting::FilterableAttributes => conn.call(index.reset_filterable_attributes()).await,
            Setting::SortableAttributes => conn.call(index.reset_sortable_attributes()).await,
            Setting::RankingRules => conn.call(index.reset_ranking_rules()).await,
            Setting::StopWords => conn.call(index.reset_stop_words()).await,
            Setting::Synonyms => conn.call(index.reset_synonyms()).await,
            Setting::DistinctAttribute => conn.call(index.reset_distinct_attribute()).await,
        }?;
        Ok(Self::enqueued(info))
    }

    async fn search(
        &self,
        uid: &str,
        params: &SearchParams,
    ) -> Result<SearchResults<Value>, AppError> {
        log::debug!("Searching index '{}' for: {:?}", uid, params.query);
        let conn = self.connection()?;
        let index = conn.client.index(uid);

        fn as_strs(list: &Option<Vec<String>>) -> Option<Vec<&str>> {
            list.as_ref()
                .map(|items| items.iter().map(String::as_str).collect())
        }
        let facets = as_strs(&params.facets);
        let retrieve = as_strs(&params.attributes_to_retrieve);
        let highlight = as_strs(&params.attributes_to_highlight);
        let sort = as_strs(&params.sort);
        let crop = params.crop_directives()?;

        let mut request = index.search();
        request.with_query(&params.query);
        if let Some(offset) = params.offset {
            request.with_offset(offset);
        }
        if let Some(limit) = params.limit {
            request.with_limit(limit);
        }
        if let Some(filter) = &params.filter {
            request.with_filter(filter);
        }
        if let Some(facets) = &facets {
            request.with_facets(Selectors::Some(facets.as_slice()));
        }
        if let Some(retrieve) = &retrieve {
            request.with_attributes_to_retrieve(Selectors::Some(retrieve.as_slice()));
        }
        if let Some(highlight) = &highlight {
            request.with_attributes_to_highlight(Selectors::Some(highlight.as_slice()));
        }
        if !crop.is_empty() {
            request.with_attributes_to_crop(Selectors::Some(crop.as_slice()));
        }
        if let Some(crop_length) = params.crop_length {
            request.with_crop_length(crop_length);
        }
        if let Some(sort) = &sort {
            request.with_sort(sort.as_slice());
        }
        if let Some(tag) = &params.highlight_pre_tag {
            request.with_highlight_pre_tag(tag);
        }
        if let Some(tag) = &params.highlight_post_tag {
            request.with_highlight_post_tag(tag);
        }

        let results = conn.call(request.execute::<Value>()).await?;
        log::debug!(
            "Found {} hits in index '{}' for query: {:?}",
            results.hits.len(),
            uid,
            params.query
        );
        Ok(results)
    }

    async fn list_keys(&self, page: Pagination) -> Result<Page<Key>, AppError> {
        let conn = self.connection()?;
        let mut request = KeysQuery::new();
        if let Some(offset) = page.offset {
            request.with_offset(offset);
        }
        if let Some(limit) = page.limit {
            request.with_limit(limit);
        }
        let keys = conn.call(conn.client.get_keys_with(&request)).await?;
        Ok(Page {
            results: keys.results,
            offset: keys.offset as u32,
            limit: keys.limit as u32,
            total: keys.total as u32,
        })
    }

    async fn get_key(&self, key: &str) -> Result<Key, AppError> {
        let conn = self.connection()?;
        conn.call(conn.client.get_key(key)).await
    }

    async fn create_key(&self, request: &KeyRequest) -> Result<Key, AppError> {
        let actions: Vec<Action> = serde_json::from_value(Value::from(request.actions.clone()))
            .map_err(|e| AppError::validation(format!("unknown key action: {}", e)))?;

        let mut builder = KeyBuilder::new();
        builder
            .with_actions(actions)
            .with_indexes(request.indexes.iter().map(String::as_str));
        if let Some(name) = &request.name {
            builder.with_name(name);
        }
        if let Some(description) = &request.description {
            builder.with_description(description);
        }
        if let Some(expires_at) = &request.expires_at {
            let expires_at = OffsetDateTime::parse(expires_at, &Rfc3339).map_err(|e| {
                AppError::validation(format!("expiresAt `{}` is not RFC 3339: {}", expires_at, e))
            })?;
            builder.with_expires_at(expires_at);
        }

        let conn = self.connection()?;
        conn.call(conn.client.create_key(&builder)).await
    }

    async fn delete_key(&self, key: &str) -> Result<(), AppError> {
        let conn = self.connection()?;
        conn.call(conn.client.delete_key(key)).await
    }
}
