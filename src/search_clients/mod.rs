pub mod meilisearch;
