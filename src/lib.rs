//! HTTP gateway in front of a Meilisearch server.
//!
//! Requests are validated, forwarded through a [`backend::SearchBackend`] and
//! answered with the engine's result. Mutations answer with a task handle;
//! [`poller::TaskPoller`] turns a handle into a finished task when the caller
//! asks to wait.

pub mod backend;
pub mod config;
pub mod error;
pub mod models;
pub mod poller;
pub mod routes;
pub mod search_clients;
pub mod views;
pub mod web_server;
