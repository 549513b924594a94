use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use url::Url;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Address of the search engine, with or without a scheme.
    pub http_addr: String,
    pub master_key: Option<String>,
    pub web_port: u16,
    pub log_level: String,
    pub poll_interval_ms: u64,
    pub poll_max_interval_ms: Option<u64>,
    pub poll_timeout_ms: u64,
    /// Ceiling for a caller-supplied `timeout_ms`; defaults to `poll_timeout_ms`.
    pub poll_max_timeout_ms: Option<u64>,
    pub request_timeout_ms: u64,
}

impl AppConfig {
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        Self::from_sources(config_dir, None)
    }

    /// Builds the configuration from defaults, the files under `config_dir` and
    /// the `MEILI_*` / `GATEWAY_*` variables. `env` replaces the process
    /// environment when given.
    pub fn from_sources(
        config_dir: &str,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let mut meili_env = Environment::with_prefix("MEILI").try_parsing(true);
        let mut gateway_env = Environment::with_prefix("GATEWAY").try_parsing(true);
        if let Some(vars) = env {
            meili_env = meili_env.source(Some(vars.clone()));
            gateway_env = gateway_env.source(Some(vars));
        }

        let s = Config::builder()
            .set_default("http_addr", "localhost:7700")?
            .set_default("web_port", 8000)?
            .set_default("log_level", "info")?
            .set_default("poll_interval_ms", 50)?
            .set_default("poll_timeout_ms", 5000)?
            .set_default("request_timeout_ms", 10_000)?
            .add_source(File::with_name(&format!("{}/default", config_dir)).required(false))
            .add_source(File::with_name(&format!("{}/{}", config_dir, run_mode)).required(false))
            .add_source(File::with_name(&format!("{}/local", config_dir)).required(false))
            .add_source(meili_env)
            .add_source(gateway_env)
            .build()?;

        s.try_deserialize()
    }

    pub fn base_url(&self) -> Result<Url, url::ParseError> {
        if self.http_addr.contains("://") {
            Url::parse(&self.http_addr)
        } else {
            Url::parse(&format!("http://{}", self.http_addr))
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_max_interval(&self) -> Duration {
        Duration::from_millis(self.poll_max_interval_ms.unwrap_or(self.poll_interval_ms))
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn poll_max_timeout(&self) -> Duration {
        Duration::from_millis(
            self.poll_max_timeout_ms
                .unwrap_or(self.poll_timeout_ms)
                .max(self.poll_timeout_ms),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

type Loader = dyn Fn() -> Result<AppConfig, ConfigError> + Send + Sync;

/// Lazily loaded configuration shared by the components that need it.
///
/// The first `get` runs the loader and keeps the result until `invalidate`
/// is called, after which the next `get` loads it again.
#[derive(Clone)]
pub struct ConfigCache {
    loader: Arc<Loader>,
    cached: Arc<RwLock<Option<Arc<AppConfig>>>>,
}

impl ConfigCache {
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> Result<AppConfig, ConfigError> + Send + Sync + 'static,
    {
        Self {
            loader: Arc::new(loader),
            cached: Arc::new(RwLock::new(None)),
        }
    }

    pub fn from_dir(config_dir: impl Into<String>) -> Self {
        let config_dir = config_dir.into();
        Self::new(move || AppConfig::load(&config_dir))
    }

    /// A cache whose loader always yields `config`.
    pub fn fixed(config: AppConfig) -> Self {
        Self::new(move || Ok(config.clone()))
    }

    pub fn get(&self) -> Result<Arc<AppConfig>, ConfigError> {
        if let Some(config) = self
            .cached
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return Ok(config.clone());
        }

        let mut slot = self.cached.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(config) = slot.as_ref() {
            return Ok(config.clone());
        }
        log::debug!("Loading configuration.");
        let config = Arc::new((self.loader)()?);
        *slot = Some(config.clone());
        Ok(config)
    }

    pub fn invalidate(&self) {
        log::info!("Configuration cache invalidated.");
        self.cached
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

#[cfg(test)]
pub(crate) fn test_config(http_addr: &str) -> AppConfig {
    AppConfig {
        http_addr: http_addr.to_string(),
        master_key: Some("masterKey".to_string()),
        web_port: 8000,
        log_level: "debug".to_string(),
        poll_interval_ms: 10,
        poll_max_interval_ms: None,
        poll_timeout_ms: 1000,
        poll_max_timeout_ms: Some(3000),
        request_timeout_ms: 2000,
    }
}
