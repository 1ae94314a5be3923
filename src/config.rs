use crate::proxy::types::{
    BackendUrl, BatchSize, ProxyConfig, QueueCapacity, RequestSizeLimit, RetryLimit, SinkConfig,
    StorageUrl,
};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub proxy: ProxySettings,
    pub sink: SinkSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    pub environment: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProxySettings {
    pub backend_url: String,
    pub backend_timeout_ms: u64,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SinkSettings {
    pub storage_url: String,
    pub log_queue_capacity: usize,
    pub log_batch_size: usize,
    pub log_write_timeout_ms: u64,
    pub log_max_retries: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
    pub format: String,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with default values
            .set_default("application.host", "0.0.0.0")?
            .set_default("application.port", 8080)?
            .set_default("application.environment", environment.clone())?
            .set_default("proxy.backend_url", "http://127.0.0.1:9000/predict")?
            .set_default("proxy.backend_timeout_ms", 30_000)?
            .set_default("proxy.max_request_size_bytes", 1024 * 1024)?
            .set_default("sink.storage_url", "http://127.0.0.1:9100/append")?
            .set_default("sink.log_queue_capacity", 1024)?
            .set_default("sink.log_batch_size", 64)?
            .set_default("sink.log_write_timeout_ms", 10_000)?
            .set_default("sink.log_max_retries", 3)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            // Add configuration file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{environment}")).required(false))
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix
            .add_source(Environment::with_prefix("PREDICT_PROXY").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Validated proxy configuration derived from the raw settings
    pub fn proxy_config(&self) -> Result<ProxyConfig, ConfigError> {
        Ok(ProxyConfig {
            backend_url: BackendUrl::try_new(self.proxy.backend_url.clone())
                .map_err(|e| ConfigError::Message(format!("proxy.backend_url: {e}")))?,
            backend_timeout: Duration::from_millis(self.proxy.backend_timeout_ms),
            max_request_size: RequestSizeLimit::try_new(self.proxy.max_request_size_bytes)
                .map_err(|e| ConfigError::Message(format!("proxy.max_request_size_bytes: {e}")))?,
            sink: SinkConfig {
                queue_capacity: QueueCapacity::try_new(self.sink.log_queue_capacity)
                    .map_err(|e| ConfigError::Message(format!("sink.log_queue_capacity: {e}")))?,
                batch_size: BatchSize::try_new(self.sink.log_batch_size)
                    .map_err(|e| ConfigError::Message(format!("sink.log_batch_size: {e}")))?,
                write_timeout: Duration::from_millis(self.sink.log_write_timeout_ms),
                max_retries: RetryLimit::try_new(self.sink.log_max_retries)
                    .map_err(|e| ConfigError::Message(format!("sink.log_max_retries: {e}")))?,
            },
        })
    }

    /// Validated storage endpoint
    pub fn storage_url(&self) -> Result<StorageUrl, ConfigError> {
        StorageUrl::try_new(self.sink.storage_url.clone())
            .map_err(|e| ConfigError::Message(format!("sink.storage_url: {e}")))
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.application.host, self.application.port)
    }
}
