use crate::proxy::types::ProxyError;
use thiserror::Error;

/// Application-level error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Proxy error: {0}")]
    Proxy(#[from] ProxyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
