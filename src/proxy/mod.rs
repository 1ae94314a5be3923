//! Proxy module for the prediction endpoint
//!
//! Dual-path architecture:
//! - Hot path: validate, forward, respond with minimal overhead
//! - Log path: async persistence via the bounded sink queue

pub mod error_response;
pub mod handler;
pub mod headers;
pub mod metrics;
pub mod service;
pub mod types;


pub use service::ProxyService;
pub use types::{ProxyConfig, ProxyError, ProxyResult};
