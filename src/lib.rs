//! Predict Proxy - an instrumented proxy for ML prediction endpoints
//!
//! Sits in front of an existing prediction service, forwards each request
//! unchanged, and records every outcome (latency, status) to an
//! append-only log store without adding observable latency to callers.

pub mod application;
pub mod config;
pub mod error;
pub mod proxy;
pub mod sink;

pub use application::Application;
pub use error::{Error, Result};
pub use proxy::{ProxyConfig, ProxyService};
