//! HTTP header and path constants for the proxy service

/// Header carrying the original client chain when a gateway fronts us
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Well-known paths
pub mod paths {
    /// Prediction endpoint exposed to clients
    pub const PREDICT: &str = "/predict";

    /// Health check endpoint path
    pub const HEALTH: &str = "/health";

    /// Metrics endpoint path
    pub const METRICS: &str = "/metrics";
}
