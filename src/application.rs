use crate::config::Settings;
use crate::proxy::ProxyService;
use crate::Result;
use std::net::SocketAddr;
use tracing::{info, instrument};

/// Main application struct that coordinates all components
pub struct Application {
    settings: Settings,
}

impl Application {
    #[instrument]
    pub async fn new() -> Result<Self> {
        let settings = Settings::new()?;
        Ok(Self { settings })
    }

    /// Serve until interrupted, then flush the log sink and exit
    #[instrument(skip(self))]
    pub async fn run(self) -> Result<()> {
        let proxy_config = self.settings.proxy_config()?;
        let storage_url = self.settings.storage_url()?;

        info!(
            backend_url = %proxy_config.backend_url,
            storage_url = %storage_url,
            "Starting prediction proxy on {}",
            self.settings.listen_address()
        );

        let service = ProxyService::new(proxy_config, storage_url);
        let (router, sink) = service.into_router();

        let listener = tokio::net::TcpListener::bind(self.settings.listen_address()).await?;
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        // In-flight requests have drained; give the sink its flush window
        info!("Server stopped, flushing log sink");
        sink.shutdown().await;

        info!("Shutdown complete");
        Ok(())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn application_can_be_created_from_defaults() {
        let app = Application::new()
            .await
            .expect("Failed to create application");
        assert!(app.settings().application.port > 0);
    }
}
