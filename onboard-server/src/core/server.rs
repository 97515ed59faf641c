//! HTTP server and process lifecycle

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::BoxError;
use crate::api;
use crate::core::{AppState, BackgroundTasks, Config, TaskKind};
use crate::recovery::RecoveryScanner;

pub struct Server {
    config: Config,
    state: AppState,
}

impl Server {
    pub fn new(config: Config, state: AppState) -> Self {
        Self { config, state }
    }

    /// Serve until Ctrl-C, then drain background tasks
    pub async fn run(self) -> Result<(), BoxError> {
        let mut tasks = BackgroundTasks::new();

        if self.config.recovery_enabled {
            let scanner = Arc::new(RecoveryScanner::new(
                self.state.onboarding.clone(),
                self.state.identity.clone(),
                self.config.recovery(),
                tasks.shutdown_token().child_token(),
            ));
            tasks.spawn("recovery_scanner", TaskKind::Periodic, async move {
                scanner.run().await;
            });
        } else {
            tracing::warn!("Recovery scanner disabled, stuck requests will not be repaired");
        }
        tasks.log_summary();

        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {e}");
                return;
            }
            tracing::info!("Shutdown signal received");
            signal.cancel();
        });

        let result = self.serve(shutdown).await;

        tasks.check_health();
        tasks.shutdown(self.config.shutdown_timeout()).await;
        result
    }

    async fn serve(&self, shutdown: CancellationToken) -> Result<(), BoxError> {
        let app = api::build_app(self.state.clone());
        let addr = format!("0.0.0.0:{}", self.config.http_port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!("onboard-server HTTP listening on {addr}");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;
        Ok(())
    }
}
