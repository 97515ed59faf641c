//! onboard-server - tenant onboarding approval service
//!
//! - Accepts tenant applications and operator approvals over HTTP
//! - Provisions identity accounts and activates tenants
//! - Repairs requests left stuck by crashes or dropped calls

use onboard_server::{AppState, BoxError, Config, Server, init_logger_with_file};

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;

    init_logger_with_file(
        Some(&config.log_level),
        config.log_json,
        config.log_dir.as_deref(),
    );

    tracing::info!("Starting onboard-server (env: {})", config.environment);

    let state = AppState::new(&config).await?;
    Server::new(config, state).run().await?;

    tracing::info!("onboard-server stopped");
    Ok(())
}
