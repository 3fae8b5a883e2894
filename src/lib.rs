pub mod api;
pub mod appointments;
pub mod auth;
pub mod config;
pub mod core_state;
pub mod db;
pub mod directory;
pub mod error;
pub mod models;
pub mod notes;
pub mod notifications;
pub mod prescriptions;
pub mod referrals;
pub mod relationships;
pub mod sharing;

#[cfg(test)]
mod testing;

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Startup failures surfaced to `main`.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Core(#[from] core_state::CoreError),
    #[error(transparent)]
    Server(#[from] api::ServerError),
}

/// Initialize tracing, open the database, and serve the API until Ctrl-C.
pub async fn run() -> Result<(), RunError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let server_config = config::ServerConfig::from_env()?;
    let core = Arc::new(core_state::CoreState::new(server_config.db_path.clone()));
    core.initialize()?;
    tracing::info!(db = %core.db_path().display(), "Database ready");

    api::serve_until_ctrl_c(core.clone(), server_config.bind_addr).await?;

    // Persist whatever the audit buffer still holds.
    core.flush_and_prune_audit()?;
    tracing::info!("{} stopped", config::APP_NAME);
    Ok(())
}
