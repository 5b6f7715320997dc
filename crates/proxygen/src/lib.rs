//! Proxy subscription service.
//!
//! Stores proxy lists downloaded from subscription providers as named
//! profiles, and serves Clash configurations generated from one or more of
//! them combined with the group templates and rules in the rules directory.
//!
//! # Feature flags
//!
//! | Feature | Default | Crate | Description |
//! |---------|---------|-------|-------------|
//! | `build` | yes | `proxygen-build` | Container recipe generation for deploying the service |
//!
//! # Quick start
//!
//! ```rust,no_run
//! use proxygen::Settings;
//!
//! # async fn run() -> Result<(), proxygen::SetupError> {
//! let settings = Settings::load()?;
//! proxygen::serve(settings).await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod error;
pub mod fetch;
pub mod routes;
pub mod service;
pub mod state;

pub use error::{ApiError, SetupError};
pub use fetch::{FetchError, Fetcher};
pub use routes::build_router;
pub use state::{AppState, Settings};

/// Configuration, storage, and Clash config generation.
pub use proxygen_core;

/// Container recipe generation and build context assembly.
#[cfg(feature = "build")]
pub use proxygen_build;

/// Binds `settings.host:settings.port` and serves until Ctrl-C.
pub async fn serve(settings: Settings) -> Result<(), SetupError> {
    let state = AppState::new(&settings)?;
    let app = build_router(state);

    let addr = settings.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| SetupError::Bind {
            addr: addr.clone(),
            source: e,
        })?;
    tracing::info!(
        addr = %addr,
        profile_dir = %settings.profile_dir.display(),
        rules_dir = %settings.rules_dir.display(),
        "listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(SetupError::Serve)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
