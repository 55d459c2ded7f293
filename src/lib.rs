pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;
pub(crate) mod tasks;

#[cfg(test)]
mod test_support;

use tokio::sync::watch;

use crate::core::{config::Settings, state::AppState, telemetry};
use crate::services::events::EventPublisher;

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let db_pool = db::init_pool(&settings).await?;
    db::run_migrations(&db_pool).await?;

    let (events, event_rx) = EventPublisher::channel();
    let state = AppState::new(settings, db_pool, events);

    if let Err(err) = core::bootstrap::ensure_admin_user(&state).await {
        tracing::error!(error = %err, "Failed to ensure default admin user");
    }

    let event_listener = tokio::spawn(services::events::run_listener(event_rx));

    // The scheduler shares the process with the HTTP server and stops with it.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = tokio::spawn(tasks::scheduler::run(state.clone(), shutdown_rx));

    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        "Examly Rust API listening"
    );

    let result =
        axum::serve(listener, app).with_graceful_shutdown(core::shutdown::shutdown_signal()).await;

    if shutdown_tx.send(true).is_err() {
        tracing::warn!("Failed to broadcast shutdown signal to background tasks");
    }
    if let Err(err) = scheduler.await {
        tracing::error!(error = %err, "Scheduler task join failed");
    }
    event_listener.abort();

    result?;

    Ok(())
}
