use tokio::sync::watch;
use tokio::time::{interval, Duration};

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::tasks::sweep;

/// Periodic time-driven transition loop. Runs until the shutdown signal
/// flips; a failed sweep is logged and retried on the next tick.
pub(crate) async fn run(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let mut tick =
        interval(Duration::from_secs(state.settings().scheduler().sweep_interval_seconds));

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                let now = primitive_now_utc();
                if let Err(err) = sweep::run_sweep(state.db(), now).await {
                    tracing::error!(error = %err, "Scheduler sweep failed");
                }
            }
        }
    }

    tracing::info!("Scheduler stopped");
}
