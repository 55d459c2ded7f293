use anyhow::{Context, Result};
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::repositories;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SweepOutcome {
    pub(crate) exams_started: u64,
    pub(crate) exams_ended: u64,
    pub(crate) attempts_auto_submitted: u64,
}

/// One scheduler tick. Both phases are bulk conditional updates keyed on the
/// same `now`, so repeated or concurrent sweeps converge on the same state:
/// 1. published exams whose window opened start running; running exams past
///    their deadline end (boundaries inclusive);
/// 2. in-progress attempts of ended-window exams are force-submitted with
///    score 0.
pub(crate) async fn run_sweep(pool: &PgPool, now: PrimitiveDateTime) -> Result<SweepOutcome> {
    let exams_started = repositories::exams::start_due_published(pool, now)
        .await
        .context("Failed to start due exams")?;
    let exams_ended =
        repositories::exams::end_due_running(pool, now).await.context("Failed to end due exams")?;

    let attempts_auto_submitted = repositories::attempts::auto_submit_expired(pool, now)
        .await
        .context("Failed to auto-submit expired attempts")?;

    let outcome = SweepOutcome { exams_started, exams_ended, attempts_auto_submitted };

    if outcome != SweepOutcome::default() {
        tracing::info!(
            exams_started = outcome.exams_started,
            exams_ended = outcome.exams_ended,
            attempts_auto_submitted = outcome.attempts_auto_submitted,
            "Scheduler sweep applied transitions"
        );
    }

    metrics::counter!("exams_started_total").increment(outcome.exams_started);
    metrics::counter!("exams_ended_total").increment(outcome.exams_ended);
    metrics::counter!("attempts_auto_submitted_total").increment(outcome.attempts_auto_submitted);

    Ok(outcome)
}
