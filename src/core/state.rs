use std::sync::Arc;

use sqlx::PgPool;

use crate::core::config::Settings;
use crate::services::events::EventPublisher;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    db: PgPool,
    events: EventPublisher,
}

impl AppState {
    pub(crate) fn new(settings: Settings, db: PgPool, events: EventPublisher) -> Self {
        Self { inner: Arc::new(InnerState { settings, db, events }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn db(&self) -> &PgPool {
        &self.inner.db
    }

    pub(crate) fn events(&self) -> &EventPublisher {
        &self.inner.events
    }
}
