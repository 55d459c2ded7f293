use serde::Serialize;
use tokio::sync::mpsc;

/// Domain events fanned out to external collaborators (notification, audit,
/// cache invalidation). Delivery is best-effort and decoupled from the
/// transaction that produced the event.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum DomainEvent {
    ExamPublished { exam_id: String, title: String },
}

impl DomainEvent {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::ExamPublished { .. } => "exam.published",
        }
    }
}

#[derive(Clone)]
pub(crate) struct EventPublisher {
    tx: mpsc::UnboundedSender<DomainEvent>,
}

impl EventPublisher {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<DomainEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Fire-and-forget: a closed listener is logged, never surfaced to the
    /// request that emitted the event.
    pub(crate) fn emit(&self, event: DomainEvent) {
        if let Err(err) = self.tx.send(event) {
            tracing::warn!(event = %err.0.name(), "Event listener gone; dropping domain event");
        }
    }
}

pub(crate) async fn run_listener(mut rx: mpsc::UnboundedReceiver<DomainEvent>) {
    while let Some(event) = rx.recv().await {
        match &event {
            DomainEvent::ExamPublished { exam_id, title } => {
                tracing::info!(exam_id = %exam_id, title = %title, event = event.name(), "Domain event");
            }
        }
        metrics::counter!("domain_events_total", "event" => event.name()).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emitted_events_reach_the_listener() {
        let (publisher, mut rx) = EventPublisher::channel();

        publisher.emit(DomainEvent::ExamPublished {
            exam_id: "exam-1".to_string(),
            title: "Midterm".to_string(),
        });

        let event = rx.recv().await.expect("event");
        assert_eq!(event.name(), "exam.published");
    }

    #[tokio::test]
    async fn emit_does_not_fail_without_a_listener() {
        let (publisher, rx) = EventPublisher::channel();
        drop(rx);

        publisher.emit(DomainEvent::ExamPublished {
            exam_id: "exam-1".to_string(),
            title: "Midterm".to_string(),
        });
    }
}
