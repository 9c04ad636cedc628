//! Notification event model and an in-memory sink, standing in for the
//! notification delivery/UI surface that is out of scope for this
//! repository (see SPEC_FULL.md §4, Non-goals).

use crate::heartbeat::Severity;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chronopack_core::{TaskId, UserId};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub user_id: UserId,
    pub task_id: TaskId,
    pub severity: Severity,
    pub message: String,
    pub sent_at: DateTime<Utc>,
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, event: NotificationEvent);
    async fn last_notified(&self, user_id: UserId) -> std::collections::HashMap<TaskId, DateTime<Utc>>;
    async fn sent_today(&self, user_id: UserId, today: chrono::NaiveDate) -> usize;
}

#[derive(Default)]
pub struct InMemoryNotificationSink {
    events: RwLock<Vec<NotificationEvent>>,
}

impl InMemoryNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<NotificationEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl NotificationSink for InMemoryNotificationSink {
    async fn send(&self, event: NotificationEvent) {
        self.events.write().await.push(event);
    }

    async fn last_notified(&self, user_id: UserId) -> std::collections::HashMap<TaskId, DateTime<Utc>> {
        let events = self.events.read().await;
        let mut by_task: std::collections::HashMap<TaskId, DateTime<Utc>> = std::collections::HashMap::new();
        for event in events.iter().filter(|e| e.user_id == user_id) {
            by_task
                .entry(event.task_id)
                .and_modify(|t| *t = (*t).max(event.sent_at))
                .or_insert(event.sent_at);
        }
        by_task
    }

    async fn sent_today(&self, user_id: UserId, today: chrono::NaiveDate) -> usize {
        self.events.read().await.iter().filter(|e| e.user_id == user_id && e.sent_at.date_naive() == today).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sink_counts_events_sent_today() {
        let sink = InMemoryNotificationSink::new();
        let user_id = UserId::new();
        let now = Utc::now();
        sink.send(NotificationEvent { user_id, task_id: TaskId::new(), severity: Severity::High, message: "m".into(), sent_at: now }).await;

        assert_eq!(sink.sent_today(user_id, now.date_naive()).await, 1);
        assert_eq!(sink.last_notified(user_id).await.len(), 1);
    }
}
