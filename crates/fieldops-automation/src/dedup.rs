//! The dedup gate — query-before-write cooldown suppression.

use chrono::{DateTime, Utc};
use fieldops_core::Result;
use fieldops_core::types::NotificationKind;
use fieldops_db::OpsStore;
use std::sync::Arc;

/// Suppresses a candidate when a notification of the same (recipient,
/// kind, reference id) already exists inside the kind's cooldown window.
///
/// Check-then-act, deliberately without a lock: two overlapping scheduler
/// runs can both pass the gate and create a duplicate. The cooldowns
/// (24 h to 7 d) bound that duplicate volume; exactly-once is a non-goal.
pub struct DedupGate {
    store: Arc<dyn OpsStore>,
}

impl DedupGate {
    pub fn new(store: Arc<dyn OpsStore>) -> Self {
        Self { store }
    }

    /// True when the candidate may be persisted.
    pub async fn should_create(
        &self,
        recipient_id: &str,
        kind: NotificationKind,
        reference_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        match self
            .store
            .latest_notification(recipient_id, kind, reference_id)
            .await?
        {
            Some(last) => Ok(last.created_at < now - kind.cooldown()),
            None => Ok(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use fieldops_core::types::{Notification, Priority};
    use fieldops_db::SqliteStore;

    fn test_store(name: &str) -> (Arc<SqliteStore>, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("fieldops-dedup-{name}"));
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).ok();
        let store = SqliteStore::open(&dir.join("test.db")).unwrap();
        (Arc::new(store), dir)
    }

    #[tokio::test]
    async fn test_no_prior_notification_passes() {
        let (store, dir) = test_store("empty");
        let gate = DedupGate::new(store);
        assert!(
            gate.should_create("owner-1", NotificationKind::JobReminder, "job-1", Utc::now())
                .await
                .unwrap()
        );
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_suppresses_inside_cooldown_and_passes_after() {
        let (store, dir) = test_store("cooldown");
        let now = Utc::now();
        let existing = Notification::new(
            "owner-1",
            NotificationKind::JobReminder,
            "Upcoming job",
            "starts soon",
            "job-1",
            Priority::High,
            now,
        );
        store.create_notification(&existing).await.unwrap();

        let gate = DedupGate::new(store);
        // 1 hour later: inside the 24h cooldown.
        assert!(
            !gate
                .should_create(
                    "owner-1",
                    NotificationKind::JobReminder,
                    "job-1",
                    now + Duration::hours(1)
                )
                .await
                .unwrap()
        );
        // Exactly at the boundary: still suppressed (created_at >= now - cooldown).
        assert!(
            !gate
                .should_create(
                    "owner-1",
                    NotificationKind::JobReminder,
                    "job-1",
                    now + Duration::hours(24)
                )
                .await
                .unwrap()
        );
        // Past the window: passes again.
        assert!(
            gate.should_create(
                "owner-1",
                NotificationKind::JobReminder,
                "job-1",
                now + Duration::hours(25)
            )
            .await
            .unwrap()
        );
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_keyed_by_kind_and_reference() {
        let (store, dir) = test_store("keying");
        let now = Utc::now();
        let existing = Notification::new(
            "owner-1",
            NotificationKind::JobReminder,
            "Upcoming job",
            "starts soon",
            "job-1",
            Priority::High,
            now,
        );
        store.create_notification(&existing).await.unwrap();

        let gate = DedupGate::new(store);
        // Other job: not suppressed.
        assert!(
            gate.should_create("owner-1", NotificationKind::JobReminder, "job-2", now)
                .await
                .unwrap()
        );
        // Same reference, different kind: not suppressed.
        assert!(
            gate.should_create("owner-1", NotificationKind::JobCompleted, "job-1", now)
                .await
                .unwrap()
        );
        // Other recipient: not suppressed.
        assert!(
            gate.should_create("owner-2", NotificationKind::JobReminder, "job-1", now)
                .await
                .unwrap()
        );
        std::fs::remove_dir_all(&dir).ok();
    }
}
