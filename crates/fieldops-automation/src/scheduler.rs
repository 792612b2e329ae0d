//! The automation scheduler — the periodic sweep that turns entity state
//! into notifications.
//!
//! One authoritative loop (`spawn_scheduler`) plus on-demand runs through
//! the same path. Overlapping runs for the same recipient are not assumed
//! mutually exclusive; the dedup gate is the only safety net. A failure on
//! one entity or rule never aborts the rest of the run.

use chrono::{DateTime, Utc};
use fieldops_core::Result;
use fieldops_core::types::AutomationSettings;
use fieldops_db::OpsStore;
use std::sync::Arc;

use crate::notifier::Notifier;
use crate::rules::{self, Candidate, RuleKind, SCHEDULED_RULES};

/// What one scheduler run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Entities evaluated across all enabled rules.
    pub evaluated: usize,
    /// Notifications actually created (gate survivors).
    pub created: usize,
}

pub struct AutomationScheduler {
    store: Arc<dyn OpsStore>,
    notifier: Notifier,
}

impl AutomationScheduler {
    pub fn new(store: Arc<dyn OpsStore>, notifier: Notifier) -> Self {
        Self { store, notifier }
    }

    /// Run all enabled rules for one recipient, now.
    pub async fn run(&self, owner_id: &str) -> Result<RunSummary> {
        self.run_at(owner_id, Utc::now()).await
    }

    /// Run all enabled rules for one recipient at a given instant.
    /// The instant flows into rule evaluation, the dedup gate, and the
    /// created_at of every notification, which keeps runs deterministic.
    pub async fn run_at(&self, owner_id: &str, now: DateTime<Utc>) -> Result<RunSummary> {
        let settings = self
            .store
            .automation_settings(owner_id)
            .await?
            .unwrap_or_else(|| AutomationSettings::for_owner(owner_id));
        let deliver_to = settings.notification_email.clone();

        let mut summary = RunSummary::default();
        for rule in SCHEDULED_RULES {
            if !rule.enabled(&settings) {
                continue;
            }
            if let Err(e) = self
                .run_rule(rule, owner_id, now, deliver_to.as_deref(), &mut summary)
                .await
            {
                // One rule's entity load failing must not starve the others.
                tracing::warn!("⚠️ Rule {} failed for {owner_id}: {e}", rule.name());
            }
        }

        tracing::info!(
            "📋 Scheduler run for {owner_id}: {} evaluated, {} created",
            summary.evaluated,
            summary.created
        );
        Ok(summary)
    }

    async fn run_rule(
        &self,
        rule: RuleKind,
        owner_id: &str,
        now: DateTime<Utc>,
        deliver_to: Option<&str>,
        summary: &mut RunSummary,
    ) -> Result<()> {
        match rule {
            RuleKind::JobReminders => {
                for job in self.store.jobs_for_owner(owner_id).await? {
                    summary.evaluated += 1;
                    if let Some(c) = rules::evaluate_job_reminder(&job, now) {
                        self.publish_counted(owner_id, &c, now, deliver_to, summary).await;
                    }
                }
            }
            RuleKind::LeadFollowUps => {
                for lead in self.store.leads_for_owner(owner_id).await? {
                    summary.evaluated += 1;
                    if let Some(c) = rules::evaluate_lead_follow_up(&lead, now) {
                        self.publish_counted(owner_id, &c, now, deliver_to, summary).await;
                    }
                }
            }
            RuleKind::PaymentOverdue => {
                for payment in self.store.payments_for_owner(owner_id).await? {
                    summary.evaluated += 1;
                    if let Some(c) = rules::evaluate_payment_overdue(&payment, now) {
                        self.publish_counted(owner_id, &c, now, deliver_to, summary).await;
                    }
                }
            }
            RuleKind::MaintenanceReminders => {
                for resource in self.store.resources_for_owner(owner_id).await? {
                    summary.evaluated += 1;
                    if let Some(c) = rules::evaluate_maintenance_reminder(&resource, now) {
                        self.publish_counted(owner_id, &c, now, deliver_to, summary).await;
                    }
                }
            }
        }
        Ok(())
    }

    /// Publish one candidate; a failure is logged and skipped so the run
    /// continues with the next entity.
    async fn publish_counted(
        &self,
        owner_id: &str,
        candidate: &Candidate,
        now: DateTime<Utc>,
        deliver_to: Option<&str>,
        summary: &mut RunSummary,
    ) {
        match self.notifier.publish(owner_id, candidate, now, deliver_to).await {
            Ok(true) => summary.created += 1,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(
                    "⚠️ Failed to create {} for {}: {e}",
                    candidate.kind,
                    candidate.reference_id
                );
            }
        }
    }
}

/// Spawn the scheduler loop as a background tokio task. Sweeps every owner
/// with a settings row once per interval. This is the single authoritative
/// timer; on-demand runs reuse `AutomationScheduler::run`.
pub async fn spawn_scheduler(scheduler: Arc<AutomationScheduler>, check_interval_secs: u64) {
    tracing::info!("⏰ Automation scheduler started (every {check_interval_secs}s)");

    let mut interval = tokio::time::interval(std::time::Duration::from_secs(check_interval_secs));

    loop {
        interval.tick().await;

        let owners = match scheduler.store.automation_owners().await {
            Ok(owners) => owners,
            Err(e) => {
                tracing::warn!("⚠️ Failed to list automation owners: {e}");
                continue;
            }
        };

        for owner in owners {
            if let Err(e) = scheduler.run(&owner).await {
                tracing::warn!("⚠️ Scheduler run failed for {owner}: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration;
    use fieldops_core::error::FieldOpsError;
    use fieldops_core::types::{
        Client, Contract, Invoice, Job, JobStatus, Lead, LeadStatus, Notification,
        NotificationKind, Payment, PaymentStatus, Priority, Quote, Resource, new_id,
    };
    use fieldops_db::SqliteStore;
    use std::sync::Mutex;

    fn test_store(name: &str) -> (Arc<SqliteStore>, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("fieldops-sched-{name}"));
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).ok();
        let store = SqliteStore::open(&dir.join("test.db")).unwrap();
        (Arc::new(store), dir)
    }

    fn scheduler_for(store: Arc<SqliteStore>) -> AutomationScheduler {
        let notifier = Notifier::new(store.clone());
        AutomationScheduler::new(store, notifier)
    }

    fn job_starting_at(owner: &str, start: DateTime<Utc>) -> Job {
        Job {
            id: new_id(),
            owner_id: owner.into(),
            client_id: "client-1".into(),
            title: "Hedge trimming".into(),
            status: JobStatus::Confirmed,
            start_at: Some(start),
            revenue: 150.0,
            created_at: Utc::now(),
        }
    }

    /// End-to-end reminder lifecycle: fire once, stay silent inside the
    /// cooldown, fire again after it elapses while still inside the band.
    #[tokio::test]
    async fn test_job_reminder_end_to_end() {
        let (store, dir) = test_store("end-to-end");
        let t0 = Utc::now();
        let mut job = job_starting_at("owner-1", t0 + Duration::hours(10));
        store.create_job(&job).await.unwrap();

        let scheduler = scheduler_for(store.clone());

        let summary = scheduler.run_at("owner-1", t0).await.unwrap();
        assert_eq!(summary, RunSummary { evaluated: 1, created: 1 });

        let stored = store.recent_notifications("owner-1", false, 10).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].kind, NotificationKind::JobReminder);
        assert_eq!(stored[0].priority, Priority::High);
        assert_eq!(stored[0].reference_id(), job.id);

        // One hour later: still eligible, but the gate suppresses it.
        let summary = scheduler.run_at("owner-1", t0 + Duration::hours(1)).await.unwrap();
        assert_eq!(summary, RunSummary { evaluated: 1, created: 0 });

        // 25 hours later the cooldown has elapsed; move the job so it is
        // still inside the 0–24h band and the rule fires again.
        let t2 = t0 + Duration::hours(25);
        job.start_at = Some(t2 + Duration::hours(10));
        store.create_job(&job).await.unwrap();
        let summary = scheduler.run_at("owner-1", t2).await.unwrap();
        assert_eq!(summary, RunSummary { evaluated: 1, created: 1 });
        assert_eq!(
            store.recent_notifications("owner-1", false, 10).await.unwrap().len(),
            2
        );
        std::fs::remove_dir_all(&dir).ok();
    }

    /// Cooldown elapsed but the job has left the band: nothing fires.
    #[tokio::test]
    async fn test_no_refire_outside_band() {
        let (store, dir) = test_store("band-exit");
        let t0 = Utc::now();
        let job = job_starting_at("owner-1", t0 + Duration::hours(10));
        store.create_job(&job).await.unwrap();

        let scheduler = scheduler_for(store.clone());
        scheduler.run_at("owner-1", t0).await.unwrap();

        // 25h later the job has already started.
        let summary = scheduler.run_at("owner-1", t0 + Duration::hours(25)).await.unwrap();
        assert_eq!(summary.created, 0);
        std::fs::remove_dir_all(&dir).ok();
    }

    /// A disabled rule is skipped entirely — not evaluated, not counted.
    #[tokio::test]
    async fn test_disabled_rule_never_fires() {
        let (store, dir) = test_store("disabled");
        let t0 = Utc::now();
        store
            .create_job(&job_starting_at("owner-1", t0 + Duration::hours(5)))
            .await
            .unwrap();
        let mut settings = AutomationSettings::for_owner("owner-1");
        settings.job_reminders = false;
        store.upsert_automation_settings(&settings).await.unwrap();

        let scheduler = scheduler_for(store.clone());
        let summary = scheduler.run_at("owner-1", t0).await.unwrap();
        assert_eq!(summary, RunSummary { evaluated: 0, created: 0 });
        assert!(
            store
                .recent_notifications("owner-1", false, 10)
                .await
                .unwrap()
                .is_empty()
        );
        std::fs::remove_dir_all(&dir).ok();
    }

    /// All four rules sweep in one run, each with its own priority mapping.
    #[tokio::test]
    async fn test_full_sweep_across_rules() {
        let (store, dir) = test_store("sweep");
        let t0 = Utc::now();
        store
            .create_job(&job_starting_at("owner-1", t0 + Duration::hours(6)))
            .await
            .unwrap();
        store
            .create_lead(&Lead {
                id: new_id(),
                owner_id: "owner-1".into(),
                client_id: None,
                name: "Sam".into(),
                status: LeadStatus::New,
                created_at: t0 - Duration::days(4),
            })
            .await
            .unwrap();
        store
            .create_payment(&Payment {
                id: new_id(),
                owner_id: "owner-1".into(),
                client_id: "client-1".into(),
                invoice_id: None,
                amount: 900.0,
                status: PaymentStatus::Pending,
                pending_since: t0 - Duration::days(15),
                paid_at: None,
            })
            .await
            .unwrap();
        store
            .create_resource(&Resource {
                id: new_id(),
                owner_id: "owner-1".into(),
                name: "Trailer".into(),
                next_maintenance_at: Some(t0 + Duration::days(2)),
            })
            .await
            .unwrap();

        let scheduler = scheduler_for(store.clone());
        let summary = scheduler.run_at("owner-1", t0).await.unwrap();
        assert_eq!(summary, RunSummary { evaluated: 4, created: 4 });

        let stored = store.recent_notifications("owner-1", false, 10).await.unwrap();
        let priority_of = |kind: NotificationKind| {
            stored.iter().find(|n| n.kind == kind).map(|n| n.priority)
        };
        assert_eq!(priority_of(NotificationKind::JobReminder), Some(Priority::High));
        assert_eq!(priority_of(NotificationKind::LeadFollowUp), Some(Priority::Medium));
        assert_eq!(priority_of(NotificationKind::PaymentOverdue), Some(Priority::Urgent));
        assert_eq!(
            priority_of(NotificationKind::MaintenanceReminder),
            Some(Priority::Medium)
        );
        std::fs::remove_dir_all(&dir).ok();
    }

    // ─── Per-rule failure isolation ───────────────────────

    /// Fake store whose job collection always fails to load; leads work.
    struct BrokenJobsStore {
        lead: Lead,
        notifications: Mutex<Vec<Notification>>,
    }

    #[async_trait]
    impl OpsStore for BrokenJobsStore {
        async fn jobs_for_owner(&self, _o: &str) -> fieldops_core::Result<Vec<Job>> {
            Err(FieldOpsError::Store("jobs table unavailable".into()))
        }
        async fn leads_for_owner(&self, _o: &str) -> fieldops_core::Result<Vec<Lead>> {
            Ok(vec![self.lead.clone()])
        }
        async fn payments_for_owner(&self, _o: &str) -> fieldops_core::Result<Vec<Payment>> {
            Ok(Vec::new())
        }
        async fn resources_for_owner(&self, _o: &str) -> fieldops_core::Result<Vec<Resource>> {
            Ok(Vec::new())
        }
        async fn job(&self, _id: &str) -> fieldops_core::Result<Option<Job>> {
            Ok(None)
        }
        async fn quote(&self, _id: &str) -> fieldops_core::Result<Option<Quote>> {
            Ok(None)
        }
        async fn lead(&self, _id: &str) -> fieldops_core::Result<Option<Lead>> {
            Ok(None)
        }
        async fn payment(&self, _id: &str) -> fieldops_core::Result<Option<Payment>> {
            Ok(None)
        }
        async fn invoice(&self, _id: &str) -> fieldops_core::Result<Option<Invoice>> {
            Ok(None)
        }
        async fn contract(&self, _id: &str) -> fieldops_core::Result<Option<Contract>> {
            Ok(None)
        }
        async fn create_client(&self, _c: &Client) -> fieldops_core::Result<()> {
            Ok(())
        }
        async fn create_job(&self, _j: &Job) -> fieldops_core::Result<()> {
            Ok(())
        }
        async fn update_job_status(&self, _id: &str, _s: JobStatus) -> fieldops_core::Result<()> {
            Ok(())
        }
        async fn create_lead(&self, _l: &Lead) -> fieldops_core::Result<()> {
            Ok(())
        }
        async fn create_payment(&self, _p: &Payment) -> fieldops_core::Result<()> {
            Ok(())
        }
        async fn mark_payment_paid(
            &self,
            _id: &str,
            _at: DateTime<Utc>,
        ) -> fieldops_core::Result<()> {
            Ok(())
        }
        async fn create_resource(&self, _r: &Resource) -> fieldops_core::Result<()> {
            Ok(())
        }
        async fn create_quote(&self, _q: &Quote) -> fieldops_core::Result<()> {
            Ok(())
        }
        async fn link_quote_to_job(
            &self,
            _q: &str,
            _j: &str,
            _at: DateTime<Utc>,
        ) -> fieldops_core::Result<()> {
            Ok(())
        }
        async fn create_invoice(&self, _i: &Invoice) -> fieldops_core::Result<()> {
            Ok(())
        }
        async fn create_contract(&self, _c: &Contract) -> fieldops_core::Result<()> {
            Ok(())
        }
        async fn automation_settings(
            &self,
            _o: &str,
        ) -> fieldops_core::Result<Option<AutomationSettings>> {
            Ok(None)
        }
        async fn upsert_automation_settings(
            &self,
            _s: &AutomationSettings,
        ) -> fieldops_core::Result<()> {
            Ok(())
        }
        async fn automation_owners(&self) -> fieldops_core::Result<Vec<String>> {
            Ok(Vec::new())
        }
        async fn next_invoice_number(&self, _o: &str) -> fieldops_core::Result<u32> {
            Err(FieldOpsError::Store("no settings".into()))
        }
        async fn create_notification(&self, n: &Notification) -> fieldops_core::Result<()> {
            self.notifications.lock().unwrap().push(n.clone());
            Ok(())
        }
        async fn latest_notification(
            &self,
            recipient_id: &str,
            kind: NotificationKind,
            reference_id: &str,
        ) -> fieldops_core::Result<Option<Notification>> {
            Ok(self
                .notifications
                .lock()
                .unwrap()
                .iter()
                .filter(|n| {
                    n.recipient_id == recipient_id
                        && n.kind == kind
                        && n.reference_id() == reference_id
                })
                .max_by_key(|n| n.created_at)
                .cloned())
        }
        async fn recent_notifications(
            &self,
            _r: &str,
            _unread: bool,
            _limit: usize,
        ) -> fieldops_core::Result<Vec<Notification>> {
            Ok(self.notifications.lock().unwrap().clone())
        }
        async fn mark_notification_read(&self, _id: &str) -> fieldops_core::Result<()> {
            Ok(())
        }
    }

    /// A rule whose entity load fails is logged and skipped; the other
    /// rules still run to completion.
    #[tokio::test]
    async fn test_one_broken_rule_does_not_abort_run() {
        let t0 = Utc::now();
        let store = Arc::new(BrokenJobsStore {
            lead: Lead {
                id: new_id(),
                owner_id: "owner-1".into(),
                client_id: None,
                name: "Kim".into(),
                status: LeadStatus::Contacted,
                created_at: t0 - Duration::days(5),
            },
            notifications: Mutex::new(Vec::new()),
        });
        let scheduler = scheduler_for_dyn(store.clone());

        let summary = scheduler.run_at("owner-1", t0).await.unwrap();
        // The job rule contributed nothing; the lead rule still fired.
        assert_eq!(summary, RunSummary { evaluated: 1, created: 1 });
        assert_eq!(store.notifications.lock().unwrap().len(), 1);
        assert_eq!(
            store.notifications.lock().unwrap()[0].kind,
            NotificationKind::LeadFollowUp
        );
    }

    fn scheduler_for_dyn(store: Arc<dyn OpsStore>) -> AutomationScheduler {
        let notifier = Notifier::new(store.clone());
        AutomationScheduler::new(store, notifier)
    }
}
