//! The workflow engine — executes templates as best-effort sagas.
//!
//! Steps are strictly sequential: later steps consume ids produced by
//! earlier ones. A hard step failing ends the run with `success=false`;
//! a soft step failing is logged and its entity simply absent from the
//! report. Nothing is ever rolled back. Completion notifications go
//! through the same notifier (and dedup gate) the scheduler uses, so
//! re-running a flow cannot duplicate them.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::watch;

use fieldops_automation::{Candidate, Notifier};
use fieldops_core::types::{
    Contract, ContractStatus, Invoice, InvoiceStatus, Job, JobStatus, LineItem, NotificationKind,
    Priority, Quote, QuoteStatus, new_id,
};
use fieldops_db::OpsStore;

use crate::templates::{CreatedEntity, EntityKind, WorkflowExecution, WorkflowTemplate};

pub struct WorkflowEngine {
    store: Arc<dyn OpsStore>,
    notifier: Notifier,
    progress: watch::Sender<u8>,
}

impl WorkflowEngine {
    pub fn new(store: Arc<dyn OpsStore>, notifier: Notifier) -> Self {
        let (progress, _) = watch::channel(0);
        Self {
            store,
            notifier,
            progress,
        }
    }

    /// Observe execution progress (0–100). Observational only — a run
    /// cannot be cancelled once started; entities it created remain.
    pub fn progress(&self) -> watch::Receiver<u8> {
        self.progress.subscribe()
    }

    fn set_progress(&self, done: usize, total: usize) {
        let pct = ((done * 100) / total.max(1)) as u8;
        let _ = self.progress.send(pct);
    }

    /// Execute a template against a source entity. Always returns the
    /// execution report; hard failures surface as `success=false` with a
    /// human-readable error.
    pub async fn execute(
        &self,
        template: WorkflowTemplate,
        source_id: &str,
    ) -> WorkflowExecution {
        let _ = self.progress.send(0);
        tracing::info!("▶️ Workflow {template} started for {source_id}");

        let result = match template {
            WorkflowTemplate::QuoteToJob => self.quote_to_job(source_id).await,
            WorkflowTemplate::JobToInvoice => self.job_to_invoice(source_id).await,
            WorkflowTemplate::PaymentToReceipt => self.payment_to_receipt(source_id).await,
            WorkflowTemplate::LeadToQuote => self.lead_to_quote(source_id).await,
            WorkflowTemplate::JobCompleteFlow => self.job_complete_flow(source_id).await,
        };

        if result.success {
            let _ = self.progress.send(100);
            tracing::info!(
                "✅ Workflow {template} finished: {} created",
                result.created.len()
            );
        } else {
            tracing::warn!(
                "❌ Workflow {template} failed: {}",
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
        result
    }

    /// quote_to_job: create Job (hard) → link quote (soft) → draft
    /// Contract (soft).
    async fn quote_to_job(&self, source_id: &str) -> WorkflowExecution {
        let template = WorkflowTemplate::QuoteToJob;
        let total = template.steps().len();
        let mut created = Vec::new();
        let now = Utc::now();

        let quote = match self.store.quote(source_id).await {
            Ok(Some(quote)) => quote,
            Ok(None) => {
                return WorkflowExecution::failed(
                    template,
                    source_id,
                    created,
                    format!("Quote {source_id} not found"),
                );
            }
            Err(e) => {
                return WorkflowExecution::failed(template, source_id, created, e.to_string());
            }
        };

        let job = Job {
            id: new_id(),
            owner_id: quote.owner_id.clone(),
            client_id: quote.client_id.clone(),
            title: quote.title.clone(),
            status: JobStatus::Confirmed,
            start_at: None,
            revenue: quote.total,
            created_at: now,
        };
        if let Err(e) = self.store.create_job(&job).await {
            return WorkflowExecution::failed(
                template,
                source_id,
                created,
                format!("Create job: {e}"),
            );
        }
        created.push(CreatedEntity {
            kind: EntityKind::Job,
            id: job.id.clone(),
        });
        self.set_progress(1, total);

        if let Err(e) = self.store.link_quote_to_job(&quote.id, &job.id, now).await {
            tracing::warn!("⚠️ Quote conversion not recorded: {e}");
        }
        self.set_progress(2, total);

        let contract = Contract {
            id: new_id(),
            owner_id: quote.owner_id.clone(),
            client_id: quote.client_id.clone(),
            job_id: job.id.clone(),
            status: ContractStatus::Draft,
            created_at: now,
        };
        match self.store.create_contract(&contract).await {
            Ok(()) => created.push(CreatedEntity {
                kind: EntityKind::Contract,
                id: contract.id,
            }),
            Err(e) => tracing::warn!("⚠️ Draft contract not created: {e}"),
        }
        self.set_progress(3, total);

        WorkflowExecution::succeeded(template, source_id, created)
    }

    /// job_to_invoice: load numbering settings (hard) → atomically
    /// allocate the next number (hard) → create the invoice (hard).
    /// A failure after allocation leaves a numbering gap; numbers stay
    /// strictly monotonic.
    async fn job_to_invoice(&self, source_id: &str) -> WorkflowExecution {
        let template = WorkflowTemplate::JobToInvoice;
        let total = template.steps().len();
        let created = Vec::new();

        let job = match self.store.job(source_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                return WorkflowExecution::failed(
                    template,
                    source_id,
                    created,
                    format!("Job {source_id} not found"),
                );
            }
            Err(e) => {
                return WorkflowExecution::failed(template, source_id, created, e.to_string());
            }
        };

        let settings = match self.store.automation_settings(&job.owner_id).await {
            Ok(Some(settings)) => settings,
            Ok(None) => {
                return WorkflowExecution::failed(
                    template,
                    source_id,
                    created,
                    format!("No invoice numbering settings for owner {}", job.owner_id),
                );
            }
            Err(e) => {
                return WorkflowExecution::failed(template, source_id, created, e.to_string());
            }
        };
        self.set_progress(1, total);

        let number = match self.store.next_invoice_number(&job.owner_id).await {
            Ok(number) => number,
            Err(e) => {
                return WorkflowExecution::failed(
                    template,
                    source_id,
                    created,
                    format!("Allocate invoice number: {e}"),
                );
            }
        };
        self.set_progress(2, total);

        let invoice = Invoice {
            id: new_id(),
            owner_id: job.owner_id.clone(),
            client_id: job.client_id.clone(),
            job_id: Some(job.id.clone()),
            number: format!("{}{number:04}", settings.invoice_prefix),
            line_items: vec![LineItem {
                description: job.title.clone(),
                quantity: 1.0,
                unit_price: job.revenue,
            }],
            total: job.revenue,
            status: InvoiceStatus::Draft,
            issued_at: Utc::now(),
        };
        if let Err(e) = self.store.create_invoice(&invoice).await {
            return WorkflowExecution::failed(
                template,
                source_id,
                created,
                format!("Create invoice: {e}"),
            );
        }
        self.set_progress(3, total);

        WorkflowExecution::succeeded(
            template,
            source_id,
            vec![CreatedEntity {
                kind: EntityKind::Invoice,
                id: invoice.id,
            }],
        )
    }

    /// payment_to_receipt: flip the payment to paid. Creates nothing —
    /// receipt rendering is an external collaborator.
    async fn payment_to_receipt(&self, source_id: &str) -> WorkflowExecution {
        let template = WorkflowTemplate::PaymentToReceipt;
        let created = Vec::new();

        let payment = match self.store.payment(source_id).await {
            Ok(Some(payment)) => payment,
            Ok(None) => {
                return WorkflowExecution::failed(
                    template,
                    source_id,
                    created,
                    format!("Payment {source_id} not found"),
                );
            }
            Err(e) => {
                return WorkflowExecution::failed(template, source_id, created, e.to_string());
            }
        };

        if let Err(e) = self.store.mark_payment_paid(&payment.id, Utc::now()).await {
            return WorkflowExecution::failed(
                template,
                source_id,
                created,
                format!("Mark payment paid: {e}"),
            );
        }
        self.set_progress(1, 1);

        WorkflowExecution::succeeded(template, source_id, created)
    }

    /// lead_to_quote: draft quote with a single zeroed line item,
    /// referencing the lead's client.
    async fn lead_to_quote(&self, source_id: &str) -> WorkflowExecution {
        let template = WorkflowTemplate::LeadToQuote;
        let created = Vec::new();

        let lead = match self.store.lead(source_id).await {
            Ok(Some(lead)) => lead,
            Ok(None) => {
                return WorkflowExecution::failed(
                    template,
                    source_id,
                    created,
                    format!("Lead {source_id} not found"),
                );
            }
            Err(e) => {
                return WorkflowExecution::failed(template, source_id, created, e.to_string());
            }
        };
        let Some(client_id) = lead.client_id.clone() else {
            return WorkflowExecution::failed(
                template,
                source_id,
                created,
                format!("Lead {} has no client to quote", lead.name),
            );
        };

        let quote = Quote {
            id: new_id(),
            owner_id: lead.owner_id.clone(),
            client_id,
            title: format!("Quote for {}", lead.name),
            line_items: vec![LineItem {
                description: String::new(),
                quantity: 1.0,
                unit_price: 0.0,
            }],
            total: 0.0,
            status: QuoteStatus::Draft,
            job_id: None,
            converted_at: None,
            created_at: Utc::now(),
        };
        if let Err(e) = self.store.create_quote(&quote).await {
            return WorkflowExecution::failed(
                template,
                source_id,
                created,
                format!("Create quote: {e}"),
            );
        }
        self.set_progress(1, 1);

        WorkflowExecution::succeeded(
            template,
            source_id,
            vec![CreatedEntity {
                kind: EntityKind::Quote,
                id: quote.id,
            }],
        )
    }

    /// job_complete_flow: invoice first, status flip last — a failed
    /// invoice sub-workflow leaves the job untouched. The completion
    /// notification is soft and dedup-gated.
    async fn job_complete_flow(&self, source_id: &str) -> WorkflowExecution {
        let template = WorkflowTemplate::JobCompleteFlow;
        let total = template.steps().len();
        let mut created = Vec::new();

        let sub = self.job_to_invoice(source_id).await;
        created.extend(sub.created.iter().cloned());
        if !sub.success {
            return WorkflowExecution::failed(
                template,
                source_id,
                created,
                sub.error
                    .unwrap_or_else(|| "Invoice sub-workflow failed".into()),
            );
        }
        self.set_progress(1, total);

        if let Err(e) = self
            .store
            .update_job_status(source_id, JobStatus::Completed)
            .await
        {
            return WorkflowExecution::failed(
                template,
                source_id,
                created,
                format!("Complete job: {e}"),
            );
        }
        self.set_progress(2, total);

        match self.store.job(source_id).await {
            Ok(Some(job)) => {
                let candidate = Candidate {
                    kind: NotificationKind::JobCompleted,
                    priority: Priority::Medium,
                    title: "Job completed".into(),
                    message: format!("{} is complete and invoiced", job.title),
                    reference_id: job.id.clone(),
                };
                let deliver_to = self
                    .store
                    .automation_settings(&job.owner_id)
                    .await
                    .ok()
                    .flatten()
                    .and_then(|s| s.notification_email);
                if let Err(e) = self
                    .notifier
                    .publish(&job.owner_id, &candidate, Utc::now(), deliver_to.as_deref())
                    .await
                {
                    tracing::warn!("⚠️ Completion notification not created: {e}");
                }
            }
            _ => tracing::warn!("⚠️ Completion notification skipped: job unavailable"),
        }
        self.set_progress(3, total);

        WorkflowExecution::succeeded(template, source_id, created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration};
    use fieldops_core::Result;
    use fieldops_core::error::FieldOpsError;
    use fieldops_core::types::{
        AutomationSettings, Client, Lead, LeadStatus, Notification, Payment, PaymentStatus,
        Resource,
    };
    use fieldops_db::SqliteStore;

    fn test_store(name: &str) -> (Arc<SqliteStore>, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("fieldops-wf-{name}"));
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).ok();
        let store = SqliteStore::open(&dir.join("test.db")).unwrap();
        (Arc::new(store), dir)
    }

    fn engine_for(store: Arc<dyn OpsStore>) -> WorkflowEngine {
        let notifier = Notifier::new(store.clone());
        WorkflowEngine::new(store, notifier)
    }

    async fn seed_quote(store: &SqliteStore, owner: &str) -> Quote {
        let quote = Quote {
            id: new_id(),
            owner_id: owner.into(),
            client_id: "client-1".into(),
            title: "Fence repair".into(),
            line_items: vec![LineItem {
                description: "Labour".into(),
                quantity: 8.0,
                unit_price: 95.0,
            }],
            total: 760.0,
            status: QuoteStatus::Sent,
            job_id: None,
            converted_at: None,
            created_at: Utc::now(),
        };
        store.create_quote(&quote).await.unwrap();
        quote
    }

    async fn seed_job(store: &SqliteStore, owner: &str) -> Job {
        let job = Job {
            id: new_id(),
            owner_id: owner.into(),
            client_id: "client-1".into(),
            title: "Fence repair".into(),
            status: JobStatus::Confirmed,
            start_at: None,
            revenue: 760.0,
            created_at: Utc::now(),
        };
        store.create_job(&job).await.unwrap();
        job
    }

    #[tokio::test]
    async fn test_quote_to_job_creates_job_link_and_contract() {
        let (store, dir) = test_store("q2j");
        let quote = seed_quote(&store, "owner-1").await;
        let engine = engine_for(store.clone());

        let result = engine.execute(WorkflowTemplate::QuoteToJob, &quote.id).await;
        assert!(result.success);
        assert_eq!(result.created.len(), 2);
        assert_eq!(result.created[0].kind, EntityKind::Job);
        assert_eq!(result.created[1].kind, EntityKind::Contract);

        let job = store.job(&result.created[0].id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Confirmed);
        assert_eq!(job.revenue, 760.0);

        let quote = store.quote(&quote.id).await.unwrap().unwrap();
        assert_eq!(quote.job_id.as_deref(), Some(result.created[0].id.as_str()));
        assert!(quote.converted_at.is_some());

        let contract = store.contract(&result.created[1].id).await.unwrap().unwrap();
        assert_eq!(contract.status, ContractStatus::Draft);
        assert_eq!(contract.job_id, result.created[0].id);

        assert_eq!(*engine.progress().borrow(), 100);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_quote_to_job_missing_quote_is_hard_failure() {
        let (store, dir) = test_store("q2j-missing");
        let engine = engine_for(store);
        let result = engine.execute(WorkflowTemplate::QuoteToJob, "nope").await;
        assert!(!result.success);
        assert!(result.created.is_empty());
        assert!(result.error.unwrap().contains("not found"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_job_to_invoice_sequential_numbering() {
        let (store, dir) = test_store("j2i");
        store
            .upsert_automation_settings(&AutomationSettings::for_owner("owner-1"))
            .await
            .unwrap();
        let job_a = seed_job(&store, "owner-1").await;
        let job_b = seed_job(&store, "owner-1").await;
        let engine = engine_for(store.clone());

        let first = engine.execute(WorkflowTemplate::JobToInvoice, &job_a.id).await;
        let second = engine.execute(WorkflowTemplate::JobToInvoice, &job_b.id).await;
        assert!(first.success && second.success);

        let inv_a = store.invoice(&first.created[0].id).await.unwrap().unwrap();
        let inv_b = store.invoice(&second.created[0].id).await.unwrap().unwrap();
        assert_eq!(inv_a.number, "INV-0001");
        assert_eq!(inv_b.number, "INV-0002");
        assert_eq!(inv_a.job_id.as_deref(), Some(job_a.id.as_str()));
        assert_eq!(inv_a.line_items.len(), 1);
        assert_eq!(inv_a.line_items[0].description, "Fence repair");
        assert_eq!(inv_a.total, 760.0);

        // Counter consumed exactly once per allocation.
        let settings = store.automation_settings("owner-1").await.unwrap().unwrap();
        assert_eq!(settings.next_invoice_number, 3);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_job_to_invoice_requires_numbering_settings() {
        let (store, dir) = test_store("j2i-nosettings");
        let job = seed_job(&store, "owner-1").await;
        let engine = engine_for(store);

        let result = engine.execute(WorkflowTemplate::JobToInvoice, &job.id).await;
        assert!(!result.success);
        assert!(result.created.is_empty());
        assert!(result.error.unwrap().contains("numbering settings"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_payment_to_receipt_marks_paid() {
        let (store, dir) = test_store("p2r");
        let payment = Payment {
            id: new_id(),
            owner_id: "owner-1".into(),
            client_id: "client-1".into(),
            invoice_id: None,
            amount: 320.0,
            status: PaymentStatus::Pending,
            pending_since: Utc::now() - Duration::days(3),
            paid_at: None,
        };
        store.create_payment(&payment).await.unwrap();
        let engine = engine_for(store.clone());

        let result = engine
            .execute(WorkflowTemplate::PaymentToReceipt, &payment.id)
            .await;
        assert!(result.success);
        assert!(result.created.is_empty());
        let payment = store.payment(&payment.id).await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Paid);
        assert!(payment.paid_at.is_some());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_lead_to_quote_drafts_zeroed_quote() {
        let (store, dir) = test_store("l2q");
        let lead = Lead {
            id: new_id(),
            owner_id: "owner-1".into(),
            client_id: Some("client-7".into()),
            name: "Riley".into(),
            status: LeadStatus::Contacted,
            created_at: Utc::now(),
        };
        store.create_lead(&lead).await.unwrap();
        let engine = engine_for(store.clone());

        let result = engine.execute(WorkflowTemplate::LeadToQuote, &lead.id).await;
        assert!(result.success);
        assert_eq!(result.created[0].kind, EntityKind::Quote);

        let quote = store.quote(&result.created[0].id).await.unwrap().unwrap();
        assert_eq!(quote.status, QuoteStatus::Draft);
        assert_eq!(quote.client_id, "client-7");
        assert_eq!(quote.total, 0.0);
        assert_eq!(quote.line_items.len(), 1);
        assert_eq!(quote.line_items[0].unit_price, 0.0);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_lead_to_quote_without_client_fails() {
        let (store, dir) = test_store("l2q-noclient");
        let lead = Lead {
            id: new_id(),
            owner_id: "owner-1".into(),
            client_id: None,
            name: "Jules".into(),
            status: LeadStatus::New,
            created_at: Utc::now(),
        };
        store.create_lead(&lead).await.unwrap();
        let engine = engine_for(store);

        let result = engine.execute(WorkflowTemplate::LeadToQuote, &lead.id).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("no client"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_job_complete_flow_invoices_completes_and_notifies() {
        let (store, dir) = test_store("complete");
        store
            .upsert_automation_settings(&AutomationSettings::for_owner("owner-1"))
            .await
            .unwrap();
        let job = seed_job(&store, "owner-1").await;
        let engine = engine_for(store.clone());

        let result = engine
            .execute(WorkflowTemplate::JobCompleteFlow, &job.id)
            .await;
        assert!(result.success);
        assert_eq!(result.created.len(), 1);
        assert_eq!(result.created[0].kind, EntityKind::Invoice);

        let job_after = store.job(&job.id).await.unwrap().unwrap();
        assert_eq!(job_after.status, JobStatus::Completed);

        let notifications = store.recent_notifications("owner-1", false, 10).await.unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].kind, NotificationKind::JobCompleted);
        assert_eq!(notifications[0].reference_id(), job.id);

        // Re-running within the cooldown invoices again (at-least-once is
        // accepted) but cannot duplicate the completion notification.
        let rerun = engine
            .execute(WorkflowTemplate::JobCompleteFlow, &job.id)
            .await;
        assert!(rerun.success);
        let notifications = store.recent_notifications("owner-1", false, 10).await.unwrap();
        assert_eq!(notifications.len(), 1);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_job_complete_flow_failed_invoice_leaves_job_untouched() {
        let (store, dir) = test_store("complete-fail");
        // No settings row: the invoice sub-workflow fails hard.
        let job = seed_job(&store, "owner-1").await;
        let engine = engine_for(store.clone());

        let result = engine
            .execute(WorkflowTemplate::JobCompleteFlow, &job.id)
            .await;
        assert!(!result.success);
        assert!(result.created.is_empty());

        // The status flip runs after the sub-workflow, so nothing changed.
        let job_after = store.job(&job.id).await.unwrap().unwrap();
        assert_eq!(job_after.status, JobStatus::Confirmed);
        assert!(
            store
                .recent_notifications("owner-1", false, 10)
                .await
                .unwrap()
                .is_empty()
        );
        std::fs::remove_dir_all(&dir).ok();
    }

    // ─── Forced soft-step failure ─────────────────────────

    /// Wraps the SQLite store and fails the named operations.
    struct FailingStore {
        inner: Arc<SqliteStore>,
        fail_ops: &'static [&'static str],
    }

    impl FailingStore {
        fn check(&self, op: &str) -> Result<()> {
            if self.fail_ops.contains(&op) {
                Err(FieldOpsError::Store(format!("injected failure: {op}")))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl OpsStore for FailingStore {
        async fn jobs_for_owner(&self, o: &str) -> Result<Vec<Job>> {
            self.inner.jobs_for_owner(o).await
        }
        async fn leads_for_owner(&self, o: &str) -> Result<Vec<Lead>> {
            self.inner.leads_for_owner(o).await
        }
        async fn payments_for_owner(&self, o: &str) -> Result<Vec<Payment>> {
            self.inner.payments_for_owner(o).await
        }
        async fn resources_for_owner(&self, o: &str) -> Result<Vec<Resource>> {
            self.inner.resources_for_owner(o).await
        }
        async fn job(&self, id: &str) -> Result<Option<Job>> {
            self.inner.job(id).await
        }
        async fn quote(&self, id: &str) -> Result<Option<Quote>> {
            self.inner.quote(id).await
        }
        async fn lead(&self, id: &str) -> Result<Option<Lead>> {
            self.inner.lead(id).await
        }
        async fn payment(&self, id: &str) -> Result<Option<Payment>> {
            self.inner.payment(id).await
        }
        async fn invoice(&self, id: &str) -> Result<Option<Invoice>> {
            self.inner.invoice(id).await
        }
        async fn contract(&self, id: &str) -> Result<Option<Contract>> {
            self.inner.contract(id).await
        }
        async fn create_client(&self, c: &Client) -> Result<()> {
            self.inner.create_client(c).await
        }
        async fn create_job(&self, j: &Job) -> Result<()> {
            self.check("create_job")?;
            self.inner.create_job(j).await
        }
        async fn update_job_status(&self, id: &str, s: JobStatus) -> Result<()> {
            self.check("update_job_status")?;
            self.inner.update_job_status(id, s).await
        }
        async fn create_lead(&self, l: &Lead) -> Result<()> {
            self.inner.create_lead(l).await
        }
        async fn create_payment(&self, p: &Payment) -> Result<()> {
            self.inner.create_payment(p).await
        }
        async fn mark_payment_paid(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
            self.inner.mark_payment_paid(id, at).await
        }
        async fn create_resource(&self, r: &Resource) -> Result<()> {
            self.inner.create_resource(r).await
        }
        async fn create_quote(&self, q: &Quote) -> Result<()> {
            self.check("create_quote")?;
            self.inner.create_quote(q).await
        }
        async fn link_quote_to_job(
            &self,
            q: &str,
            j: &str,
            at: DateTime<Utc>,
        ) -> Result<()> {
            self.check("link_quote_to_job")?;
            self.inner.link_quote_to_job(q, j, at).await
        }
        async fn create_invoice(&self, i: &Invoice) -> Result<()> {
            self.check("create_invoice")?;
            self.inner.create_invoice(i).await
        }
        async fn create_contract(&self, c: &Contract) -> Result<()> {
            self.check("create_contract")?;
            self.inner.create_contract(c).await
        }
        async fn automation_settings(&self, o: &str) -> Result<Option<AutomationSettings>> {
            self.inner.automation_settings(o).await
        }
        async fn upsert_automation_settings(&self, s: &AutomationSettings) -> Result<()> {
            self.inner.upsert_automation_settings(s).await
        }
        async fn automation_owners(&self) -> Result<Vec<String>> {
            self.inner.automation_owners().await
        }
        async fn next_invoice_number(&self, o: &str) -> Result<u32> {
            self.inner.next_invoice_number(o).await
        }
        async fn create_notification(&self, n: &Notification) -> Result<()> {
            self.inner.create_notification(n).await
        }
        async fn latest_notification(
            &self,
            r: &str,
            kind: NotificationKind,
            reference_id: &str,
        ) -> Result<Option<Notification>> {
            self.inner.latest_notification(r, kind, reference_id).await
        }
        async fn recent_notifications(
            &self,
            r: &str,
            unread_only: bool,
            limit: usize,
        ) -> Result<Vec<Notification>> {
            self.inner.recent_notifications(r, unread_only, limit).await
        }
        async fn mark_notification_read(&self, id: &str) -> Result<()> {
            self.inner.mark_notification_read(id).await
        }
    }

    /// Contract creation is a soft step: its failure leaves the workflow
    /// successful, with the job reported and the contract absent.
    #[tokio::test]
    async fn test_quote_to_job_partial_success_on_contract_failure() {
        let (sqlite, dir) = test_store("q2j-partial");
        let quote = seed_quote(&sqlite, "owner-1").await;
        let store = Arc::new(FailingStore {
            inner: sqlite.clone(),
            fail_ops: &["create_contract"],
        });
        let engine = engine_for(store);

        let result = engine.execute(WorkflowTemplate::QuoteToJob, &quote.id).await;
        assert!(result.success);
        assert_eq!(result.created.len(), 1);
        assert_eq!(result.created[0].kind, EntityKind::Job);

        // The job exists and the quote was linked; no contract anywhere.
        assert!(sqlite.job(&result.created[0].id).await.unwrap().is_some());
        let quote = sqlite.quote(&quote.id).await.unwrap().unwrap();
        assert!(quote.converted_at.is_some());
        std::fs::remove_dir_all(&dir).ok();
    }

    /// The first step failing is the only hard failure in quote_to_job.
    #[tokio::test]
    async fn test_quote_to_job_job_failure_aborts() {
        let (sqlite, dir) = test_store("q2j-hard");
        let quote = seed_quote(&sqlite, "owner-1").await;
        let store = Arc::new(FailingStore {
            inner: sqlite.clone(),
            fail_ops: &["create_job"],
        });
        let engine = engine_for(store);

        let result = engine.execute(WorkflowTemplate::QuoteToJob, &quote.id).await;
        assert!(!result.success);
        assert!(result.created.is_empty());
        // Nothing was linked either — the run stopped at step 1.
        let quote = sqlite.quote(&quote.id).await.unwrap().unwrap();
        assert!(quote.converted_at.is_none());
        std::fs::remove_dir_all(&dir).ok();
    }
}
