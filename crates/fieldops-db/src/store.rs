//! The `OpsStore` trait — every read and write the automation core makes.
//!
//! Consumed as `Arc<dyn OpsStore>` so tests can wrap the SQLite backend
//! with failure-injecting decorators.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fieldops_core::Result;
use fieldops_core::types::{
    AutomationSettings, Client, Contract, Invoice, Job, JobStatus, Lead, Notification,
    NotificationKind, Payment, Quote, Resource,
};

#[async_trait]
pub trait OpsStore: Send + Sync {
    // ─── Entity snapshots (owner-filtered) ────────────────

    async fn jobs_for_owner(&self, owner_id: &str) -> Result<Vec<Job>>;
    async fn leads_for_owner(&self, owner_id: &str) -> Result<Vec<Lead>>;
    async fn payments_for_owner(&self, owner_id: &str) -> Result<Vec<Payment>>;
    async fn resources_for_owner(&self, owner_id: &str) -> Result<Vec<Resource>>;

    // ─── Entity point lookups ─────────────────────────────

    async fn job(&self, id: &str) -> Result<Option<Job>>;
    async fn quote(&self, id: &str) -> Result<Option<Quote>>;
    async fn lead(&self, id: &str) -> Result<Option<Lead>>;
    async fn payment(&self, id: &str) -> Result<Option<Payment>>;
    async fn invoice(&self, id: &str) -> Result<Option<Invoice>>;
    async fn contract(&self, id: &str) -> Result<Option<Contract>>;

    // ─── Entity writes (workflow steps, fixtures) ─────────

    async fn create_client(&self, client: &Client) -> Result<()>;
    async fn create_job(&self, job: &Job) -> Result<()>;
    async fn update_job_status(&self, id: &str, status: JobStatus) -> Result<()>;
    async fn create_lead(&self, lead: &Lead) -> Result<()>;
    async fn create_payment(&self, payment: &Payment) -> Result<()>;
    async fn mark_payment_paid(&self, id: &str, paid_at: DateTime<Utc>) -> Result<()>;
    async fn create_resource(&self, resource: &Resource) -> Result<()>;
    async fn create_quote(&self, quote: &Quote) -> Result<()>;
    /// Record a quote's conversion: set the job reference and timestamp.
    async fn link_quote_to_job(
        &self,
        quote_id: &str,
        job_id: &str,
        converted_at: DateTime<Utc>,
    ) -> Result<()>;
    async fn create_invoice(&self, invoice: &Invoice) -> Result<()>;
    async fn create_contract(&self, contract: &Contract) -> Result<()>;

    // ─── Automation settings ──────────────────────────────

    async fn automation_settings(&self, owner_id: &str) -> Result<Option<AutomationSettings>>;
    async fn upsert_automation_settings(&self, settings: &AutomationSettings) -> Result<()>;
    /// Owners with a settings row — the scheduler loop's work list.
    async fn automation_owners(&self) -> Result<Vec<String>>;
    /// Atomically increment the owner's invoice counter and return the
    /// number that was assigned. Missing settings row is an error — the
    /// counter has nowhere to live.
    async fn next_invoice_number(&self, owner_id: &str) -> Result<u32>;

    // ─── Notifications ────────────────────────────────────

    async fn create_notification(&self, notification: &Notification) -> Result<()>;
    /// Most recent notification of this (recipient, kind, reference id) —
    /// the dedup gate's query.
    async fn latest_notification(
        &self,
        recipient_id: &str,
        kind: NotificationKind,
        reference_id: &str,
    ) -> Result<Option<Notification>>;
    async fn recent_notifications(
        &self,
        recipient_id: &str,
        unread_only: bool,
        limit: usize,
    ) -> Result<Vec<Notification>>;
    async fn mark_notification_read(&self, id: &str) -> Result<()>;
}
