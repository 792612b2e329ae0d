//! SQLite implementation of `OpsStore`.
//!
//! Single-file database, WAL mode for concurrent readers, RFC 3339
//! timestamps, JSON text columns for line items and notification payloads.
//! Every call is a short request; the connection sits behind a mutex.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use fieldops_core::error::FieldOpsError;
use fieldops_core::types::{
    AutomationSettings, Client, Contract, ContractStatus, Invoice, InvoiceStatus, Job, JobStatus,
    Lead, LeadStatus, LineItem, Notification, NotificationKind, Payment, PaymentStatus, Priority,
    Quote, QuoteStatus, Resource,
};
use fieldops_core::Result;

use crate::store::OpsStore;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| FieldOpsError::Store(format!("DB open: {e}")))?;

        // WAL allows concurrent readers/writers and avoids "database is locked"
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(|e| FieldOpsError::Store(format!("DB pragma: {e}")))?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        tracing::debug!("📦 Store opened at {}", path.display());
        Ok(store)
    }

    /// Run schema migrations.
    fn migrate(&self) -> Result<()> {
        self.conn()?
            .execute_batch(
                "
            CREATE TABLE IF NOT EXISTS clients (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT,
                phone TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                client_id TEXT NOT NULL,
                title TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                start_at TEXT,
                revenue REAL NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS leads (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                client_id TEXT,
                name TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'new',
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS payments (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                client_id TEXT NOT NULL,
                invoice_id TEXT,
                amount REAL NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'pending',
                pending_since TEXT NOT NULL,
                paid_at TEXT
            );

            CREATE TABLE IF NOT EXISTS resources (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                name TEXT NOT NULL,
                next_maintenance_at TEXT
            );

            CREATE TABLE IF NOT EXISTS quotes (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                client_id TEXT NOT NULL,
                title TEXT NOT NULL,
                line_items TEXT NOT NULL DEFAULT '[]',   -- JSON array
                total REAL NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'draft',
                job_id TEXT,
                converted_at TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS invoices (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                client_id TEXT NOT NULL,
                job_id TEXT,
                number TEXT NOT NULL,
                line_items TEXT NOT NULL DEFAULT '[]',   -- JSON array
                total REAL NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'draft',
                issued_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS contracts (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                client_id TEXT NOT NULL,
                job_id TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'draft',
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS automation_settings (
                owner_id TEXT PRIMARY KEY,
                job_reminders INTEGER NOT NULL DEFAULT 1,
                lead_follow_ups INTEGER NOT NULL DEFAULT 1,
                payment_reminders INTEGER NOT NULL DEFAULT 1,
                maintenance_reminders INTEGER NOT NULL DEFAULT 1,
                notification_email TEXT,
                invoice_prefix TEXT NOT NULL DEFAULT 'INV-',
                next_invoice_number INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS notifications (
                id TEXT PRIMARY KEY,
                recipient_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                payload TEXT NOT NULL,                   -- JSON object
                priority TEXT NOT NULL DEFAULT 'medium',
                is_read INTEGER NOT NULL DEFAULT 0,
                reference_id TEXT NOT NULL,              -- extracted from payload at insert
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_notifications_dedup
                ON notifications (recipient_id, kind, reference_id, created_at);
         ",
            )
            .map_err(|e| FieldOpsError::Store(format!("Migration: {e}")))?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| FieldOpsError::Store(format!("Connection lock: {e}")))
    }
}

// ─── Row mapping helpers ──────────────────────────────────

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_opt_ts(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|d| d.with_timezone(&Utc))
}

fn parse_line_items(json: &str) -> Vec<LineItem> {
    serde_json::from_str(json).unwrap_or_default()
}

const JOB_SELECT: &str =
    "SELECT id, owner_id, client_id, title, status, start_at, revenue, created_at FROM jobs";

fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<Job> {
    let status: String = row.get(4)?;
    let start_at: Option<String> = row.get(5)?;
    let created_at: String = row.get(7)?;
    Ok(Job {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        client_id: row.get(2)?,
        title: row.get(3)?,
        status: JobStatus::parse(&status).unwrap_or(JobStatus::Pending),
        start_at: parse_opt_ts(start_at),
        revenue: row.get(6)?,
        created_at: parse_ts(&created_at),
    })
}

const LEAD_SELECT: &str = "SELECT id, owner_id, client_id, name, status, created_at FROM leads";

fn row_to_lead(row: &rusqlite::Row) -> rusqlite::Result<Lead> {
    let status: String = row.get(4)?;
    let created_at: String = row.get(5)?;
    Ok(Lead {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        client_id: row.get(2)?,
        name: row.get(3)?,
        status: LeadStatus::parse(&status).unwrap_or(LeadStatus::New),
        created_at: parse_ts(&created_at),
    })
}

const PAYMENT_SELECT: &str =
    "SELECT id, owner_id, client_id, invoice_id, amount, status, pending_since, paid_at FROM payments";

fn row_to_payment(row: &rusqlite::Row) -> rusqlite::Result<Payment> {
    let status: String = row.get(5)?;
    let pending_since: String = row.get(6)?;
    let paid_at: Option<String> = row.get(7)?;
    Ok(Payment {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        client_id: row.get(2)?,
        invoice_id: row.get(3)?,
        amount: row.get(4)?,
        status: PaymentStatus::parse(&status).unwrap_or(PaymentStatus::Pending),
        pending_since: parse_ts(&pending_since),
        paid_at: parse_opt_ts(paid_at),
    })
}

const RESOURCE_SELECT: &str = "SELECT id, owner_id, name, next_maintenance_at FROM resources";

fn row_to_resource(row: &rusqlite::Row) -> rusqlite::Result<Resource> {
    let next_maintenance_at: Option<String> = row.get(3)?;
    Ok(Resource {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        next_maintenance_at: parse_opt_ts(next_maintenance_at),
    })
}

const QUOTE_SELECT: &str =
    "SELECT id, owner_id, client_id, title, line_items, total, status, job_id, converted_at, created_at FROM quotes";

fn row_to_quote(row: &rusqlite::Row) -> rusqlite::Result<Quote> {
    let line_items: String = row.get(4)?;
    let status: String = row.get(6)?;
    let converted_at: Option<String> = row.get(8)?;
    let created_at: String = row.get(9)?;
    Ok(Quote {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        client_id: row.get(2)?,
        title: row.get(3)?,
        line_items: parse_line_items(&line_items),
        total: row.get(5)?,
        status: QuoteStatus::parse(&status).unwrap_or(QuoteStatus::Draft),
        job_id: row.get(7)?,
        converted_at: parse_opt_ts(converted_at),
        created_at: parse_ts(&created_at),
    })
}

const INVOICE_SELECT: &str =
    "SELECT id, owner_id, client_id, job_id, number, line_items, total, status, issued_at FROM invoices";

fn row_to_invoice(row: &rusqlite::Row) -> rusqlite::Result<Invoice> {
    let line_items: String = row.get(5)?;
    let status: String = row.get(7)?;
    let issued_at: String = row.get(8)?;
    Ok(Invoice {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        client_id: row.get(2)?,
        job_id: row.get(3)?,
        number: row.get(4)?,
        line_items: parse_line_items(&line_items),
        total: row.get(6)?,
        status: InvoiceStatus::parse(&status).unwrap_or(InvoiceStatus::Draft),
        issued_at: parse_ts(&issued_at),
    })
}

const CONTRACT_SELECT: &str =
    "SELECT id, owner_id, client_id, job_id, status, created_at FROM contracts";

fn row_to_contract(row: &rusqlite::Row) -> rusqlite::Result<Contract> {
    let status: String = row.get(4)?;
    let created_at: String = row.get(5)?;
    Ok(Contract {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        client_id: row.get(2)?,
        job_id: row.get(3)?,
        status: ContractStatus::parse(&status).unwrap_or(ContractStatus::Draft),
        created_at: parse_ts(&created_at),
    })
}

const SETTINGS_SELECT: &str =
    "SELECT owner_id, job_reminders, lead_follow_ups, payment_reminders, maintenance_reminders, notification_email, invoice_prefix, next_invoice_number FROM automation_settings";

fn row_to_settings(row: &rusqlite::Row) -> rusqlite::Result<AutomationSettings> {
    Ok(AutomationSettings {
        owner_id: row.get(0)?,
        job_reminders: row.get::<_, i32>(1)? != 0,
        lead_follow_ups: row.get::<_, i32>(2)? != 0,
        payment_reminders: row.get::<_, i32>(3)? != 0,
        maintenance_reminders: row.get::<_, i32>(4)? != 0,
        notification_email: row.get(5)?,
        invoice_prefix: row.get(6)?,
        next_invoice_number: row.get(7)?,
    })
}

const NOTIFICATION_SELECT: &str =
    "SELECT id, recipient_id, kind, payload, priority, is_read, created_at FROM notifications";

fn row_to_notification(row: &rusqlite::Row) -> rusqlite::Result<Notification> {
    let kind_str: String = row.get(2)?;
    let kind = NotificationKind::parse(&kind_str).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(2, "kind".into(), rusqlite::types::Type::Text)
    })?;
    let payload: String = row.get(3)?;
    let priority: String = row.get(4)?;
    let created_at: String = row.get(6)?;
    Ok(Notification {
        id: row.get(0)?,
        recipient_id: row.get(1)?,
        kind,
        payload: serde_json::from_str(&payload).unwrap_or_default(),
        priority: Priority::parse(&priority).unwrap_or(Priority::Medium),
        read: row.get::<_, i32>(5)? != 0,
        created_at: parse_ts(&created_at),
    })
}

#[async_trait]
impl OpsStore for SqliteStore {
    async fn jobs_for_owner(&self, owner_id: &str) -> Result<Vec<Job>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!("{JOB_SELECT} WHERE owner_id = ?1 ORDER BY created_at"))
            .map_err(|e| FieldOpsError::Store(format!("List jobs: {e}")))?;
        let rows = stmt
            .query_map([owner_id], row_to_job)
            .map_err(|e| FieldOpsError::Store(format!("List jobs: {e}")))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    async fn leads_for_owner(&self, owner_id: &str) -> Result<Vec<Lead>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!("{LEAD_SELECT} WHERE owner_id = ?1 ORDER BY created_at"))
            .map_err(|e| FieldOpsError::Store(format!("List leads: {e}")))?;
        let rows = stmt
            .query_map([owner_id], row_to_lead)
            .map_err(|e| FieldOpsError::Store(format!("List leads: {e}")))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    async fn payments_for_owner(&self, owner_id: &str) -> Result<Vec<Payment>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!("{PAYMENT_SELECT} WHERE owner_id = ?1 ORDER BY pending_since"))
            .map_err(|e| FieldOpsError::Store(format!("List payments: {e}")))?;
        let rows = stmt
            .query_map([owner_id], row_to_payment)
            .map_err(|e| FieldOpsError::Store(format!("List payments: {e}")))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    async fn resources_for_owner(&self, owner_id: &str) -> Result<Vec<Resource>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!("{RESOURCE_SELECT} WHERE owner_id = ?1 ORDER BY name"))
            .map_err(|e| FieldOpsError::Store(format!("List resources: {e}")))?;
        let rows = stmt
            .query_map([owner_id], row_to_resource)
            .map_err(|e| FieldOpsError::Store(format!("List resources: {e}")))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    async fn job(&self, id: &str) -> Result<Option<Job>> {
        self.conn()?
            .query_row(&format!("{JOB_SELECT} WHERE id = ?1"), [id], row_to_job)
            .optional()
            .map_err(|e| FieldOpsError::Store(format!("Get job: {e}")))
    }

    async fn quote(&self, id: &str) -> Result<Option<Quote>> {
        self.conn()?
            .query_row(&format!("{QUOTE_SELECT} WHERE id = ?1"), [id], row_to_quote)
            .optional()
            .map_err(|e| FieldOpsError::Store(format!("Get quote: {e}")))
    }

    async fn lead(&self, id: &str) -> Result<Option<Lead>> {
        self.conn()?
            .query_row(&format!("{LEAD_SELECT} WHERE id = ?1"), [id], row_to_lead)
            .optional()
            .map_err(|e| FieldOpsError::Store(format!("Get lead: {e}")))
    }

    async fn payment(&self, id: &str) -> Result<Option<Payment>> {
        self.conn()?
            .query_row(&format!("{PAYMENT_SELECT} WHERE id = ?1"), [id], row_to_payment)
            .optional()
            .map_err(|e| FieldOpsError::Store(format!("Get payment: {e}")))
    }

    async fn invoice(&self, id: &str) -> Result<Option<Invoice>> {
        self.conn()?
            .query_row(&format!("{INVOICE_SELECT} WHERE id = ?1"), [id], row_to_invoice)
            .optional()
            .map_err(|e| FieldOpsError::Store(format!("Get invoice: {e}")))
    }

    async fn contract(&self, id: &str) -> Result<Option<Contract>> {
        self.conn()?
            .query_row(&format!("{CONTRACT_SELECT} WHERE id = ?1"), [id], row_to_contract)
            .optional()
            .map_err(|e| FieldOpsError::Store(format!("Get contract: {e}")))
    }

    async fn create_client(&self, client: &Client) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO clients (id, name, email, phone, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    client.id,
                    client.name,
                    client.email,
                    client.phone,
                    client.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| FieldOpsError::Store(format!("Save client: {e}")))?;
        Ok(())
    }

    async fn create_job(&self, job: &Job) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO jobs
                 (id, owner_id, client_id, title, status, start_at, revenue, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    job.id,
                    job.owner_id,
                    job.client_id,
                    job.title,
                    job.status.as_str(),
                    job.start_at.map(|t| t.to_rfc3339()),
                    job.revenue,
                    job.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| FieldOpsError::Store(format!("Save job: {e}")))?;
        Ok(())
    }

    async fn update_job_status(&self, id: &str, status: JobStatus) -> Result<()> {
        let changed = self
            .conn()?
            .execute(
                "UPDATE jobs SET status = ?1 WHERE id = ?2",
                params![status.as_str(), id],
            )
            .map_err(|e| FieldOpsError::Store(format!("Update job status: {e}")))?;
        if changed == 0 {
            return Err(FieldOpsError::NotFound(format!("job {id}")));
        }
        Ok(())
    }

    async fn create_lead(&self, lead: &Lead) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO leads (id, owner_id, client_id, name, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    lead.id,
                    lead.owner_id,
                    lead.client_id,
                    lead.name,
                    lead.status.as_str(),
                    lead.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| FieldOpsError::Store(format!("Save lead: {e}")))?;
        Ok(())
    }

    async fn create_payment(&self, payment: &Payment) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO payments
                 (id, owner_id, client_id, invoice_id, amount, status, pending_since, paid_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    payment.id,
                    payment.owner_id,
                    payment.client_id,
                    payment.invoice_id,
                    payment.amount,
                    payment.status.as_str(),
                    payment.pending_since.to_rfc3339(),
                    payment.paid_at.map(|t| t.to_rfc3339()),
                ],
            )
            .map_err(|e| FieldOpsError::Store(format!("Save payment: {e}")))?;
        Ok(())
    }

    async fn mark_payment_paid(&self, id: &str, paid_at: DateTime<Utc>) -> Result<()> {
        let changed = self
            .conn()?
            .execute(
                "UPDATE payments SET status = 'paid', paid_at = ?1 WHERE id = ?2",
                params![paid_at.to_rfc3339(), id],
            )
            .map_err(|e| FieldOpsError::Store(format!("Mark payment paid: {e}")))?;
        if changed == 0 {
            return Err(FieldOpsError::NotFound(format!("payment {id}")));
        }
        Ok(())
    }

    async fn create_resource(&self, resource: &Resource) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO resources (id, owner_id, name, next_maintenance_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    resource.id,
                    resource.owner_id,
                    resource.name,
                    resource.next_maintenance_at.map(|t| t.to_rfc3339()),
                ],
            )
            .map_err(|e| FieldOpsError::Store(format!("Save resource: {e}")))?;
        Ok(())
    }

    async fn create_quote(&self, quote: &Quote) -> Result<()> {
        let line_items = serde_json::to_string(&quote.line_items)
            .map_err(|e| FieldOpsError::Store(format!("Serialize line items: {e}")))?;
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO quotes
                 (id, owner_id, client_id, title, line_items, total, status, job_id, converted_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    quote.id,
                    quote.owner_id,
                    quote.client_id,
                    quote.title,
                    line_items,
                    quote.total,
                    quote.status.as_str(),
                    quote.job_id,
                    quote.converted_at.map(|t| t.to_rfc3339()),
                    quote.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| FieldOpsError::Store(format!("Save quote: {e}")))?;
        Ok(())
    }

    async fn link_quote_to_job(
        &self,
        quote_id: &str,
        job_id: &str,
        converted_at: DateTime<Utc>,
    ) -> Result<()> {
        let changed = self
            .conn()?
            .execute(
                "UPDATE quotes SET job_id = ?1, converted_at = ?2, status = 'accepted' WHERE id = ?3",
                params![job_id, converted_at.to_rfc3339(), quote_id],
            )
            .map_err(|e| FieldOpsError::Store(format!("Link quote: {e}")))?;
        if changed == 0 {
            return Err(FieldOpsError::NotFound(format!("quote {quote_id}")));
        }
        Ok(())
    }

    async fn create_invoice(&self, invoice: &Invoice) -> Result<()> {
        let line_items = serde_json::to_string(&invoice.line_items)
            .map_err(|e| FieldOpsError::Store(format!("Serialize line items: {e}")))?;
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO invoices
                 (id, owner_id, client_id, job_id, number, line_items, total, status, issued_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    invoice.id,
                    invoice.owner_id,
                    invoice.client_id,
                    invoice.job_id,
                    invoice.number,
                    line_items,
                    invoice.total,
                    invoice.status.as_str(),
                    invoice.issued_at.to_rfc3339(),
                ],
            )
            .map_err(|e| FieldOpsError::Store(format!("Save invoice: {e}")))?;
        Ok(())
    }

    async fn create_contract(&self, contract: &Contract) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO contracts (id, owner_id, client_id, job_id, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    contract.id,
                    contract.owner_id,
                    contract.client_id,
                    contract.job_id,
                    contract.status.as_str(),
                    contract.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| FieldOpsError::Store(format!("Save contract: {e}")))?;
        Ok(())
    }

    async fn automation_settings(&self, owner_id: &str) -> Result<Option<AutomationSettings>> {
        self.conn()?
            .query_row(
                &format!("{SETTINGS_SELECT} WHERE owner_id = ?1"),
                [owner_id],
                row_to_settings,
            )
            .optional()
            .map_err(|e| FieldOpsError::Store(format!("Get settings: {e}")))
    }

    async fn upsert_automation_settings(&self, settings: &AutomationSettings) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO automation_settings
                 (owner_id, job_reminders, lead_follow_ups, payment_reminders, maintenance_reminders,
                  notification_email, invoice_prefix, next_invoice_number)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    settings.owner_id,
                    settings.job_reminders as i32,
                    settings.lead_follow_ups as i32,
                    settings.payment_reminders as i32,
                    settings.maintenance_reminders as i32,
                    settings.notification_email,
                    settings.invoice_prefix,
                    settings.next_invoice_number,
                ],
            )
            .map_err(|e| FieldOpsError::Store(format!("Save settings: {e}")))?;
        Ok(())
    }

    async fn automation_owners(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT owner_id FROM automation_settings ORDER BY owner_id")
            .map_err(|e| FieldOpsError::Store(format!("List owners: {e}")))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| FieldOpsError::Store(format!("List owners: {e}")))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    async fn next_invoice_number(&self, owner_id: &str) -> Result<u32> {
        // Single-statement increment-and-fetch: no read-then-write race.
        // RETURNING yields the post-update value; the assigned number is
        // one less.
        let new_value: u32 = self
            .conn()?
            .query_row(
                "UPDATE automation_settings
                 SET next_invoice_number = next_invoice_number + 1
                 WHERE owner_id = ?1
                 RETURNING next_invoice_number",
                [owner_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| FieldOpsError::Store(format!("Invoice counter: {e}")))?
            .ok_or_else(|| {
                FieldOpsError::Store(format!("No automation settings for owner {owner_id}"))
            })?;
        Ok(new_value - 1)
    }

    async fn create_notification(&self, notification: &Notification) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT INTO notifications
                 (id, recipient_id, kind, payload, priority, is_read, reference_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    notification.id,
                    notification.recipient_id,
                    notification.kind.as_str(),
                    notification.payload.to_string(),
                    notification.priority.as_str(),
                    notification.read as i32,
                    notification.reference_id(),
                    notification.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| FieldOpsError::Store(format!("Save notification: {e}")))?;
        Ok(())
    }

    async fn latest_notification(
        &self,
        recipient_id: &str,
        kind: NotificationKind,
        reference_id: &str,
    ) -> Result<Option<Notification>> {
        self.conn()?
            .query_row(
                &format!(
                    "{NOTIFICATION_SELECT}
                     WHERE recipient_id = ?1 AND kind = ?2 AND reference_id = ?3
                     ORDER BY created_at DESC LIMIT 1"
                ),
                params![recipient_id, kind.as_str(), reference_id],
                row_to_notification,
            )
            .optional()
            .map_err(|e| FieldOpsError::Store(format!("Latest notification: {e}")))
    }

    async fn recent_notifications(
        &self,
        recipient_id: &str,
        unread_only: bool,
        limit: usize,
    ) -> Result<Vec<Notification>> {
        let conn = self.conn()?;
        let filter = if unread_only { " AND is_read = 0" } else { "" };
        let mut stmt = conn
            .prepare(&format!(
                "{NOTIFICATION_SELECT} WHERE recipient_id = ?1{filter}
                 ORDER BY created_at DESC LIMIT ?2"
            ))
            .map_err(|e| FieldOpsError::Store(format!("List notifications: {e}")))?;
        let rows = stmt
            .query_map(params![recipient_id, limit as i64], row_to_notification)
            .map_err(|e| FieldOpsError::Store(format!("List notifications: {e}")))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    async fn mark_notification_read(&self, id: &str) -> Result<()> {
        let changed = self
            .conn()?
            .execute("UPDATE notifications SET is_read = 1 WHERE id = ?1", [id])
            .map_err(|e| FieldOpsError::Store(format!("Mark read: {e}")))?;
        if changed == 0 {
            return Err(FieldOpsError::NotFound(format!("notification {id}")));
        }
        Ok(())
    }
}
