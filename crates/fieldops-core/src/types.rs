//! Domain entity snapshots and the notification model.
//!
//! Entities are plain records — the automation core reads them as
//! snapshots and writes them through the store; it does not own their
//! lifecycle beyond what workflows create. Notifications reference domain
//! entities by id only (payload field, no foreign key), so they survive
//! deletion of the entity they point at.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Generate a fresh entity id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ─── Domain entities ──────────────────────────────────────

/// A client of the business.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A scheduled or completed job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub owner_id: String,
    pub client_id: String,
    pub title: String,
    pub status: JobStatus,
    pub start_at: Option<DateTime<Utc>>,
    pub revenue: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Confirmed => "confirmed",
            JobStatus::Completed => "completed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "confirmed" => Some(JobStatus::Confirmed),
            "completed" => Some(JobStatus::Completed),
            "cancelled" => Some(JobStatus::Cancelled),
            _ => None,
        }
    }
}

/// A sales lead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: String,
    pub owner_id: String,
    pub client_id: Option<String>,
    pub name: String,
    pub status: LeadStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    Contacted,
    Won,
    Lost,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Won => "won",
            LeadStatus::Lost => "lost",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(LeadStatus::New),
            "contacted" => Some(LeadStatus::Contacted),
            "won" => Some(LeadStatus::Won),
            "lost" => Some(LeadStatus::Lost),
            _ => None,
        }
    }

    /// Won/Lost leads need no follow-up.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LeadStatus::Won | LeadStatus::Lost)
    }
}

/// A payment owed to the business.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub owner_id: String,
    pub client_id: String,
    pub invoice_id: Option<String>,
    pub amount: f64,
    pub status: PaymentStatus,
    pub pending_since: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "paid" => Some(PaymentStatus::Paid),
            _ => None,
        }
    }
}

/// A maintainable resource (vehicle, equipment).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub next_maintenance_at: Option<DateTime<Utc>>,
}

/// A line on a quote or invoice. Stored as a JSON column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
}

impl LineItem {
    pub fn total(&self) -> f64 {
        self.quantity * self.unit_price
    }
}

/// A quote offered to a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub id: String,
    pub owner_id: String,
    pub client_id: String,
    pub title: String,
    pub line_items: Vec<LineItem>,
    pub total: f64,
    pub status: QuoteStatus,
    /// Set when the quote is converted to a job.
    pub job_id: Option<String>,
    pub converted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Draft,
    Sent,
    Accepted,
    Declined,
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteStatus::Draft => "draft",
            QuoteStatus::Sent => "sent",
            QuoteStatus::Accepted => "accepted",
            QuoteStatus::Declined => "declined",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(QuoteStatus::Draft),
            "sent" => Some(QuoteStatus::Sent),
            "accepted" => Some(QuoteStatus::Accepted),
            "declined" => Some(QuoteStatus::Declined),
            _ => None,
        }
    }
}

/// An issued invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub owner_id: String,
    pub client_id: String,
    pub job_id: Option<String>,
    pub number: String,
    pub line_items: Vec<LineItem>,
    pub total: f64,
    pub status: InvoiceStatus,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(InvoiceStatus::Draft),
            "sent" => Some(InvoiceStatus::Sent),
            "paid" => Some(InvoiceStatus::Paid),
            _ => None,
        }
    }
}

/// A service contract tied to a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    pub id: String,
    pub owner_id: String,
    pub client_id: String,
    pub job_id: String,
    pub status: ContractStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    Draft,
    Sent,
    Signed,
}

impl ContractStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractStatus::Draft => "draft",
            ContractStatus::Sent => "sent",
            ContractStatus::Signed => "signed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(ContractStatus::Draft),
            "sent" => Some(ContractStatus::Sent),
            "signed" => Some(ContractStatus::Signed),
            _ => None,
        }
    }
}

// ─── Automation settings ──────────────────────────────────

/// Per-owner automation settings: one enable flag per rule, the delivery
/// address, and the invoice numbering state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationSettings {
    pub owner_id: String,
    #[serde(default = "bool_true")]
    pub job_reminders: bool,
    #[serde(default = "bool_true")]
    pub lead_follow_ups: bool,
    #[serde(default = "bool_true")]
    pub payment_reminders: bool,
    #[serde(default = "bool_true")]
    pub maintenance_reminders: bool,
    #[serde(default)]
    pub notification_email: Option<String>,
    #[serde(default = "default_invoice_prefix")]
    pub invoice_prefix: String,
    #[serde(default = "default_next_invoice_number")]
    pub next_invoice_number: u32,
}

fn bool_true() -> bool {
    true
}
fn default_invoice_prefix() -> String {
    "INV-".into()
}
fn default_next_invoice_number() -> u32 {
    1
}

impl AutomationSettings {
    /// Default settings for an owner with no stored row.
    pub fn for_owner(owner_id: &str) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            job_reminders: true,
            lead_follow_ups: true,
            payment_reminders: true,
            maintenance_reminders: true,
            notification_email: None,
            invoice_prefix: default_invoice_prefix(),
            next_invoice_number: default_next_invoice_number(),
        }
    }
}

// ─── Notifications ────────────────────────────────────────

/// Notification kind — closed set, each with a fixed entity-reference key
/// and a fixed dedup cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    JobReminder,
    LeadFollowUp,
    PaymentOverdue,
    MaintenanceReminder,
    ContractSigned,
    JobCompleted,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::JobReminder => "job_reminder",
            NotificationKind::LeadFollowUp => "lead_follow_up",
            NotificationKind::PaymentOverdue => "payment_overdue",
            NotificationKind::MaintenanceReminder => "maintenance_reminder",
            NotificationKind::ContractSigned => "contract_signed",
            NotificationKind::JobCompleted => "job_completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "job_reminder" => Some(NotificationKind::JobReminder),
            "lead_follow_up" => Some(NotificationKind::LeadFollowUp),
            "payment_overdue" => Some(NotificationKind::PaymentOverdue),
            "maintenance_reminder" => Some(NotificationKind::MaintenanceReminder),
            "contract_signed" => Some(NotificationKind::ContractSigned),
            "job_completed" => Some(NotificationKind::JobCompleted),
            _ => None,
        }
    }

    /// Payload key of the entity reference — the dedup key component.
    pub fn reference_key(&self) -> &'static str {
        match self {
            NotificationKind::JobReminder | NotificationKind::JobCompleted => "job_id",
            NotificationKind::LeadFollowUp => "lead_id",
            NotificationKind::PaymentOverdue => "payment_id",
            NotificationKind::MaintenanceReminder => "resource_id",
            NotificationKind::ContractSigned => "contract_id",
        }
    }

    /// Minimum time between two notifications of this kind for the same
    /// (recipient, reference id).
    pub fn cooldown(&self) -> Duration {
        match self {
            NotificationKind::JobReminder => Duration::hours(24),
            NotificationKind::LeadFollowUp => Duration::hours(72),
            NotificationKind::PaymentOverdue => Duration::hours(168),
            NotificationKind::MaintenanceReminder => Duration::hours(168),
            NotificationKind::ContractSigned => Duration::hours(24),
            NotificationKind::JobCompleted => Duration::hours(24),
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            "urgent" => Some(Priority::Urgent),
            _ => None,
        }
    }
}

/// A persisted notification. Created by the scheduler or a workflow; only
/// the read flag is ever mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub recipient_id: String,
    pub kind: NotificationKind,
    /// Carries `title`, `message`, and exactly one entity-reference field
    /// keyed by `kind.reference_key()`.
    pub payload: serde_json::Value,
    pub priority: Priority,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Sole constructor — builds the payload so the reference-key invariant
    /// holds for every notification in the system.
    pub fn new(
        recipient_id: &str,
        kind: NotificationKind,
        title: &str,
        message: &str,
        reference_id: &str,
        priority: Priority,
        created_at: DateTime<Utc>,
    ) -> Self {
        let mut payload = serde_json::Map::new();
        payload.insert("title".into(), title.into());
        payload.insert("message".into(), message.into());
        payload.insert(kind.reference_key().to_string(), reference_id.into());
        Self {
            id: new_id(),
            recipient_id: recipient_id.to_string(),
            kind,
            payload: serde_json::Value::Object(payload),
            priority,
            read: false,
            created_at,
        }
    }

    pub fn title(&self) -> &str {
        self.payload["title"].as_str().unwrap_or("")
    }

    pub fn message(&self) -> &str {
        self.payload["message"].as_str().unwrap_or("")
    }

    /// The referenced entity id, read back out of the payload.
    pub fn reference_id(&self) -> &str {
        self.payload[self.kind.reference_key()]
            .as_str()
            .unwrap_or("")
    }
}
