//! Rule evaluation — pure eligibility checks over entity snapshots.
//!
//! Each rule derives one quantity from the snapshot (hours until start,
//! days since creation, days pending, days until maintenance) and compares
//! it against a fixed band. Half-open bands: once an entity leaves the
//! band, re-firing inside the cooldown is the dedup gate's problem, not
//! the evaluator's. No side effects here.

use chrono::{DateTime, Duration, Utc};
use fieldops_core::types::{
    AutomationSettings, Job, JobStatus, Lead, NotificationKind, Payment, PaymentStatus, Priority,
    Resource,
};

/// A notification the scheduler wants to create, before deduplication.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub kind: NotificationKind,
    pub priority: Priority,
    pub title: String,
    pub message: String,
    pub reference_id: String,
}

/// The schedulable rules, in evaluation order.
pub const SCHEDULED_RULES: [RuleKind; 4] = [
    RuleKind::JobReminders,
    RuleKind::LeadFollowUps,
    RuleKind::PaymentOverdue,
    RuleKind::MaintenanceReminders,
];

/// Static rule catalog entry: kind, settings flag, entity collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    JobReminders,
    LeadFollowUps,
    PaymentOverdue,
    MaintenanceReminders,
}

impl RuleKind {
    pub fn kind(&self) -> NotificationKind {
        match self {
            RuleKind::JobReminders => NotificationKind::JobReminder,
            RuleKind::LeadFollowUps => NotificationKind::LeadFollowUp,
            RuleKind::PaymentOverdue => NotificationKind::PaymentOverdue,
            RuleKind::MaintenanceReminders => NotificationKind::MaintenanceReminder,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Per-recipient enable flag. A disabled rule is skipped outright —
    /// not evaluated, not counted.
    pub fn enabled(&self, settings: &AutomationSettings) -> bool {
        match self {
            RuleKind::JobReminders => settings.job_reminders,
            RuleKind::LeadFollowUps => settings.lead_follow_ups,
            RuleKind::PaymentOverdue => settings.payment_reminders,
            RuleKind::MaintenanceReminders => settings.maintenance_reminders,
        }
    }
}

/// Fires inside the half-open band 0 < hours_until_start <= 24.
/// Always High priority. Started, completed, or cancelled jobs never fire.
pub fn evaluate_job_reminder(job: &Job, now: DateTime<Utc>) -> Option<Candidate> {
    if matches!(job.status, JobStatus::Completed | JobStatus::Cancelled) {
        return None;
    }
    let start = job.start_at?;
    let until = start - now;
    if until <= Duration::zero() || until > Duration::hours(24) {
        return None;
    }
    let hours = (until.num_minutes() as f64 / 60.0).ceil() as i64;
    Some(Candidate {
        kind: NotificationKind::JobReminder,
        priority: Priority::High,
        title: "Upcoming job".into(),
        message: format!("{} starts in about {hours}h", job.title),
        reference_id: job.id.clone(),
    })
}

/// Fires once a non-terminal lead has sat for 3+ days.
/// Medium priority, High from day 7.
pub fn evaluate_lead_follow_up(lead: &Lead, now: DateTime<Utc>) -> Option<Candidate> {
    if lead.status.is_terminal() {
        return None;
    }
    let days = (now - lead.created_at).num_days();
    if days < 3 {
        return None;
    }
    let priority = if days >= 7 {
        Priority::High
    } else {
        Priority::Medium
    };
    Some(Candidate {
        kind: NotificationKind::LeadFollowUp,
        priority,
        title: "Lead needs follow-up".into(),
        message: format!("{} has had no update for {days} days", lead.name),
        reference_id: lead.id.clone(),
    })
}

/// Fires once a payment has been pending for 7+ days.
/// High priority, Urgent from day 14.
pub fn evaluate_payment_overdue(payment: &Payment, now: DateTime<Utc>) -> Option<Candidate> {
    if payment.status != PaymentStatus::Pending {
        return None;
    }
    let days = (now - payment.pending_since).num_days();
    if days < 7 {
        return None;
    }
    let priority = if days >= 14 {
        Priority::Urgent
    } else {
        Priority::High
    };
    Some(Candidate {
        kind: NotificationKind::PaymentOverdue,
        priority,
        title: "Payment overdue".into(),
        message: format!("Payment of ${:.2} pending for {days} days", payment.amount),
        reference_id: payment.id.clone(),
    })
}

/// Fires when maintenance is due within the next 7 days (inclusive on both
/// ends; already-overdue maintenance does not fire).
pub fn evaluate_maintenance_reminder(resource: &Resource, now: DateTime<Utc>) -> Option<Candidate> {
    let due = resource.next_maintenance_at?;
    let until = due - now;
    if until < Duration::zero() || until > Duration::days(7) {
        return None;
    }
    let days = until.num_days();
    Some(Candidate {
        kind: NotificationKind::MaintenanceReminder,
        priority: Priority::Medium,
        title: "Maintenance due".into(),
        message: format!("{} is due for maintenance in {days} days", resource.name),
        reference_id: resource.id.clone(),
    })
}
