//! # FieldOps Automation
//!
//! Rule-based notification scheduling. A periodic sweep loads each
//! recipient's entity snapshots, runs the enabled rules, and persists the
//! surviving candidates as notifications — deduplicated per (kind,
//! reference id) by a cooldown window, then fanned out to delivery
//! channels on a best-effort basis.
//!
//! ## Architecture
//! ```text
//! Scheduler (tokio interval + on-demand)
//!   ├── per enabled rule: load entity snapshots
//!   ├── RuleEvaluator: snapshot + now → candidate (pure)
//!   └── Notifier
//!         ├── DedupGate: latest (kind, reference) within cooldown? → drop
//!         ├── OpsStore: persist notification
//!         └── DeliveryAdapter fan-out (email, webhook) — failures logged only
//! ```
//!
//! Overlapping runs are tolerated by design: the dedup gate's
//! query-before-write check is the only suppression mechanism, and the
//! per-rule cooldowns (24 h to 7 d) bound duplicate volume under race.

pub mod dedup;
pub mod delivery;
pub mod notifier;
pub mod rules;
pub mod scheduler;

pub use dedup::DedupGate;
pub use delivery::{DeliveryAdapter, EmailDelivery, WebhookDelivery};
pub use notifier::Notifier;
pub use rules::{Candidate, RuleKind, SCHEDULED_RULES};
pub use scheduler::{AutomationScheduler, RunSummary, spawn_scheduler};
