//! The single notification write path: dedup gate → store → fan-out.
//!
//! Both the scheduler and the workflow engine publish through here, so
//! repeated or concurrent executions of either cooperate under the same
//! cooldown semantics.

use chrono::{DateTime, Utc};
use fieldops_core::Result;
use fieldops_core::types::Notification;
use fieldops_db::OpsStore;
use std::sync::Arc;

use crate::dedup::DedupGate;
use crate::delivery::DeliveryAdapter;
use crate::rules::Candidate;

pub struct Notifier {
    store: Arc<dyn OpsStore>,
    gate: DedupGate,
    adapters: Vec<Arc<dyn DeliveryAdapter>>,
}

impl Notifier {
    pub fn new(store: Arc<dyn OpsStore>) -> Self {
        Self {
            gate: DedupGate::new(store.clone()),
            store,
            adapters: Vec::new(),
        }
    }

    /// Register a delivery channel for fan-out after persist.
    pub fn add_adapter(&mut self, adapter: Arc<dyn DeliveryAdapter>) {
        self.adapters.push(adapter);
    }

    /// Publish a candidate for a recipient. Returns true when a
    /// notification was created, false when the gate suppressed it.
    /// Delivery fan-out is best-effort: failures are logged and swallowed.
    pub async fn publish(
        &self,
        recipient_id: &str,
        candidate: &Candidate,
        now: DateTime<Utc>,
        deliver_to: Option<&str>,
    ) -> Result<bool> {
        if !self
            .gate
            .should_create(recipient_id, candidate.kind, &candidate.reference_id, now)
            .await?
        {
            tracing::debug!(
                "🔕 Suppressed {} for {} (cooldown)",
                candidate.kind,
                candidate.reference_id
            );
            return Ok(false);
        }

        let notification = Notification::new(
            recipient_id,
            candidate.kind,
            &candidate.title,
            &candidate.message,
            &candidate.reference_id,
            candidate.priority,
            now,
        );
        self.store.create_notification(&notification).await?;
        tracing::info!(
            "🔔 Notification created: {} [{}] → {}",
            candidate.kind,
            candidate.priority.as_str(),
            candidate.reference_id
        );

        if let Some(email) = deliver_to {
            for adapter in &self.adapters {
                if let Err(e) = adapter.deliver(email, &notification).await {
                    tracing::warn!("⚠️ Delivery via {} failed: {e}", adapter.name());
                }
            }
        }

        Ok(true)
    }
}
