//! Delivery adapters — fan persisted notifications out to secondary
//! channels. Best-effort only: the notification store is the system of
//! record, and a delivery failure must never fail the scheduler run or
//! workflow execution that triggered it.

use async_trait::async_trait;
use fieldops_core::Result;
use fieldops_core::config::{EmailConfig, WebhookConfig};
use fieldops_core::error::FieldOpsError;
use fieldops_core::types::{Notification, Priority};

/// A secondary notification channel.
#[async_trait]
pub trait DeliveryAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    async fn deliver(&self, recipient_email: &str, notification: &Notification) -> Result<()>;
}

/// SMTP email delivery.
pub struct EmailDelivery {
    config: EmailConfig,
}

impl EmailDelivery {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DeliveryAdapter for EmailDelivery {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn deliver(&self, recipient_email: &str, notification: &Notification) -> Result<()> {
        use lettre::{
            AsyncSmtpTransport, AsyncTransport, Message as LettreMessage, message::Mailbox,
            message::header::ContentType, transport::smtp::authentication::Credentials,
        };

        let from_name = self.config.display_name.as_deref().unwrap_or("FieldOps");
        let from_mailbox: Mailbox = format!("{from_name} <{}>", self.config.from_email)
            .parse()
            .map_err(|e| FieldOpsError::Delivery(format!("Invalid from: {e}")))?;
        let to_mailbox: Mailbox = recipient_email
            .parse()
            .map_err(|e| FieldOpsError::Delivery(format!("Invalid to: {e}")))?;

        let subject = format!(
            "{} {}",
            priority_marker(notification.priority),
            notification.title()
        );
        let body = format!(
            "{}\n\n{}: {}\nCreated: {}",
            notification.message(),
            notification.kind.reference_key(),
            notification.reference_id(),
            notification.created_at.format("%Y-%m-%d %H:%M UTC"),
        );

        let email = LettreMessage::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| FieldOpsError::Delivery(format!("Build email: {e}")))?;

        let creds = Credentials::new(
            self.config.from_email.clone(),
            self.config.password.clone(),
        );
        let mailer =
            AsyncSmtpTransport::<lettre::Tokio1Executor>::starttls_relay(&self.config.smtp_host)
                .map_err(|e| FieldOpsError::Delivery(format!("SMTP relay: {e}")))?
                .port(self.config.smtp_port)
                .credentials(creds)
                .build();

        mailer
            .send(email)
            .await
            .map_err(|e| FieldOpsError::Delivery(format!("SMTP send: {e}")))?;

        tracing::info!("📤 Notification emailed to {recipient_email}");
        Ok(())
    }
}

/// Generic HTTP webhook delivery — POST with JSON body.
pub struct WebhookDelivery {
    config: WebhookConfig,
    client: reqwest::Client,
}

impl WebhookDelivery {
    pub fn new(config: WebhookConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl DeliveryAdapter for WebhookDelivery {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn deliver(&self, recipient_email: &str, notification: &Notification) -> Result<()> {
        let mut req = self
            .client
            .post(&self.config.url)
            .json(&serde_json::json!({
                "recipient": recipient_email,
                "type": notification.kind.as_str(),
                "priority": notification.priority.as_str(),
                "payload": notification.payload,
                "created_at": notification.created_at.to_rfc3339(),
            }))
            .timeout(std::time::Duration::from_secs(10));

        for (key, value) in &self.config.headers {
            req = req.header(key.as_str(), value.as_str());
        }

        let resp = req
            .send()
            .await
            .map_err(|e| FieldOpsError::Delivery(format!("Webhook send: {e}")))?;

        if resp.status().is_success() {
            tracing::info!("📤 Webhook delivered: {}", notification.kind);
            Ok(())
        } else {
            let status = resp.status();
            Err(FieldOpsError::Delivery(format!("Webhook error {status}")))
        }
    }
}

/// Urgency marker used by channels that render a plain-text priority.
pub fn priority_marker(priority: Priority) -> &'static str {
    match priority {
        Priority::Urgent => "🚨",
        Priority::High => "⚠️",
        Priority::Medium => "📢",
        Priority::Low => "ℹ️",
    }
}
