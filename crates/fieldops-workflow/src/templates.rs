//! Workflow templates — the fixed catalog of multi-step transitions, and
//! the execution report handed back to callers.

use serde::{Deserialize, Serialize};

/// The workflow catalog. Statically defined; each template is a linear
/// sequence of steps against one source entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowTemplate {
    QuoteToJob,
    JobToInvoice,
    PaymentToReceipt,
    LeadToQuote,
    JobCompleteFlow,
}

impl WorkflowTemplate {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowTemplate::QuoteToJob => "quote_to_job",
            WorkflowTemplate::JobToInvoice => "job_to_invoice",
            WorkflowTemplate::PaymentToReceipt => "payment_to_receipt",
            WorkflowTemplate::LeadToQuote => "lead_to_quote",
            WorkflowTemplate::JobCompleteFlow => "job_complete_flow",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "quote_to_job" => Some(WorkflowTemplate::QuoteToJob),
            "job_to_invoice" => Some(WorkflowTemplate::JobToInvoice),
            "payment_to_receipt" => Some(WorkflowTemplate::PaymentToReceipt),
            "lead_to_quote" => Some(WorkflowTemplate::LeadToQuote),
            "job_complete_flow" => Some(WorkflowTemplate::JobCompleteFlow),
            _ => None,
        }
    }

    /// Ordered step labels; drives progress reporting.
    pub fn steps(&self) -> &'static [&'static str] {
        match self {
            WorkflowTemplate::QuoteToJob => &["create_job", "link_quote", "create_contract"],
            WorkflowTemplate::JobToInvoice => {
                &["load_numbering", "allocate_number", "create_invoice"]
            }
            WorkflowTemplate::PaymentToReceipt => &["mark_paid"],
            WorkflowTemplate::LeadToQuote => &["create_quote"],
            WorkflowTemplate::JobCompleteFlow => {
                &["invoice_job", "complete_job", "notify_completion"]
            }
        }
    }
}

impl std::fmt::Display for WorkflowTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of entity a workflow step created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Job,
    Quote,
    Invoice,
    Contract,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Job => "job",
            EntityKind::Quote => "quote",
            EntityKind::Invoice => "invoice",
            EntityKind::Contract => "contract",
        }
    }
}

/// One entity a workflow step successfully created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedEntity {
    pub kind: EntityKind,
    pub id: String,
}

/// The report of one workflow execution. `created` lists every entity a
/// step created, in step order, even when a later step failed — the
/// caller decides whether to keep or discard a partial result. Executed
/// steps are never retried or rolled back.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowExecution {
    pub template: WorkflowTemplate,
    pub source_id: String,
    pub created: Vec<CreatedEntity>,
    pub success: bool,
    pub error: Option<String>,
}

impl WorkflowExecution {
    pub(crate) fn succeeded(
        template: WorkflowTemplate,
        source_id: &str,
        created: Vec<CreatedEntity>,
    ) -> Self {
        Self {
            template,
            source_id: source_id.to_string(),
            created,
            success: true,
            error: None,
        }
    }

    pub(crate) fn failed(
        template: WorkflowTemplate,
        source_id: &str,
        created: Vec<CreatedEntity>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            template,
            source_id: source_id.to_string(),
            created,
            success: false,
            error: Some(error.into()),
        }
    }
}
