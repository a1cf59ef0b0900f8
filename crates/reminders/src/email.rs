//! Reminder email drafts: generated on demand, or pinned by a user edit.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use dunning_core::DomainError;

use crate::invoice::Invoice;
use crate::schedule::Checkpoint;

/// Requested voice for a generated reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Friendly,
    Professional,
    Firm,
}

impl Tone {
    /// Tone used until the user asks for another one.
    pub fn default_for(checkpoint: Checkpoint) -> Self {
        match checkpoint {
            Checkpoint::Upcoming | Checkpoint::Day1 => Tone::Friendly,
            Checkpoint::Day7 => Tone::Professional,
            Checkpoint::Day14 => Tone::Firm,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tone::Friendly => "friendly",
            Tone::Professional => "professional",
            Tone::Firm => "firm",
        }
    }
}

impl FromStr for Tone {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "friendly" => Ok(Tone::Friendly),
            "professional" => Ok(Tone::Professional),
            "firm" => Ok(Tone::Firm),
            other => Err(DomainError::validation(vec![format!("Unknown tone: {other}")])),
        }
    }
}

/// Subject and body of one reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailContent {
    pub subject: String,
    pub body: String,
}

/// Per-checkpoint draft state.
///
/// `Generated` content is rendered fresh on every preview; `UserEdited` content
/// is returned verbatim until the same checkpoint is regenerated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EmailDraft {
    Generated {
        tone: Tone,
    },
    UserEdited {
        subject: String,
        body: String,
        edited_at: DateTime<Utc>,
    },
}

impl EmailDraft {
    pub fn generated_for(checkpoint: Checkpoint) -> Self {
        EmailDraft::Generated {
            tone: Tone::default_for(checkpoint),
        }
    }

    pub fn is_user_edited(&self) -> bool {
        matches!(self, EmailDraft::UserEdited { .. })
    }
}

/// What the preview endpoint shows for a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailPreview {
    pub checkpoint: Checkpoint,
    pub subject: String,
    pub body: String,
    pub user_edited: bool,
    pub tone: Option<Tone>,
}

/// Renders reminder content. The production generator is an external
/// collaborator; [`TemplateComposer`] is the built-in fallback.
pub trait EmailComposer: Send + Sync {
    fn compose(&self, invoice: &Invoice, checkpoint: Checkpoint, tone: Tone) -> EmailContent;
}

/// Build the preview for `checkpoint` from the invoice's current draft.
pub fn preview_email(
    invoice: &Invoice,
    checkpoint: Checkpoint,
    composer: &dyn EmailComposer,
) -> EmailPreview {
    match invoice.draft(checkpoint) {
        EmailDraft::UserEdited { subject, body, .. } => EmailPreview {
            checkpoint,
            subject,
            body,
            user_edited: true,
            tone: None,
        },
        EmailDraft::Generated { tone } => {
            let content = composer.compose(invoice, checkpoint, tone);
            EmailPreview {
                checkpoint,
                subject: content.subject,
                body: content.body,
                user_edited: false,
                tone: Some(tone),
            }
        }
    }
}

/// Plain-text templates keyed by checkpoint and tone.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateComposer;

impl TemplateComposer {
    pub fn new() -> Self {
        Self
    }

    fn subject(checkpoint: Checkpoint, tone: Tone, number: &str, due: &str) -> String {
        match (checkpoint, tone) {
            (Checkpoint::Upcoming, Tone::Friendly) => {
                format!("Friendly reminder: Invoice #{number} is due on {due}")
            }
            (Checkpoint::Upcoming, _) => format!("Invoice #{number} due on {due}"),
            (Checkpoint::Day1, Tone::Firm) => format!("Action required: Invoice #{number} is overdue"),
            (Checkpoint::Day1, _) => format!("Invoice #{number} is now past due"),
            (Checkpoint::Day7, Tone::Friendly) => format!("Checking in on Invoice #{number}"),
            (Checkpoint::Day7, _) => format!("Invoice #{number} is 7 days overdue"),
            (Checkpoint::Day14, Tone::Friendly) => format!("Still open: Invoice #{number}"),
            (Checkpoint::Day14, _) => format!("Final notice: Invoice #{number} is 14 days overdue"),
        }
    }

    fn situation(checkpoint: Checkpoint, number: &str, amount: &str, due: &str) -> String {
        match checkpoint {
            Checkpoint::Upcoming => {
                format!("Invoice #{number} for {amount} is due on {due}.")
            }
            Checkpoint::Day1 => {
                format!("Invoice #{number} for {amount} was due on {due} and is now past due.")
            }
            Checkpoint::Day7 | Checkpoint::Day14 => format!(
                "Invoice #{number} for {amount} was due on {due} and is now {} days overdue.",
                checkpoint.offset_days()
            ),
        }
    }
}

impl EmailComposer for TemplateComposer {
    fn compose(&self, invoice: &Invoice, checkpoint: Checkpoint, tone: Tone) -> EmailContent {
        let number = invoice.invoice_number();
        let due = invoice.due_date().format("%b %-d, %Y").to_string();
        let amount = invoice.currency().format(invoice.total_due());

        let greeting = match tone {
            Tone::Friendly => format!("Hi {},", invoice.client_name()),
            Tone::Professional | Tone::Firm => format!("Dear {},", invoice.client_name()),
        };
        let ask = match tone {
            Tone::Friendly => "If it's already on its way, thank you! Otherwise we'd appreciate payment when you get a chance.",
            Tone::Professional => "Please arrange payment at your earliest convenience, or let us know if anything is holding it up.",
            Tone::Firm => "Please settle the outstanding balance immediately. Continued non-payment may result in further action.",
        };
        let closing = match tone {
            Tone::Friendly => "Thanks so much,",
            Tone::Professional => "Kind regards,",
            Tone::Firm => "Regards,",
        };

        let body = format!(
            "{greeting}\n\n{}\n\n{ask}\n\n{closing}",
            Self::situation(checkpoint, number, &amount, &due)
        );

        EmailContent {
            subject: Self::subject(checkpoint, tone, number, &due),
            body,
        }
    }
}
