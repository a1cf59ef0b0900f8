//! Outbound email port (delivery itself is an external collaborator).

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::info;

use dunning_core::{ExternalFailure, InvoiceId, OwnerId};
use dunning_reminders::Checkpoint;

/// Why an email is being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "checkpoint", rename_all = "snake_case")]
pub enum EmailKind {
    Reminder(Checkpoint),
    ThankYou,
}

/// A fully rendered email handed to the delivery collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundEmail {
    pub invoice_id: InvoiceId,
    pub owner_id: OwnerId,
    pub kind: EmailKind,
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Delivery port. Failures are reported, never retried here.
pub trait Notifier: Send + Sync {
    fn send(&self, email: &OutboundEmail) -> Result<(), ExternalFailure>;
}

impl<N> Notifier for Arc<N>
where
    N: Notifier + ?Sized,
{
    fn send(&self, email: &OutboundEmail) -> Result<(), ExternalFailure> {
        (**self).send(email)
    }
}

/// Writes every email to the log instead of delivering it (dev server default).
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, email: &OutboundEmail) -> Result<(), ExternalFailure> {
        info!(
            invoice_id = %email.invoice_id,
            kind = ?email.kind,
            to = %email.to,
            subject = %email.subject,
            "email handed off"
        );
        Ok(())
    }
}

/// Records sent emails; can be switched to fail every send.
#[derive(Debug, Default)]
pub struct InMemoryNotifier {
    sent: Mutex<Vec<OutboundEmail>>,
    failure: Mutex<Option<String>>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send fail with `message` (`None` to recover).
    pub fn set_failure(&self, message: Option<&str>) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = message.map(str::to_string);
        }
    }

    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Notifier for InMemoryNotifier {
    fn send(&self, email: &OutboundEmail) -> Result<(), ExternalFailure> {
        let failure = self
            .failure
            .lock()
            .map_err(|_| ExternalFailure::new("email delivery", "lock poisoned"))?
            .clone();
        if let Some(message) = failure {
            return Err(ExternalFailure::new("email delivery", message));
        }
        self.sent
            .lock()
            .map_err(|_| ExternalFailure::new("email delivery", "lock poisoned"))?
            .push(email.clone());
        Ok(())
    }
}
