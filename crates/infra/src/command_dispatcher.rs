//! Command execution pipeline for invoices.
//!
//! ```text
//! Command
//!   ↓
//! 1. Load the invoice snapshot (owner-scoped)
//!   ↓
//! 2. Handle + apply (pure; guards decide, state is never touched on error)
//!   ↓
//! 3. Persist snapshot + history with an exact-version check
//!   ↓
//! 4. Side effects (thank-you email) after the commit
//! ```
//!
//! The fire-time [`ReminderDispatcher::sweep`] follows the same pipeline but
//! hands the rendered reminder to the [`Notifier`] between deciding and
//! persisting, so a send is only recorded once delivery accepted it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use dunning_core::{
    Aggregate, AggregateRoot, DomainError, ExpectedVersion, ExternalFailure, InvoiceId, OwnerId,
};
use dunning_events::{Event, EventEnvelope};
use dunning_reminders::{
    Checkpoint, CreateInvoice, CurrencyCode, EmailComposer, EmailPreview, FireCheckpoint,
    ImportOptions, ImportReport, Invoice, InvoiceCommand, InvoiceDetails, InvoiceEvent, RawRow,
    RegenerateEmail, ResumeReminders, SendWindow, TemplateComposer, Tone, UpdateDetails,
    accept_row, batch_first_send, import_batch, preview_email,
};

use crate::notifier::{EmailKind, Notifier, OutboundEmail};
use crate::store::{InvoiceStore, StoreError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Deterministic business failure (validation, guard, not found, conflict).
    #[error(transparent)]
    Domain(#[from] DomainError),
    /// A delegated collaborator failed; surfaced as-is, never retried.
    #[error(transparent)]
    External(#[from] ExternalFailure),
}

impl From<StoreError> for DispatchError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(msg) => DispatchError::Domain(DomainError::conflict(msg)),
            StoreError::Unavailable(msg) => {
                DispatchError::External(ExternalFailure::new("invoice store", msg))
            }
        }
    }
}

impl DispatchError {
    pub fn is_guard_violation(&self) -> bool {
        matches!(self, DispatchError::Domain(e) if e.is_guard_violation())
    }
}

/// A reminder that went out during a sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SentReminder {
    pub invoice_id: InvoiceId,
    pub checkpoint: Checkpoint,
    pub sent_at: DateTime<Utc>,
    pub to: String,
}

/// A due reminder that was not sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedSend {
    pub invoice_id: InvoiceId,
    pub checkpoint: Checkpoint,
    pub reason: String,
}

/// Outcome of one fire-time pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub sent: Vec<SentReminder>,
    /// Invoices whose timed pause had elapsed and were resumed.
    pub resumed: Vec<InvoiceId>,
    /// Sends cancelled because the invoice changed since it was planned.
    pub cancelled: Vec<SkippedSend>,
    /// Sends the delivery collaborator rejected; left for a later sweep.
    pub failed: Vec<SkippedSend>,
    /// Invoices whose next send could not be planned; skipped this pass.
    pub unplanned: Vec<InvoiceId>,
}

/// Orchestrates invoice commands against the storage and delivery ports.
pub struct ReminderDispatcher<S, N> {
    store: S,
    notifier: N,
    composer: Arc<dyn EmailComposer>,
    window: SendWindow,
}

impl<S, N> ReminderDispatcher<S, N> {
    pub fn new(store: S, notifier: N, window: SendWindow) -> Self {
        Self {
            store,
            notifier,
            composer: Arc::new(TemplateComposer::new()),
            window,
        }
    }

    pub fn with_composer(mut self, composer: Arc<dyn EmailComposer>) -> Self {
        self.composer = composer;
        self
    }

    pub fn window(&self) -> &SendWindow {
        &self.window
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }
}

impl<S, N> ReminderDispatcher<S, N>
where
    S: InvoiceStore,
    N: Notifier,
{
    /// Import a batch and persist every accepted invoice.
    ///
    /// Numbers already stored for the owner are reported per invoice and never
    /// abort the batch. `first_send` covers the invoices actually stored.
    pub fn import(
        &self,
        owner_id: OwnerId,
        rows: &[RawRow],
        currency: &CurrencyCode,
        now: DateTime<Utc>,
    ) -> Result<ImportReport, DispatchError> {
        let options = ImportOptions::new(owner_id, now).with_currency(currency.clone());
        let batch = import_batch(rows, &options, &self.window);

        let mut report = ImportReport {
            errors: batch.errors,
            ..ImportReport::default()
        };
        for (candidate, n) in batch.accepted.into_iter().zip(batch.accepted_rows) {
            if self
                .store
                .find_by_number(owner_id, candidate.invoice_number())?
                .is_some()
            {
                report
                    .errors
                    .push(format!("Row {n}: invoice number already exists"));
                continue;
            }
            match self.persist_new(owner_id, candidate.id_typed(), candidate.details().clone(), now) {
                Ok(invoice) => {
                    report.accepted.push(invoice);
                    report.accepted_rows.push(n);
                }
                Err(DispatchError::Domain(e)) => report.errors.push(format!("Row {n}: {e}")),
                Err(e) => return Err(e),
            }
        }

        for error in &report.errors {
            debug!(owner_id = %owner_id, error = %error, "import row rejected");
        }
        report.first_send =
            batch_first_send(report.accepted.iter().map(Invoice::due_date), now, &self.window);
        info!(
            owner_id = %owner_id,
            accepted = report.accepted.len(),
            rejected = report.errors.len(),
            "invoice batch imported"
        );
        Ok(report)
    }

    /// Validate and store a single invoice.
    pub fn create(
        &self,
        owner_id: OwnerId,
        row: &RawRow,
        currency: &CurrencyCode,
        late_fee: Option<Decimal>,
        now: DateTime<Utc>,
    ) -> Result<Invoice, DispatchError> {
        let mut details = accept_row(row, 0, currency).map_err(DomainError::validation)?;
        details.late_fee = late_fee;
        if self
            .store
            .find_by_number(owner_id, &details.invoice_number)?
            .is_some()
        {
            return Err(DomainError::conflict(format!(
                "invoice number {} already exists",
                details.invoice_number
            ))
            .into());
        }
        self.persist_new(owner_id, InvoiceId::new(), details, now)
    }

    /// A live (non-deleted) invoice of `owner_id`.
    pub fn get(&self, owner_id: OwnerId, invoice_id: InvoiceId) -> Result<Invoice, DispatchError> {
        match self.store.load(owner_id, invoice_id)? {
            Some(invoice) if !invoice.is_deleted() => Ok(invoice),
            _ => Err(DomainError::not_found().into()),
        }
    }

    /// Live invoices of `owner_id`, oldest first.
    pub fn list(&self, owner_id: OwnerId) -> Result<Vec<Invoice>, DispatchError> {
        let mut invoices = self.store.list(owner_id)?;
        invoices.retain(|i| !i.is_deleted());
        Ok(invoices)
    }

    pub fn history(
        &self,
        owner_id: OwnerId,
        invoice_id: InvoiceId,
    ) -> Result<Vec<EventEnvelope<InvoiceEvent>>, DispatchError> {
        self.get(owner_id, invoice_id)?;
        Ok(self.store.history(owner_id, invoice_id)?)
    }

    /// Run one lifecycle command: load, decide, persist, then side effects.
    ///
    /// A guard violation is returned to the caller and nothing is written.
    pub fn execute(
        &self,
        owner_id: OwnerId,
        invoice_id: InvoiceId,
        command: InvoiceCommand,
    ) -> Result<Invoice, DispatchError> {
        let current = self
            .store
            .load(owner_id, invoice_id)?
            .ok_or(DomainError::NotFound)?;

        let (next, events) = current.execute(&command).inspect_err(|e| {
            if e.is_guard_violation() {
                warn!(invoice_id = %invoice_id, command = command.name(), error = %e, "command rejected");
            }
        })?;
        self.commit(owner_id, &current, &next, events.clone())?;

        for event in &events {
            if let InvoiceEvent::InvoicePaid(paid) = event {
                if paid.send_thank_you {
                    self.send_thank_you(owner_id, &next)?;
                }
            }
        }
        Ok(next)
    }

    /// Replace the editable details; a changed invoice number must stay unique.
    pub fn update_details(
        &self,
        owner_id: OwnerId,
        invoice_id: InvoiceId,
        details: InvoiceDetails,
        now: DateTime<Utc>,
    ) -> Result<Invoice, DispatchError> {
        if let Some(other) = self.store.find_by_number(owner_id, &details.invoice_number)? {
            if other.id_typed() != invoice_id {
                return Err(DomainError::conflict(format!(
                    "invoice number {} already exists",
                    details.invoice_number
                ))
                .into());
            }
        }
        self.execute(
            owner_id,
            invoice_id,
            InvoiceCommand::UpdateDetails(UpdateDetails {
                details,
                occurred_at: now,
            }),
        )
    }

    /// Preview a checkpoint email; with `tone`, regenerate it first.
    pub fn preview(
        &self,
        owner_id: OwnerId,
        invoice_id: InvoiceId,
        checkpoint: Checkpoint,
        tone: Option<Tone>,
        now: DateTime<Utc>,
    ) -> Result<EmailPreview, DispatchError> {
        let invoice = match tone {
            Some(tone) => self.execute(
                owner_id,
                invoice_id,
                InvoiceCommand::RegenerateEmail(RegenerateEmail {
                    checkpoint,
                    tone,
                    occurred_at: now,
                }),
            )?,
            None => self.get(owner_id, invoice_id)?,
        };
        Ok(preview_email(&invoice, checkpoint, self.composer.as_ref()))
    }

    /// Fire every reminder that is due at `now`.
    ///
    /// Plans are computed first; each due send then reloads its invoice and
    /// re-checks the guards, so a pause, payment or delete that landed in
    /// between cancels the send instead of failing the sweep.
    pub fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, DispatchError> {
        let mut report = SweepReport::default();
        let mut due = Vec::new();

        for (owner_id, invoice_id) in self.store.keys()? {
            let Some(mut invoice) = self.store.load(owner_id, invoice_id)? else {
                continue;
            };
            if invoice.is_deleted() || invoice.is_paid() {
                continue;
            }
            if invoice.pause_expired(now) {
                let resume = InvoiceCommand::Resume(ResumeReminders { occurred_at: now });
                match self.execute(owner_id, invoice_id, resume) {
                    Ok(resumed) => {
                        info!(invoice_id = %invoice_id, "pause elapsed, reminders resumed");
                        report.resumed.push(invoice_id);
                        invoice = resumed;
                    }
                    Err(e) => {
                        warn!(invoice_id = %invoice_id, error = %e, "auto-resume failed");
                        continue;
                    }
                }
            }
            match invoice.planned_send(&self.window) {
                Ok(Some(plan)) if plan.send_at <= now => {
                    due.push((owner_id, invoice_id, plan.checkpoint));
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(invoice_id = %invoice_id, error = %e, "could not plan reminder, skipped");
                    report.unplanned.push(invoice_id);
                }
            }
        }

        for (owner_id, invoice_id, checkpoint) in due {
            match self.fire(owner_id, invoice_id, checkpoint, now) {
                Ok(sent) => report.sent.push(sent),
                Err(DispatchError::Domain(e)) => {
                    warn!(
                        invoice_id = %invoice_id,
                        checkpoint = %checkpoint,
                        error = %e,
                        "reminder cancelled at fire time"
                    );
                    report.cancelled.push(SkippedSend {
                        invoice_id,
                        checkpoint,
                        reason: e.to_string(),
                    });
                }
                Err(DispatchError::External(e)) => {
                    warn!(
                        invoice_id = %invoice_id,
                        checkpoint = %checkpoint,
                        error = %e,
                        "reminder delivery failed"
                    );
                    report.failed.push(SkippedSend {
                        invoice_id,
                        checkpoint,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            sent = report.sent.len(),
            resumed = report.resumed.len(),
            cancelled = report.cancelled.len(),
            failed = report.failed.len(),
            unplanned = report.unplanned.len(),
            "reminder sweep finished"
        );
        Ok(report)
    }

    fn fire(
        &self,
        owner_id: OwnerId,
        invoice_id: InvoiceId,
        checkpoint: Checkpoint,
        now: DateTime<Utc>,
    ) -> Result<SentReminder, DispatchError> {
        let current = self
            .store
            .load(owner_id, invoice_id)?
            .ok_or(DomainError::NotFound)?;
        let command = InvoiceCommand::Fire(FireCheckpoint {
            checkpoint,
            occurred_at: now,
        });
        let (next, events) = current.execute(&command)?;

        let content = preview_email(&current, checkpoint, self.composer.as_ref());
        let email = OutboundEmail {
            invoice_id,
            owner_id,
            kind: EmailKind::Reminder(checkpoint),
            to: current.client_email().to_string(),
            subject: content.subject,
            body: content.body,
        };
        self.notifier.send(&email)?;
        self.commit(owner_id, &current, &next, events)?;

        Ok(SentReminder {
            invoice_id,
            checkpoint,
            sent_at: now,
            to: email.to,
        })
    }

    fn persist_new(
        &self,
        owner_id: OwnerId,
        invoice_id: InvoiceId,
        details: InvoiceDetails,
        now: DateTime<Utc>,
    ) -> Result<Invoice, DispatchError> {
        let empty = Invoice::empty(invoice_id);
        let (invoice, events) = empty.execute(&InvoiceCommand::Create(CreateInvoice {
            invoice_id,
            owner_id,
            details,
            occurred_at: now,
        }))?;
        self.commit(owner_id, &empty, &invoice, events)?;
        Ok(invoice)
    }

    fn commit(
        &self,
        owner_id: OwnerId,
        current: &Invoice,
        next: &Invoice,
        events: Vec<InvoiceEvent>,
    ) -> Result<(), DispatchError> {
        let base = current.version();
        let invoice_id = next.id_typed();
        let envelopes: Vec<_> = events
            .into_iter()
            .zip(base + 1..)
            .map(|(event, sequence)| EventEnvelope::new(invoice_id, owner_id, sequence, event))
            .collect();

        for envelope in &envelopes {
            info!(
                invoice_id = %invoice_id,
                event_type = envelope.event_type(),
                sequence = envelope.sequence(),
                occurred_at = %envelope.payload().occurred_at(),
                "invoice transition committed"
            );
        }
        self.store
            .save(owner_id, next, envelopes, ExpectedVersion::Exact(base))?;
        Ok(())
    }

    fn send_thank_you(&self, owner_id: OwnerId, invoice: &Invoice) -> Result<(), DispatchError> {
        let email = OutboundEmail {
            invoice_id: invoice.id_typed(),
            owner_id,
            kind: EmailKind::ThankYou,
            to: invoice.client_email().to_string(),
            subject: format!("Payment received: Invoice #{}", invoice.invoice_number()),
            body: format!(
                "Hi {},\n\nWe've received your payment of {} for invoice #{}. Thank you!\n",
                invoice.client_name(),
                invoice.currency().format(invoice.total_due()),
                invoice.invoice_number()
            ),
        };
        self.notifier.send(&email).inspect_err(|e| {
            warn!(invoice_id = %invoice.id_typed(), error = %e, "thank-you email failed");
        })?;
        Ok(())
    }
}
