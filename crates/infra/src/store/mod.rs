//! Invoice persistence port.
//!
//! The storage collaborator is external; this trait is the request/response
//! boundary the dispatcher talks to. [`InMemoryInvoiceStore`] backs tests and
//! the dev server.

mod in_memory;

use std::sync::Arc;

use thiserror::Error;

use dunning_core::{ExpectedVersion, InvoiceId, OwnerId};
use dunning_events::EventEnvelope;
use dunning_reminders::{Invoice, InvoiceEvent};

pub use in_memory::InMemoryInvoiceStore;

/// Failure reported by the storage collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Stale version or a clashing invoice number.
    #[error("conflict: {0}")]
    Conflict(String),
    /// The backend could not serve the request.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Owner-scoped invoice storage with optimistic concurrency.
///
/// Every read and write is keyed by `(owner, invoice)`; an invoice is never
/// visible to another owner.
pub trait InvoiceStore: Send + Sync {
    fn load(&self, owner_id: OwnerId, invoice_id: InvoiceId) -> Result<Option<Invoice>, StoreError>;

    /// Persist `invoice` and append `events` to its history.
    ///
    /// `expected` is checked against the stored version (0 when absent).
    /// Invoice numbers are unique per owner among non-deleted invoices.
    fn save(
        &self,
        owner_id: OwnerId,
        invoice: &Invoice,
        events: Vec<EventEnvelope<InvoiceEvent>>,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError>;

    /// All invoices of one owner, oldest first.
    fn list(&self, owner_id: OwnerId) -> Result<Vec<Invoice>, StoreError>;

    /// Every stored invoice key, for the fire-time sweep.
    fn keys(&self) -> Result<Vec<(OwnerId, InvoiceId)>, StoreError>;

    /// A non-deleted invoice of `owner_id` carrying `invoice_number`.
    fn find_by_number(
        &self,
        owner_id: OwnerId,
        invoice_number: &str,
    ) -> Result<Option<Invoice>, StoreError>;

    fn history(
        &self,
        owner_id: OwnerId,
        invoice_id: InvoiceId,
    ) -> Result<Vec<EventEnvelope<InvoiceEvent>>, StoreError>;
}

impl<S> InvoiceStore for Arc<S>
where
    S: InvoiceStore + ?Sized,
{
    fn load(&self, owner_id: OwnerId, invoice_id: InvoiceId) -> Result<Option<Invoice>, StoreError> {
        (**self).load(owner_id, invoice_id)
    }

    fn save(
        &self,
        owner_id: OwnerId,
        invoice: &Invoice,
        events: Vec<EventEnvelope<InvoiceEvent>>,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError> {
        (**self).save(owner_id, invoice, events, expected)
    }

    fn list(&self, owner_id: OwnerId) -> Result<Vec<Invoice>, StoreError> {
        (**self).list(owner_id)
    }

    fn keys(&self) -> Result<Vec<(OwnerId, InvoiceId)>, StoreError> {
        (**self).keys()
    }

    fn find_by_number(
        &self,
        owner_id: OwnerId,
        invoice_number: &str,
    ) -> Result<Option<Invoice>, StoreError> {
        (**self).find_by_number(owner_id, invoice_number)
    }

    fn history(
        &self,
        owner_id: OwnerId,
        invoice_id: InvoiceId,
    ) -> Result<Vec<EventEnvelope<InvoiceEvent>>, StoreError> {
        (**self).history(owner_id, invoice_id)
    }
}
