use serde::{Deserialize, Serialize};

use dunning_core::{InvoiceId, OwnerId};

use crate::Event;

/// An event plus the stream metadata needed to keep a per-invoice history.
///
/// `sequence` is the invoice version after the event was applied, so the
/// history of one invoice is strictly increasing from 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    invoice_id: InvoiceId,
    owner_id: OwnerId,
    sequence: u64,
    event_type: String,
    payload: E,
}

impl<E: Event> EventEnvelope<E> {
    pub fn new(invoice_id: InvoiceId, owner_id: OwnerId, sequence: u64, payload: E) -> Self {
        Self {
            invoice_id,
            owner_id,
            sequence,
            event_type: payload.event_type().to_string(),
            payload,
        }
    }
}

impl<E> EventEnvelope<E> {
    pub fn invoice_id(&self) -> InvoiceId {
        self.invoice_id
    }

    pub fn owner_id(&self) -> OwnerId {
        self.owner_id
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }
}
