use std::collections::HashMap;
use std::sync::RwLock;

use dunning_core::{AggregateRoot, ExpectedVersion, InvoiceId, OwnerId};
use dunning_events::EventEnvelope;
use dunning_reminders::{Invoice, InvoiceEvent};

use super::{InvoiceStore, StoreError};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct RecordKey {
    owner_id: OwnerId,
    invoice_id: InvoiceId,
}

#[derive(Debug, Clone)]
struct Record {
    invoice: Invoice,
    history: Vec<EventEnvelope<InvoiceEvent>>,
}

/// In-memory invoice store.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryInvoiceStore {
    records: RwLock<HashMap<RecordKey, Record>>,
}

impl InMemoryInvoiceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Unavailable("lock poisoned".to_string())
}

impl InvoiceStore for InMemoryInvoiceStore {
    fn load(&self, owner_id: OwnerId, invoice_id: InvoiceId) -> Result<Option<Invoice>, StoreError> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records
            .get(&RecordKey {
                owner_id,
                invoice_id,
            })
            .map(|r| r.invoice.clone()))
    }

    fn save(
        &self,
        owner_id: OwnerId,
        invoice: &Invoice,
        events: Vec<EventEnvelope<InvoiceEvent>>,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError> {
        let key = RecordKey {
            owner_id,
            invoice_id: invoice.id_typed(),
        };
        let mut records = self.records.write().map_err(poisoned)?;

        let current = records.get(&key).map(|r| r.invoice.version()).unwrap_or(0);
        if !expected.matches(current) {
            return Err(StoreError::Conflict(format!(
                "expected {expected:?}, found version {current}"
            )));
        }

        if !invoice.is_deleted() {
            let clash = records.iter().any(|(k, r)| {
                k.owner_id == owner_id
                    && k.invoice_id != key.invoice_id
                    && !r.invoice.is_deleted()
                    && r.invoice.invoice_number() == invoice.invoice_number()
            });
            if clash {
                return Err(StoreError::Conflict(format!(
                    "invoice number {} already exists",
                    invoice.invoice_number()
                )));
            }
        }

        let record = records.entry(key).or_insert_with(|| Record {
            invoice: invoice.clone(),
            history: Vec::new(),
        });
        record.invoice = invoice.clone();
        record.history.extend(events);
        Ok(())
    }

    fn list(&self, owner_id: OwnerId) -> Result<Vec<Invoice>, StoreError> {
        let records = self.records.read().map_err(poisoned)?;
        let mut invoices: Vec<Invoice> = records
            .iter()
            .filter(|(k, _)| k.owner_id == owner_id)
            .map(|(_, r)| r.invoice.clone())
            .collect();
        invoices.sort_by_key(|i| (i.created_at(), i.id_typed()));
        Ok(invoices)
    }

    fn keys(&self) -> Result<Vec<(OwnerId, InvoiceId)>, StoreError> {
        let records = self.records.read().map_err(poisoned)?;
        let mut keys: Vec<_> = records.keys().map(|k| (k.owner_id, k.invoice_id)).collect();
        keys.sort_by_key(|(_, id)| *id);
        Ok(keys)
    }

    fn find_by_number(
        &self,
        owner_id: OwnerId,
        invoice_number: &str,
    ) -> Result<Option<Invoice>, StoreError> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records
            .iter()
            .find(|(k, r)| {
                k.owner_id == owner_id
                    && !r.invoice.is_deleted()
                    && r.invoice.invoice_number() == invoice_number
            })
            .map(|(_, r)| r.invoice.clone()))
    }

    fn history(
        &self,
        owner_id: OwnerId,
        invoice_id: InvoiceId,
    ) -> Result<Vec<EventEnvelope<InvoiceEvent>>, StoreError> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records
            .get(&RecordKey {
                owner_id,
                invoice_id,
            })
            .map(|r| r.history.clone())
            .unwrap_or_default())
    }
}
