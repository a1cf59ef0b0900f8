//! Batch import: rows in, accepted invoices plus row errors out.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use dunning_core::{Aggregate, DomainError, InvoiceId, OwnerId};

use crate::date::normalize_date;
use crate::invoice::{CreateInvoice, Invoice, InvoiceCommand, InvoiceDetails};
use crate::money::{CurrencyCode, parse_amount};
use crate::schedule::{SendWindow, batch_first_send};
use crate::validation::{RawRow, validate_row};

/// Context shared by every row of one upload.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub owner_id: OwnerId,
    pub currency: CurrencyCode,
    pub now: DateTime<Utc>,
}

impl ImportOptions {
    pub fn new(owner_id: OwnerId, now: DateTime<Utc>) -> Self {
        Self {
            owner_id,
            currency: CurrencyCode::default(),
            now,
        }
    }

    pub fn with_currency(mut self, currency: CurrencyCode) -> Self {
        self.currency = currency;
        self
    }
}

/// Outcome of one upload. Row failures never abort sibling rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub accepted: Vec<Invoice>,
    /// 1-based upload row of each entry in `accepted`.
    #[serde(skip)]
    pub accepted_rows: Vec<usize>,
    pub errors: Vec<String>,
    /// Earliest effective send across `accepted`; `None` when nothing was accepted.
    pub first_send: Option<DateTime<Utc>>,
}

/// Validate one row and turn it into invoice details.
pub fn accept_row(
    row: &RawRow,
    index: usize,
    currency: &CurrencyCode,
) -> Result<InvoiceDetails, Vec<String>> {
    let errors = validate_row(row, index);
    if !errors.is_empty() {
        return Err(errors);
    }

    let n = index + 1;
    let field = |name: &str| row.value(name).unwrap_or_default().to_string();
    let amount = row
        .value("Amount")
        .and_then(parse_amount)
        .ok_or_else(|| vec![format!("Row {n}: Invalid amount")])?;
    let due_date = row
        .value("Due")
        .map(normalize_date)
        .and_then(Result::ok)
        .ok_or_else(|| vec![format!("Row {n}: Invalid date format")])?;

    Ok(InvoiceDetails {
        invoice_number: field("Invoice"),
        client_name: field("Client"),
        client_email: field("Email"),
        amount,
        currency: currency.clone(),
        due_date,
        late_fee: None,
    })
}

/// Create a fresh `pending`/`active` invoice owned by `owner_id`.
pub fn new_invoice(
    details: InvoiceDetails,
    owner_id: OwnerId,
    now: DateTime<Utc>,
) -> Result<Invoice, DomainError> {
    let invoice_id = InvoiceId::new();
    let command = InvoiceCommand::Create(CreateInvoice {
        invoice_id,
        owner_id,
        details,
        occurred_at: now,
    });
    Invoice::empty(invoice_id)
        .execute(&command)
        .map(|(invoice, _events)| invoice)
}

/// Run the validator over every row and build invoices for the clean ones.
///
/// A repeated invoice number inside the batch is reported against the later
/// row; the first occurrence is kept.
pub fn import_batch(rows: &[RawRow], options: &ImportOptions, window: &SendWindow) -> ImportReport {
    let mut report = ImportReport::default();
    let mut seen = HashSet::new();

    for (index, row) in rows.iter().enumerate() {
        let n = index + 1;
        let details = match accept_row(row, index, &options.currency) {
            Ok(details) => details,
            Err(errors) => {
                report.errors.extend(errors);
                continue;
            }
        };

        if !seen.insert(details.invoice_number.clone()) {
            report.errors.push(format!(
                "Row {n}: Duplicate invoice number {}",
                details.invoice_number
            ));
            continue;
        }

        match new_invoice(details, options.owner_id, options.now) {
            Ok(invoice) => {
                report.accepted.push(invoice);
                report.accepted_rows.push(n);
            }
            Err(DomainError::Validation(errors)) => report
                .errors
                .extend(errors.into_iter().map(|e| format!("Row {n}: {e}"))),
            Err(other) => report.errors.push(format!("Row {n}: {other}")),
        }
    }

    report.first_send = batch_first_send(
        report.accepted.iter().map(Invoice::due_date),
        options.now,
        window,
    );
    report
}

/// Split CSV text (header row plus records) into raw rows.
///
/// Cells are trimmed, short records are allowed and blank lines skipped.
pub fn parse_csv(text: &str) -> Result<Vec<RawRow>, DomainError> {
    let text = text.trim_start_matches('\u{feff}');
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers().map_err(csv_error)?.clone();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        rows.push(headers.iter().zip(record.iter()).collect());
    }
    Ok(rows)
}

fn csv_error(err: csv::Error) -> DomainError {
    DomainError::validation(vec![format!("Could not read CSV: {err}")])
}
