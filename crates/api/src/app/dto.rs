use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use dunning_reminders::{Checkpoint, Invoice, InvoiceDetails, RawRow, SendWindow};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct ValidateRowRequest {
    pub row: BTreeMap<String, String>,
    /// 0-based position of the row in its upload; messages use `index + 1`.
    #[serde(default)]
    pub index: usize,
}

#[derive(Debug, Deserialize)]
pub struct NormalizeDateRequest {
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleQuery {
    pub due: String,
    pub now: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    pub rows: Vec<BTreeMap<String, String>>,
    pub currency: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub currency: Option<String>,
    pub file_name: Option<String>,
}

/// Single invoice entry. Text fields go through the same checks as uploaded rows.
#[derive(Debug, Deserialize)]
pub struct CreateInvoiceRequest {
    pub invoice_number: String,
    pub client_name: String,
    pub client_email: String,
    pub amount: String,
    pub due_date: String,
    pub currency: Option<String>,
    pub late_fee: Option<Decimal>,
}

impl CreateInvoiceRequest {
    pub fn to_row(&self) -> RawRow {
        RawRow::new()
            .with("Invoice", &self.invoice_number)
            .with("Client", &self.client_name)
            .with("Email", &self.client_email)
            .with("Amount", &self.amount)
            .with("Due", &self.due_date)
    }
}

/// Partial edit; absent fields keep their current value.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateInvoiceRequest {
    pub invoice_number: Option<String>,
    pub client_name: Option<String>,
    pub client_email: Option<String>,
    pub amount: Option<Decimal>,
    pub due_date: Option<String>,
    pub currency: Option<String>,
    pub late_fee: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct PauseRequest {
    /// `indefinite`, `<n>d` or an RFC 3339 instant.
    #[serde(default = "default_pause")]
    pub duration: String,
    pub reason: Option<String>,
}

fn default_pause() -> String {
    "indefinite".to_string()
}

#[derive(Debug, Default, Deserialize)]
pub struct MarkPaidRequest {
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_method: Option<String>,
    pub proof: Option<String>,
    #[serde(default)]
    pub send_thank_you: bool,
}

#[derive(Debug, Deserialize)]
pub struct EditEmailRequest {
    pub checkpoint: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct PreviewEmailRequest {
    pub checkpoint: String,
    /// When present, the checkpoint's draft is regenerated in this tone first.
    pub tone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SweepRequest {
    pub now: Option<DateTime<Utc>>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub days_late: i64,
    /// Signed `today - due`; negative while not yet due.
    pub days_relative: i64,
    pub total_due: Decimal,
    pub next_checkpoint: Option<Checkpoint>,
    pub next_send_at: Option<DateTime<Utc>>,
}

impl InvoiceResponse {
    pub fn new(invoice: Invoice, now: DateTime<Utc>, window: &SendWindow) -> Self {
        let today = window.local_date(now);
        // An unplannable due date shows as nothing scheduled.
        let planned = invoice.planned_send(window).ok().flatten();
        Self {
            days_late: invoice.days_late(today),
            days_relative: invoice.days_relative(today),
            total_due: invoice.total_due(),
            next_checkpoint: planned.map(|p| p.checkpoint),
            next_send_at: planned.map(|p| p.send_at),
            invoice,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ValidateRowResponse {
    pub valid: bool,
    pub errors: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct NormalizeDateResponse {
    pub date: NaiveDate,
}

// -------------------------
// Mapping helpers
// -------------------------

pub fn rows_from_maps(rows: Vec<BTreeMap<String, String>>) -> Vec<RawRow> {
    rows.into_iter().map(|row| row.into_iter().collect()).collect()
}

/// Apply a partial edit over the current details.
pub fn merge_details(
    current: &InvoiceDetails,
    body: UpdateInvoiceRequest,
) -> Result<InvoiceDetails, Vec<String>> {
    let mut errors = Vec::new();
    let mut details = current.clone();

    if let Some(number) = body.invoice_number {
        details.invoice_number = number.trim().to_string();
    }
    if let Some(name) = body.client_name {
        if name.trim().is_empty() {
            errors.push("Missing Client".to_string());
        }
        details.client_name = name.trim().to_string();
    }
    if let Some(email) = body.client_email {
        if !dunning_reminders::is_valid_email(email.trim()) {
            errors.push("Invalid email format".to_string());
        }
        details.client_email = email.trim().to_string();
    }
    if let Some(amount) = body.amount {
        details.amount = amount;
    }
    if let Some(due) = body.due_date {
        match dunning_reminders::normalize_date(&due) {
            Ok(date) => details.due_date = date,
            Err(_) => errors.push("Invalid date format".to_string()),
        }
    }
    if let Some(currency) = body.currency {
        match currency.parse() {
            Ok(code) => details.currency = code,
            Err(_) => errors.push(format!("Invalid currency code: {}", currency.trim())),
        }
    }
    if body.late_fee.is_some() {
        details.late_fee = body.late_fee;
    }

    if errors.is_empty() {
        Ok(details)
    } else {
        Err(errors)
    }
}
