//! Reminder scheduling and invoice lifecycle.
//!
//! Pure domain logic: date normalisation, row validation, the reminder
//! timeline, the per-invoice state machine and batch import. No IO, no
//! clocks (callers pass `now`), no storage.

pub mod date;
pub mod email;
pub mod import;
pub mod invoice;
pub mod money;
pub mod schedule;
pub mod validation;

pub use date::{is_valid_date, normalize_date};
pub use email::{EmailComposer, EmailContent, EmailDraft, EmailPreview, TemplateComposer, Tone, preview_email};
pub use import::{ImportOptions, ImportReport, accept_row, import_batch, new_invoice, parse_csv};
pub use invoice::{
    CheckpointFired, CreateInvoice, DeleteInvoice, DetailsUpdated, EditEmail, EmailEdited,
    EmailRegenerated, FireCheckpoint, Invoice, InvoiceCommand, InvoiceCreated, InvoiceDeleted,
    InvoiceDetails, InvoiceEvent, InvoicePaid, InvoiceStatus, MarkPaid, PauseDuration,
    PauseReminders, PausedUntil, RegenerateEmail, ReminderStatus, RemindersPaused,
    RemindersResumed, ResumeReminders, UpdateDetails, apply_transition,
};
pub use money::{CurrencyCode, parse_amount};
pub use schedule::{
    Checkpoint, PlannedSend, Schedule, SendWindow, batch_first_send, compute_schedule,
    compute_schedule_from_text, plan_send,
};
pub use validation::{REQUIRED_FIELDS, RawRow, is_valid_email, validate_row};
