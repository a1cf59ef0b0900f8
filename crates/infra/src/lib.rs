//! Infrastructure layer: collaborator ports, in-memory adapters and the
//! command pipeline that ties them to the invoice lifecycle.

pub mod command_dispatcher;
pub mod extractor;
pub mod notifier;
pub mod store;

pub use command_dispatcher::{DispatchError, ReminderDispatcher, SentReminder, SkippedSend, SweepReport};
pub use extractor::{CsvExtractor, RowExtractor};
pub use notifier::{EmailKind, InMemoryNotifier, LogNotifier, Notifier, OutboundEmail};
pub use store::{InMemoryInvoiceStore, InvoiceStore, StoreError};
