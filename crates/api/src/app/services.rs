//! Service wiring for the HTTP layer.

use std::sync::Arc;

use dunning_infra::{
    CsvExtractor, InMemoryInvoiceStore, InvoiceStore, LogNotifier, Notifier, ReminderDispatcher,
    RowExtractor,
};
use dunning_reminders::{CurrencyCode, SendWindow};

use crate::config::ApiConfig;

pub type Dispatcher = ReminderDispatcher<Arc<dyn InvoiceStore>, Arc<dyn Notifier>>;

/// Everything a handler needs, shared behind an `Arc`.
pub struct AppServices {
    pub dispatcher: Dispatcher,
    pub extractor: Arc<dyn RowExtractor>,
    pub default_currency: CurrencyCode,
}

impl AppServices {
    pub fn new(
        store: Arc<dyn InvoiceStore>,
        notifier: Arc<dyn Notifier>,
        extractor: Arc<dyn RowExtractor>,
        config: &ApiConfig,
    ) -> Self {
        Self {
            dispatcher: ReminderDispatcher::new(store, notifier, config.send_window),
            extractor,
            default_currency: config.default_currency.clone(),
        }
    }

    /// In-memory store, log-only delivery and CSV extraction.
    pub fn in_memory(config: &ApiConfig) -> Self {
        Self::new(
            Arc::new(InMemoryInvoiceStore::new()),
            Arc::new(LogNotifier),
            Arc::new(CsvExtractor::new()),
            config,
        )
    }

    pub fn window(&self) -> &SendWindow {
        self.dispatcher.window()
    }
}
