//! Row extraction port for uploaded files.
//!
//! CSV is read in-process; other formats (PDF, spreadsheets) belong to an
//! external extraction collaborator plugged in behind [`RowExtractor`].

use std::sync::Arc;

use dunning_core::ExternalFailure;
use dunning_reminders::{RawRow, parse_csv};

use crate::command_dispatcher::DispatchError;

pub trait RowExtractor: Send + Sync {
    /// Turn an uploaded file into raw rows.
    fn extract(&self, file_name: &str, bytes: &[u8]) -> Result<Vec<RawRow>, DispatchError>;
}

impl<X> RowExtractor for Arc<X>
where
    X: RowExtractor + ?Sized,
{
    fn extract(&self, file_name: &str, bytes: &[u8]) -> Result<Vec<RawRow>, DispatchError> {
        (**self).extract(file_name, bytes)
    }
}

/// Reads `.csv` (and extension-less) uploads; delegates anything else to
/// `fallback` when one is configured.
#[derive(Default, Clone)]
pub struct CsvExtractor {
    fallback: Option<Arc<dyn RowExtractor>>,
}

impl CsvExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fallback(fallback: Arc<dyn RowExtractor>) -> Self {
        Self {
            fallback: Some(fallback),
        }
    }

    fn is_csv(file_name: &str) -> bool {
        match file_name.rsplit_once('.') {
            Some((_, ext)) => ext.eq_ignore_ascii_case("csv") || ext.eq_ignore_ascii_case("txt"),
            None => true,
        }
    }
}

impl RowExtractor for CsvExtractor {
    fn extract(&self, file_name: &str, bytes: &[u8]) -> Result<Vec<RawRow>, DispatchError> {
        if Self::is_csv(file_name) {
            let text = String::from_utf8_lossy(bytes);
            return Ok(parse_csv(&text)?);
        }
        match &self.fallback {
            Some(fallback) => fallback.extract(file_name, bytes),
            None => Err(ExternalFailure::new(
                "row extraction",
                format!("no extractor configured for {file_name}"),
            )
            .into()),
        }
    }
}
