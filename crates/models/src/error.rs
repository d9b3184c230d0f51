use crate::transaction::TransactionKind;
use thiserror::Error;

/// Error taxonomy for the whole pipeline. Occurrence- and document-level
/// errors are reported and the batch continues; `Configuration`,
/// `FileOperation` and `CsvWrite` are fatal for the run or for the affected
/// ledger write.
#[derive(Debug, Error)]
pub enum ParqetError {
    #[error("no broker matched document '{0}'")]
    BrokerDetection(String),

    // The field holding the originating filename must not be called
    // `source`; thiserror reserves that name for an error cause.
    #[error("could not extract required field '{field}' for {kind} transaction in '{document}'")]
    TransactionExtraction {
        kind: TransactionKind,
        field: String,
        document: String,
    },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid ISIN code '{0}'")]
    IsinValidation(String),

    #[error("invalid amount '{0}'")]
    AmountValidation(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("file operation failed: {0}")]
    FileOperation(String),

    #[error("CSV write failed: {0}")]
    CsvWrite(String),

    #[error("PDF text extraction failed for '{0}'")]
    PdfParsing(String),
}

impl ParqetError {
    /// Whether this error aborts the run rather than a single document or
    /// occurrence.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ParqetError::Configuration(_) | ParqetError::FileOperation(_) | ParqetError::CsvWrite(_)
        )
    }
}
