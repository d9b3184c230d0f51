pub mod document;
pub mod error;
pub mod holding;
pub mod transaction;

pub use crate::document::Document;
pub use crate::error::ParqetError;
pub use crate::holding::HoldingMap;
pub use crate::transaction::{NormalizedTransaction, RawTransaction, TransactionKind};
