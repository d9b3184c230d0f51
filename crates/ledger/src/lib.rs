//! Persistent per-category transaction ledgers: row rendering into the
//! portfolio-tracker CSV schema, content-derived transaction identity and
//! idempotent merge/write.

pub mod identity;
pub mod row;
pub mod store;

pub use crate::identity::transaction_id;
pub use crate::row::{render_row, Row, COLUMNS, ID_COLUMN};
pub use crate::store::{merge_rows, read_ledger, write_ledger, MergeStats};
