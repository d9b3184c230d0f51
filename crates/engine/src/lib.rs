//! Extraction engine: prioritized pattern libraries, the structured
//! extractor, broker detection and field normalization.

pub mod broker;
pub mod datetime;
pub mod extract;
pub mod normalize;
pub mod patterns;

pub use crate::broker::{csv_header_matches, detect_broker, Broker, Extraction, PatternBroker};
pub use crate::extract::extract_category;
pub use crate::patterns::{
    pattern, BrokerProfile, CategoryRule, ExtractionPattern, FieldRule, TypeRule,
};

/// Canonical raw field names shared between pattern libraries and the
/// normalizer. Broker profiles must yield their captures under these names.
pub mod fields {
    pub const MATCH: &str = "match";
    pub const AMOUNT: &str = "amount";
    pub const CURRENCY: &str = "currency";
    pub const SHARES: &str = "shares";
    pub const PRICE: &str = "price";
    pub const FX_RATE: &str = "fx_rate";
    pub const ISIN: &str = "isin";
    pub const DATE: &str = "transaction_date";
    pub const FEE: &str = "fee";
    pub const TAX: &str = "tax";
}
