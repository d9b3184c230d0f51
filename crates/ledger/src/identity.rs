use crate::row::Row;
use sha2::{Digest, Sha256};

const ID_PREFIX: &str = "txn_";
const ID_HEX_LEN: usize = 16;

/// Canonical field order for hashing. Changing this order or the field set
/// changes every previously computed id and is a breaking format change.
const IDENTITY_FIELDS: [&str; 6] = [
    "datetime",
    "identifier",
    "amount",
    "type",
    "broker",
    "holding",
];

/// Content-derived transaction id: `txn_` plus the first 16 hex characters
/// of the SHA-256 digest over the canonical fields, as rendered in the row.
/// Hashing rendered strings keeps ids stable between freshly extracted rows
/// and rows read back from an existing ledger file.
pub fn transaction_id(row: &Row) -> String {
    let key = IDENTITY_FIELDS
        .iter()
        .map(|field| row.get(*field).map(|s| s.as_str()).unwrap_or(""))
        .collect::<Vec<_>>()
        .join("|");

    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    let hash = hasher.finalize();

    format!("{}{}", ID_PREFIX, &hex::encode(hash)[..ID_HEX_LEN])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_row() -> Row {
        let mut row = Row::new();
        row.insert("datetime".to_string(), "2024-03-15T06:30:00.000Z".to_string());
        row.insert("identifier".to_string(), "IE00B4L5Y983".to_string());
        row.insert("amount".to_string(), "1000,5".to_string());
        row.insert("type".to_string(), "buy".to_string());
        row.insert("broker".to_string(), "Kasparund AG".to_string());
        row.insert("holding".to_string(), "hld_1".to_string());
        row
    }

    #[test]
    fn test_id_shape() {
        let id = transaction_id(&base_row());
        assert!(id.starts_with("txn_"));
        assert_eq!(id.len(), 4 + 16);
        assert!(id[4..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_identity_ignores_non_canonical_fields() {
        let mut a = base_row();
        let mut b = base_row();
        a.insert("exchange".to_string(), "SIX".to_string());
        b.insert("exchange".to_string(), "XETRA".to_string());
        assert_eq!(transaction_id(&a), transaction_id(&b));
    }

    #[test]
    fn test_identity_changes_with_canonical_field() {
        let a = base_row();
        let mut b = base_row();
        b.insert("amount".to_string(), "1000,6".to_string());
        assert_ne!(transaction_id(&a), transaction_id(&b));
    }
}
