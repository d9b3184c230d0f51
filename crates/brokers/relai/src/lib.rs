//! Relai bitcoin broker CSV export. Every row is a BTC trade; the asset
//! code is `BTC` rather than an ISIN.

use engine::datetime::parse_to_utc;
use engine::normalize::parse_amount;
use engine::{csv_header_matches, Broker, Extraction};
use models::{Document, HoldingMap, NormalizedTransaction, ParqetError, TransactionKind};
use regex::Regex;
use serde::Deserialize;
use tracing::warn;

pub const BROKER_NAME: &str = "Relai";

const EXPECTED_HEADERS: [&str; 11] = [
    "Date",
    "Transaction Type",
    "BTC Amount",
    "BTC Price",
    "Currency Pair",
    "Fiat Amount (excl. fees)",
    "Fiat Currency",
    "Fee",
    "Fee Currency",
    "Destination",
    "Operation ID",
];

#[derive(Debug, Deserialize)]
struct RelaiRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Transaction Type")]
    transaction_type: String,
    #[serde(rename = "BTC Amount")]
    btc_amount: Option<String>,
    #[serde(rename = "BTC Price")]
    btc_price: Option<String>,
    #[serde(rename = "Fiat Amount (excl. fees)")]
    fiat_amount: Option<String>,
    #[serde(rename = "Fiat Currency")]
    fiat_currency: Option<String>,
    #[serde(rename = "Fee")]
    fee: Option<String>,
    #[serde(rename = "Destination")]
    destination: Option<String>,
}

pub struct RelaiBroker;

impl RelaiBroker {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RelaiBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl Broker for RelaiBroker {
    fn name(&self) -> &str {
        BROKER_NAME
    }

    fn detect(&self, document: &Document) -> bool {
        csv_header_matches(document, &EXPECTED_HEADERS)
    }

    fn process(
        &self,
        document: &Document,
        holdings: &HoldingMap,
    ) -> Result<Extraction, ParqetError> {
        let content = document.csv_content().ok_or_else(|| {
            ParqetError::Validation(format!("not a CSV document: {}", document.filename()))
        })?;

        let mut extraction = Extraction::default();
        let mut reader = csv::Reader::from_reader(content.as_bytes());
        for record in reader.deserialize::<RelaiRow>() {
            let row = match record {
                Ok(row) => row,
                Err(e) => {
                    extraction.failures.push(ParqetError::Validation(format!(
                        "unreadable row in {}: {}",
                        document.filename(),
                        e
                    )));
                    continue;
                }
            };
            match row_txn(&row, document.filename(), holdings) {
                Ok(txn) => extraction.transactions.push(txn),
                Err(e) => extraction.failures.push(e),
            }
        }

        Ok(extraction)
    }
}

fn row_txn(
    row: &RelaiRow,
    filename: &str,
    holdings: &HoldingMap,
) -> Result<NormalizedTransaction, ParqetError> {
    let datetime = parse_to_utc(&row.date, TransactionKind::Trade)?;

    let gross = parse_amount(non_empty(&row.fiat_amount).ok_or_else(|| {
        ParqetError::Validation("row without fiat amount".to_string())
    })?)?
    .abs();
    let fee = match non_empty(&row.fee) {
        Some(value) => parse_amount(value)?.abs(),
        None => 0.0,
    };
    let shares = parse_amount(non_empty(&row.btc_amount).ok_or_else(|| {
        ParqetError::Validation("row without BTC amount".to_string())
    })?)?
    .abs();

    let txn_type = if row.transaction_type.eq_ignore_ascii_case("buy") {
        "Buy"
    } else {
        "Sell"
    };

    let mut txn = NormalizedTransaction::new(
        datetime,
        TransactionKind::Trade,
        txn_type,
        BROKER_NAME,
        non_empty(&row.fiat_currency).unwrap_or("CHF"),
        // The fiat amount excludes the fee; the cash that actually moved is
        // net of it.
        gross - fee,
    );
    txn.shares = Some(shares);
    txn.price = match non_empty(&row.btc_price) {
        Some(value) => Some(parse_amount(value)?.abs()),
        None => None,
    };
    if fee > 0.0 {
        txn.fee = Some(fee);
    }
    txn.identifier = Some("BTC".to_string());
    txn.assettype = Some("Crypto".to_string());
    txn.holding = destination_holding(row, filename, holdings)?;
    Ok(txn)
}

/// The holding comes from the on-chain `Destination` when the mapping knows
/// it, otherwise from the IBAN in the export filename.
fn destination_holding(
    row: &RelaiRow,
    filename: &str,
    holdings: &HoldingMap,
) -> Result<String, ParqetError> {
    if let Some(destination) = non_empty(&row.destination) {
        if let Some(holding) = holdings.resolve(destination) {
            return Ok(holding.to_string());
        }
    }

    let re = Regex::new(r"(CH\d{2}\s?\d{4}\s?\d{4}\s?\d{4}\s?\d{4}\s?\d)").map_err(|e| {
        ParqetError::Configuration(format!("invalid IBAN pattern: {}", e))
    })?;
    if let Some(iban) = re
        .captures(filename)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().replace(' ', ""))
    {
        if let Some(holding) = holdings.resolve(&iban) {
            return Ok(holding.to_string());
        }
    }

    warn!(filename, "no holding mapping for Relai row");
    Ok(String::new())
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const HEADER: &str = "Date,Transaction Type,BTC Amount,BTC Price,Currency Pair,\
Fiat Amount (excl. fees),Fiat Currency,Fee,Fee Currency,Destination,Operation ID";

    fn doc(rows: &str) -> Document {
        Document::csv("relai_CH9300762011623852957.csv", format!("{}\n{}", HEADER, rows))
    }

    fn holdings() -> HoldingMap {
        HoldingMap::from_map(HashMap::from([
            ("CH9300762011623852957".to_string(), "hld_relai".to_string()),
            ("bc1qexampledest".to_string(), "hld_coldwallet".to_string()),
        ]))
    }

    #[test]
    fn test_detection_by_headers() {
        let broker = RelaiBroker::new();
        assert!(broker.detect(&doc("")));
        assert!(!broker.detect(&Document::csv("x.csv", "Date,Amount\n")));
    }

    #[test]
    fn test_buy_row_net_of_fee() {
        let broker = RelaiBroker::new();
        let doc = doc("2024-06-01,Buy,0.0025,60000.00,BTC/CHF,150.00,CHF,2.25,CHF,,op1\n");
        let extraction = broker.process(&doc, &holdings()).unwrap();
        assert!(extraction.failures.is_empty());

        let txn = &extraction.transactions[0];
        assert_eq!(txn.txn_type, "Buy");
        assert_eq!(txn.amount, 147.75);
        assert_eq!(txn.shares, Some(0.0025));
        assert_eq!(txn.price, Some(60000.0));
        assert_eq!(txn.fee, Some(2.25));
        assert_eq!(txn.identifier.as_deref(), Some("BTC"));
        assert_eq!(txn.assettype.as_deref(), Some("Crypto"));
        // Holding falls back to the filename IBAN.
        assert_eq!(txn.holding, "hld_relai");
        assert_eq!(txn.datetime.to_rfc3339(), "2024-06-01T06:30:00+00:00");
    }

    #[test]
    fn test_destination_mapping_wins() {
        let broker = RelaiBroker::new();
        let doc = doc("2024-06-01,Buy,0.0025,60000.00,BTC/CHF,150.00,CHF,,CHF,bc1qexampledest,op1\n");
        let extraction = broker.process(&doc, &holdings()).unwrap();
        let txn = &extraction.transactions[0];
        assert_eq!(txn.holding, "hld_coldwallet");
        assert_eq!(txn.fee, None);
        assert_eq!(txn.amount, 150.0);
    }
}
