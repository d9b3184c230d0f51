//! N26 bank account CSV export. Every row is a cash movement; direction
//! comes from the sign of the EUR amount.

use engine::datetime::parse_to_utc;
use engine::normalize::parse_amount;
use engine::{csv_header_matches, Broker, Extraction};
use models::{Document, HoldingMap, NormalizedTransaction, ParqetError, TransactionKind};
use regex::Regex;
use serde::Deserialize;
use tracing::warn;

pub const BROKER_NAME: &str = "N26";

const EXPECTED_HEADERS: [&str; 10] = [
    "Booking Date",
    "Value Date",
    "Partner Name",
    "Partner Iban",
    "Type",
    "Payment Reference",
    "Account Name",
    "Amount (EUR)",
    "Original Amount",
    "Exchange Rate",
];

#[derive(Debug, Deserialize)]
struct N26Row {
    #[serde(rename = "Booking Date")]
    booking_date: Option<String>,
    #[serde(rename = "Value Date")]
    value_date: Option<String>,
    #[serde(rename = "Amount (EUR)")]
    amount_eur: Option<String>,
    #[serde(rename = "Original Amount")]
    original_amount: Option<String>,
    #[serde(rename = "Exchange Rate")]
    exchange_rate: Option<String>,
}

pub struct N26Broker;

impl N26Broker {
    pub fn new() -> Self {
        Self
    }
}

impl Default for N26Broker {
    fn default() -> Self {
        Self::new()
    }
}

impl Broker for N26Broker {
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
        let holding = filename_holding(document.filename(), holdings)?;

        let mut extraction = Extraction::default();
        let mut reader = csv::Reader::from_reader(content.as_bytes());
        for record in reader.deserialize::<N26Row>() {
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
            match row_txn(&row, &holding) {
                Ok(txn) => extraction.transactions.push(txn),
                Err(e) => extraction.failures.push(e),
            }
        }

        Ok(extraction)
    }
}

fn row_txn(row: &N26Row, holding: &str) -> Result<NormalizedTransaction, ParqetError> {
    // Pending transactions have no value date yet; fall back to the booking
    // date.
    let date = non_empty(&row.value_date)
        .or_else(|| non_empty(&row.booking_date))
        .ok_or_else(|| {
            ParqetError::Validation("row without value or booking date".to_string())
        })?;
    let datetime = parse_to_utc(date, TransactionKind::DepositWithdrawal)?;

    let amount = parse_amount(non_empty(&row.amount_eur).ok_or_else(|| {
        ParqetError::Validation("row without EUR amount".to_string())
    })?)?;
    let txn_type = if amount > 0.0 { "TransferIn" } else { "TransferOut" };

    let mut txn = NormalizedTransaction::new(
        datetime,
        TransactionKind::DepositWithdrawal,
        txn_type,
        BROKER_NAME,
        "EUR",
        amount.abs(),
    );
    txn.holding = holding.to_string();
    txn.originalcurrency = Some("EUR".to_string());
    txn.assettype = Some("Cash".to_string());
    if non_empty(&row.original_amount).is_some() {
        if let Some(rate) = non_empty(&row.exchange_rate) {
            txn.fxrate = Some(parse_amount(rate)?.abs());
        }
    }
    Ok(txn)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// German IBAN embedded in the export filename, resolved to a holding.
fn filename_holding(filename: &str, holdings: &HoldingMap) -> Result<String, ParqetError> {
    let re = Regex::new(r"(DE\d{2}\s?\d{4}\s?\d{4}\s?\d{4}\s?\d{4}\s?\d{2})").map_err(|e| {
        ParqetError::Configuration(format!("invalid IBAN pattern: {}", e))
    })?;
    let Some(iban) = re
        .captures(filename)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().replace(' ', ""))
    else {
        warn!(filename, "no IBAN in filename");
        return Ok(String::new());
    };
    match holdings.resolve(&iban) {
        Some(holding) => Ok(holding.to_string()),
        None => {
            warn!(iban, filename, "IBAN has no holding mapping");
            Ok(String::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const HEADER: &str = "Booking Date,Value Date,Partner Name,Partner Iban,Type,\
Payment Reference,Account Name,Amount (EUR),Original Amount,Exchange Rate";

    fn doc(rows: &str) -> Document {
        Document::csv(
            "n26_DE02120300000000202051.csv",
            format!("{}\n{}", HEADER, rows),
        )
    }

    fn holdings() -> HoldingMap {
        HoldingMap::from_map(HashMap::from([(
            "DE02120300000000202051".to_string(),
            "hld_n26".to_string(),
        )]))
    }

    #[test]
    fn test_detection_by_headers() {
        let broker = N26Broker::new();
        assert!(broker.detect(&doc("")));
        assert!(!broker.detect(&Document::csv("x.csv", "Date,Amount\n")));
    }

    #[test]
    fn test_direction_from_amount_sign() {
        let broker = N26Broker::new();
        let doc = doc(
            "2024-05-01,2024-05-02,Alice,,,Salary,Main,2500.00,,\n\
             2024-05-03,2024-05-03,Shop,,,Groceries,Main,-54.20,,\n",
        );
        let extraction = broker.process(&doc, &holdings()).unwrap();
        assert_eq!(extraction.transactions.len(), 2);

        let credit = &extraction.transactions[0];
        assert_eq!(credit.txn_type, "TransferIn");
        assert_eq!(credit.amount, 2500.0);
        assert_eq!(credit.currency, "EUR");
        assert_eq!(credit.holding, "hld_n26");
        assert_eq!(credit.datetime.to_rfc3339(), "2024-05-02T08:30:00+00:00");

        assert_eq!(extraction.transactions[1].txn_type, "TransferOut");
    }

    #[test]
    fn test_booking_date_fallback() {
        let broker = N26Broker::new();
        let doc = doc("2024-05-01,,Alice,,,Transfer,Main,100.00,,\n");
        let extraction = broker.process(&doc, &holdings()).unwrap();
        assert_eq!(
            extraction.transactions[0].datetime.to_rfc3339(),
            "2024-05-01T08:30:00+00:00"
        );
    }

    #[test]
    fn test_row_without_dates_is_failure() {
        let broker = N26Broker::new();
        let doc = doc(",,Alice,,,Transfer,Main,100.00,,\n");
        let extraction = broker.process(&doc, &holdings()).unwrap();
        assert!(extraction.transactions.is_empty());
        assert_eq!(extraction.failures.len(), 1);
    }
}
