//! Selma robo-advisor CSV export. One export mixes cash transfers, trades,
//! dividends, fees and the stamp-duty / withholding-tax rows that belong to
//! them; the related rows are folded into their trade or dividend here.

use chrono::NaiveDate;
use engine::datetime::{parse_statement_stamp, to_utc, StatementStamp};
use engine::normalize::{parse_amount, validate_isin};
use engine::{csv_header_matches, Broker, Extraction};
use models::{Document, HoldingMap, NormalizedTransaction, ParqetError, TransactionKind};
use regex::Regex;
use serde::Deserialize;
use tracing::warn;

pub const BROKER_NAME: &str = "Selma";

const EXPECTED_HEADERS: [&str; 7] = [
    "Date",
    "Description",
    "Bookkeeping No.",
    "Fund",
    "Amount",
    "Currency",
    "Number of Shares",
];

#[derive(Debug, Deserialize)]
struct SelmaRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Description")]
    description: String,
    #[serde(rename = "Fund")]
    fund: Option<String>,
    #[serde(rename = "Amount")]
    amount: Option<String>,
    #[serde(rename = "Currency")]
    currency: Option<String>,
    #[serde(rename = "Number of Shares")]
    shares: Option<String>,
}

/// Row category derived from description keywords. Checked in this order,
/// first hit wins.
#[derive(Debug, Clone, Copy, PartialEq)]
enum RowCategory {
    CashTransfer,
    Trade,
    Dividend,
    Fee,
    StampDuty,
    WithholdingTax,
}

fn categorize(description: &str) -> Option<RowCategory> {
    let lower = description.to_lowercase();
    const KEYWORDS: [(&str, RowCategory); 6] = [
        ("cash_transfer", RowCategory::CashTransfer),
        ("trade", RowCategory::Trade),
        ("dividend", RowCategory::Dividend),
        ("selma_fee", RowCategory::Fee),
        ("stamp_duty", RowCategory::StampDuty),
        ("withholding_tax", RowCategory::WithholdingTax),
    ];
    KEYWORDS
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, category)| *category)
}

/// One parsed export row, before category-specific assembly.
#[derive(Debug, Clone)]
struct Entry {
    category: RowCategory,
    date: NaiveDate,
    amount: f64,
    currency: String,
    fund: Option<String>,
    shares: Option<f64>,
}

pub struct SelmaBroker;

impl SelmaBroker {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SelmaBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl Broker for SelmaBroker {
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
        let content = document
            .csv_content()
            .ok_or_else(|| ParqetError::Validation(format!(
                "not a CSV document: {}",
                document.filename()
            )))?;
        let holding = filename_holding(document.filename(), holdings)?;

        let mut extraction = Extraction::default();
        let mut entries = Vec::new();

        let mut reader = csv::Reader::from_reader(content.as_bytes());
        for record in reader.deserialize::<SelmaRow>() {
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
            match parse_entry(&row) {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => {}
                Err(e) => extraction.failures.push(e),
            }
        }

        let trades: Vec<&Entry> = entries.iter().filter(|e| e.category == RowCategory::Trade).collect();
        let stamp_duties: Vec<&Entry> =
            entries.iter().filter(|e| e.category == RowCategory::StampDuty).collect();
        let withholding: Vec<&Entry> =
            entries.iter().filter(|e| e.category == RowCategory::WithholdingTax).collect();

        // One distribution arrives as several bookkeeping lines; same-day
        // rows for one fund are summed into a single dividend.
        let mut dividends: Vec<Entry> = Vec::new();
        for entry in entries.iter().filter(|e| e.category == RowCategory::Dividend) {
            match dividends
                .iter_mut()
                .find(|d| d.date == entry.date && d.fund == entry.fund)
            {
                Some(grouped) => grouped.amount += entry.amount,
                None => dividends.push(entry.clone()),
            }
        }

        for entry in &entries {
            match entry.category {
                RowCategory::CashTransfer => {
                    let txn_type = if entry.amount < 0.0 { "TransferOut" } else { "TransferIn" };
                    let mut txn = base_txn(
                        entry,
                        TransactionKind::DepositWithdrawal,
                        txn_type,
                        &holding,
                    );
                    txn.assettype = Some("Cash".to_string());
                    extraction.transactions.push(txn);
                }
                RowCategory::Trade => match trade_txn(entry, &stamp_duties, &holding) {
                    Ok(txn) => extraction.transactions.push(txn),
                    Err(e) => extraction.failures.push(e),
                },
                // Emitted from the aggregated list below.
                RowCategory::Dividend => {}
                RowCategory::Fee => {
                    let mut txn = base_txn(entry, TransactionKind::Fee, "cost", &holding);
                    txn.fee = Some(entry.amount.abs());
                    txn.assettype = Some("Cash".to_string());
                    extraction.transactions.push(txn);
                }
                // Folded into their trade or dividend.
                RowCategory::StampDuty | RowCategory::WithholdingTax => {}
            }
        }

        for entry in &dividends {
            match dividend_txn(entry, &trades, &withholding, &holding) {
                Ok(Some(txn)) => extraction.transactions.push(txn),
                Ok(None) => {}
                Err(e) => extraction.failures.push(e),
            }
        }

        Ok(extraction)
    }
}

fn parse_entry(row: &SelmaRow) -> Result<Option<Entry>, ParqetError> {
    let Some(category) = categorize(&row.description) else {
        return Ok(None);
    };

    let stamp = parse_statement_stamp(&row.date)?;
    let date = match stamp {
        StatementStamp::Date(d) => d,
        StatementStamp::DateTime(dt) => dt.date(),
    };

    let amount = match row.amount.as_deref() {
        Some(value) if !value.trim().is_empty() => parse_amount(value)?,
        _ => 0.0,
    };
    let shares = match row.shares.as_deref() {
        Some(value) if !value.trim().is_empty() => Some(parse_amount(value)?.abs()),
        _ => None,
    };

    Ok(Some(Entry {
        category,
        date,
        amount,
        currency: row
            .currency
            .clone()
            .unwrap_or_else(|| "CHF".to_string()),
        fund: row.fund.clone().filter(|f| !f.trim().is_empty()),
        shares,
    }))
}

fn kind_datetime(entry: &Entry, kind: TransactionKind) -> chrono::DateTime<chrono::Utc> {
    to_utc(StatementStamp::Date(entry.date), kind)
}

fn base_txn(
    entry: &Entry,
    kind: TransactionKind,
    txn_type: &str,
    holding: &str,
) -> NormalizedTransaction {
    let mut txn = NormalizedTransaction::new(
        kind_datetime(entry, kind),
        kind,
        txn_type,
        BROKER_NAME,
        entry.currency.clone(),
        entry.amount.abs(),
    );
    txn.holding = holding.to_string();
    txn.originalcurrency = Some(entry.currency.clone());
    txn
}

/// A negative amount is cash leaving the account, so a buy. Stamp duties
/// booked on the same date for the same fund become the trade's tax.
fn trade_txn(
    entry: &Entry,
    stamp_duties: &[&Entry],
    holding: &str,
) -> Result<NormalizedTransaction, ParqetError> {
    let fund = entry.fund.as_deref().ok_or_else(|| {
        ParqetError::Validation("trade row without fund".to_string())
    })?;
    let shares = entry.shares.ok_or_else(|| {
        ParqetError::Validation(format!("trade row without share count for {}", fund))
    })?;

    let txn_type = if entry.amount < 0.0 { "Buy" } else { "Sell" };
    let mut txn = base_txn(entry, TransactionKind::Trade, txn_type, holding);
    txn.identifier = Some(validate_isin(fund)?);
    txn.shares = Some(shares);
    if shares > 0.0 {
        txn.price = Some(txn.amount / shares);
    }
    txn.assettype = Some("Security".to_string());

    let duty: f64 = stamp_duties
        .iter()
        .filter(|d| d.date == entry.date && d.fund.as_deref() == Some(fund))
        .map(|d| d.amount.abs())
        .sum();
    if duty > 0.0 {
        txn.tax = Some(duty);
    }

    Ok(txn)
}

/// Dividends carry no share count in the export; it is reconstructed as the
/// net position built by earlier trades in the same fund. Withholding-tax
/// rows within three days become the dividend's tax.
fn dividend_txn(
    entry: &Entry,
    trades: &[&Entry],
    withholding: &[&Entry],
    holding: &str,
) -> Result<Option<NormalizedTransaction>, ParqetError> {
    let fund = entry.fund.as_deref().ok_or_else(|| {
        ParqetError::Validation("dividend row without fund".to_string())
    })?;

    let net_shares: f64 = trades
        .iter()
        .filter(|t| t.date < entry.date && t.fund.as_deref() == Some(fund))
        .map(|t| {
            let shares = t.shares.unwrap_or(0.0);
            if t.amount < 0.0 { shares } else { -shares }
        })
        .sum();

    if net_shares <= 0.0 {
        warn!(fund, date = %entry.date, "dividend without a prior position, dropped");
        return Ok(None);
    }

    let mut txn = base_txn(entry, TransactionKind::Dividend, "Dividend", holding);
    txn.identifier = Some(validate_isin(fund)?);
    txn.shares = Some(net_shares);
    txn.price = Some(txn.amount / net_shares);
    txn.assettype = Some("Security".to_string());

    let tax: f64 = withholding
        .iter()
        .filter(|w| {
            w.fund.as_deref() == Some(fund)
                && (w.date - entry.date).num_days().abs() <= 3
        })
        .map(|w| w.amount.abs())
        .sum();
    if tax > 0.0 {
        txn.tax = Some(tax);
    }

    Ok(Some(txn))
}

/// Swiss IBAN embedded in the export filename, resolved to a holding.
fn filename_holding(filename: &str, holdings: &HoldingMap) -> Result<String, ParqetError> {
    let re = Regex::new(r"(CH\d{2}\s?\d{4}\s?\d{4}\s?\d{4}\s?\d{4}\s?\d)").map_err(|e| {
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

    const HEADER: &str = "Date,Description,Bookkeeping No.,Fund,Amount,Currency,Number of Shares";

    fn doc(rows: &str) -> Document {
        Document::csv(
            "selma_CH9300762011623852957.csv",
            format!("{}\n{}", HEADER, rows),
        )
    }

    fn holdings() -> HoldingMap {
        HoldingMap::from_map(HashMap::from([(
            "CH9300762011623852957".to_string(),
            "hld_selma".to_string(),
        )]))
    }

    #[test]
    fn test_detection_by_headers() {
        let broker = SelmaBroker::new();
        assert!(broker.detect(&doc("")));
        assert!(!broker.detect(&Document::csv("x.csv", "Date,Amount\n")));
        assert!(!broker.detect(&Document::pdf("x.pdf", "Selma")));
    }

    #[test]
    fn test_buy_trade_with_stamp_duty_folded() {
        let broker = SelmaBroker::new();
        let doc = doc(
            "2024-04-02,trade,1,IE00B4L5Y983,-1000.00,CHF,5.0\n\
             2024-04-02,stamp_duty,2,IE00B4L5Y983,-1.50,CHF,\n",
        );
        let extraction = broker.process(&doc, &holdings()).unwrap();
        assert!(extraction.failures.is_empty());
        assert_eq!(extraction.transactions.len(), 1);

        let txn = &extraction.transactions[0];
        assert_eq!(txn.txn_type, "Buy");
        assert_eq!(txn.amount, 1000.0);
        assert_eq!(txn.shares, Some(5.0));
        assert_eq!(txn.price, Some(200.0));
        assert_eq!(txn.tax, Some(1.50));
        assert_eq!(txn.holding, "hld_selma");
    }

    #[test]
    fn test_dividend_shares_from_prior_trades() {
        let broker = SelmaBroker::new();
        let doc = doc(
            "2024-01-10,trade,1,IE00B4L5Y983,-1000.00,CHF,5.0\n\
             2024-02-10,trade,2,IE00B4L5Y983,400.00,CHF,2.0\n\
             2024-03-01,dividend,3,IE00B4L5Y983,6.00,CHF,\n\
             2024-03-02,withholding_tax,4,IE00B4L5Y983,-0.90,CHF,\n",
        );
        let extraction = broker.process(&doc, &holdings()).unwrap();
        let dividend = extraction
            .transactions
            .iter()
            .find(|t| t.kind == TransactionKind::Dividend)
            .unwrap();
        // 5 bought, 2 sold.
        assert_eq!(dividend.shares, Some(3.0));
        assert_eq!(dividend.price, Some(2.0));
        assert_eq!(dividend.tax, Some(0.90));
    }

    #[test]
    fn test_same_day_dividend_rows_summed() {
        let broker = SelmaBroker::new();
        let doc = doc(
            "2024-01-10,trade,1,IE00B4L5Y983,-1000.00,CHF,5.0\n\
             2024-03-01,dividend,2,IE00B4L5Y983,6.00,CHF,\n\
             2024-03-01,dividend,3,IE00B4L5Y983,6.00,CHF,\n",
        );
        let extraction = broker.process(&doc, &holdings()).unwrap();
        let dividends: Vec<_> = extraction
            .transactions
            .iter()
            .filter(|t| t.kind == TransactionKind::Dividend)
            .collect();
        assert_eq!(dividends.len(), 1);
        assert_eq!(dividends[0].amount, 12.0);
        assert_eq!(dividends[0].shares, Some(5.0));
    }

    #[test]
    fn test_dividend_without_position_dropped() {
        let broker = SelmaBroker::new();
        let doc = doc("2024-03-01,dividend,1,IE00B4L5Y983,6.00,CHF,\n");
        let extraction = broker.process(&doc, &holdings()).unwrap();
        assert!(extraction.transactions.is_empty());
        assert!(extraction.failures.is_empty());
    }

    #[test]
    fn test_cash_transfer_direction_and_fee() {
        let broker = SelmaBroker::new();
        let doc = doc(
            "2024-01-05,cash_transfer,1,,500.00,CHF,\n\
             2024-01-06,cash_transfer,2,,-200.00,CHF,\n\
             2024-01-31,selma_fee,3,,-3.45,CHF,\n",
        );
        let extraction = broker.process(&doc, &holdings()).unwrap();
        assert_eq!(extraction.transactions.len(), 3);
        assert_eq!(extraction.transactions[0].txn_type, "TransferIn");
        assert_eq!(extraction.transactions[1].txn_type, "TransferOut");

        let fee = &extraction.transactions[2];
        assert_eq!(fee.txn_type, "cost");
        assert_eq!(fee.fee, Some(3.45));
        assert_eq!(fee.amount, 3.45);
    }

    #[test]
    fn test_trade_without_shares_is_failure() {
        let broker = SelmaBroker::new();
        let doc = doc("2024-04-02,trade,1,IE00B4L5Y983,-1000.00,CHF,\n");
        let extraction = broker.process(&doc, &holdings()).unwrap();
        assert!(extraction.transactions.is_empty());
        assert_eq!(extraction.failures.len(), 1);
    }
}
