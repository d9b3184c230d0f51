use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The five ledger categories. Every extracted transaction belongs to exactly
/// one, and each category accumulates into its own output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    Trade,
    DepositWithdrawal,
    Dividend,
    Interest,
    Fee,
}

impl TransactionKind {
    pub const ALL: [TransactionKind; 5] = [
        TransactionKind::Trade,
        TransactionKind::DepositWithdrawal,
        TransactionKind::Dividend,
        TransactionKind::Interest,
        TransactionKind::Fee,
    ];

    /// Category name, also used as the ledger file stem.
    pub fn category(&self) -> &'static str {
        match self {
            TransactionKind::Trade => "trades",
            TransactionKind::DepositWithdrawal => "deposits_withdrawals",
            TransactionKind::Dividend => "dividends",
            TransactionKind::Interest => "interest",
            TransactionKind::Fee => "fees",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.category())
    }
}

/// Raw field strings matched out of one document occurrence, before any
/// normalization. The anchor capture is stored under the `match` field.
#[derive(Debug, Clone)]
pub struct RawTransaction {
    pub kind: TransactionKind,
    pub source: String,
    pub fields: HashMap<&'static str, String>,
}

impl RawTransaction {
    pub fn new(kind: TransactionKind, source: impl Into<String>) -> Self {
        Self {
            kind,
            source: source.into(),
            fields: HashMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|s| s.as_str())
    }

    pub fn set(&mut self, name: &'static str, value: impl Into<String>) {
        self.fields.insert(name, value.into());
    }
}

/// Typed, validated transaction record. Amounts are positive; direction is
/// encoded in `txn_type` (buy/sell, TransferIn/TransferOut, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTransaction {
    pub datetime: DateTime<Utc>,
    pub kind: TransactionKind,
    pub txn_type: String,
    pub broker: String,
    /// Holding id on the tracker side; empty when the portfolio number has
    /// no mapping.
    pub holding: String,
    pub currency: String,
    pub amount: f64,
    pub shares: Option<f64>,
    pub price: Option<f64>,
    pub fee: Option<f64>,
    pub tax: Option<f64>,
    /// ISIN (or an equivalent asset code for non-securities, e.g. BTC).
    pub identifier: Option<String>,
    pub assettype: Option<String>,
    pub originalcurrency: Option<String>,
    pub fxrate: Option<f64>,
}

impl NormalizedTransaction {
    pub fn new(
        datetime: DateTime<Utc>,
        kind: TransactionKind,
        txn_type: impl Into<String>,
        broker: impl Into<String>,
        currency: impl Into<String>,
        amount: f64,
    ) -> Self {
        Self {
            datetime,
            kind,
            txn_type: txn_type.into(),
            broker: broker.into(),
            holding: String::new(),
            currency: currency.into(),
            amount,
            shares: None,
            price: None,
            fee: None,
            tax: None,
            identifier: None,
            assettype: None,
            originalcurrency: None,
            fxrate: None,
        }
    }
}
