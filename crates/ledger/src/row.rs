use chrono::{DateTime, Utc};
use chrono_tz::Europe::Zurich;
use models::NormalizedTransaction;
use std::collections::BTreeMap;

/// One ledger row, keyed by column name. `BTreeMap` iteration order is the
/// output column order after the id column.
pub type Row = BTreeMap<String, String>;

pub const ID_COLUMN: &str = "transaction_id";

/// Every non-id column of the output schema, in output (ascending) order.
/// Columns the pipeline never fills are still emitted, empty.
pub const COLUMNS: [&str; 22] = [
    "amount",
    "assettype",
    "avgholdingperiod",
    "broker",
    "currency",
    "date",
    "datetime",
    "exchange",
    "fee",
    "fxrate",
    "holding",
    "holdingname",
    "holdingnickname",
    "identifier",
    "originalcurrency",
    "price",
    "realizedgains",
    "shares",
    "tax",
    "time",
    "type",
    "wkn",
];

/// Render a decimal the way the tracker expects: comma as the decimal
/// separator, no grouping, trailing zeros trimmed.
pub fn render_number(value: f64) -> String {
    let mut s = format!("{:.8}", value);
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    s.replace('.', ",")
}

fn render_optional(value: Option<f64>) -> String {
    value.map(render_number).unwrap_or_default()
}

/// UTC instant with millisecond precision and trailing `Z`.
pub fn render_datetime(datetime: DateTime<Utc>) -> String {
    datetime.format("%Y-%m-%dT%H:%M:%S.000Z").to_string()
}

/// Render one transaction into the full column set. The `date` and `time`
/// columns are the instant localized to Europe/Zurich; `datetime` stays UTC.
pub fn render_row(txn: &NormalizedTransaction) -> Row {
    let local = txn.datetime.with_timezone(&Zurich);

    let mut row = Row::new();
    for column in COLUMNS {
        row.insert(column.to_string(), String::new());
    }

    row.insert("amount".to_string(), render_number(txn.amount));
    row.insert(
        "assettype".to_string(),
        txn.assettype.clone().unwrap_or_default(),
    );
    row.insert("broker".to_string(), txn.broker.clone());
    row.insert("currency".to_string(), txn.currency.clone());
    row.insert("date".to_string(), local.format("%d.%m.%Y").to_string());
    row.insert("datetime".to_string(), render_datetime(txn.datetime));
    row.insert("fee".to_string(), render_optional(txn.fee));
    row.insert("fxrate".to_string(), render_optional(txn.fxrate));
    row.insert("holding".to_string(), txn.holding.clone());
    row.insert(
        "identifier".to_string(),
        txn.identifier.clone().unwrap_or_default(),
    );
    row.insert(
        "originalcurrency".to_string(),
        txn.originalcurrency.clone().unwrap_or_default(),
    );
    row.insert("price".to_string(), render_optional(txn.price));
    row.insert("shares".to_string(), render_optional(txn.shares));
    row.insert("tax".to_string(), render_optional(txn.tax));
    row.insert("time".to_string(), local.format("%H:%M:%S").to_string());
    row.insert("type".to_string(), txn.txn_type.clone());

    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use models::TransactionKind;

    fn fixture() -> NormalizedTransaction {
        let datetime = Utc.with_ymd_and_hms(2024, 3, 15, 6, 30, 0).unwrap();
        let mut txn = NormalizedTransaction::new(
            datetime,
            TransactionKind::Trade,
            "buy",
            "Kasparund AG",
            "CHF",
            1000.5,
        );
        txn.shares = Some(10.0);
        txn.price = Some(100.05);
        txn.identifier = Some("IE00B4L5Y983".to_string());
        txn.holding = "hld_1".to_string();
        txn
    }

    #[test]
    fn test_number_rendering_trims_and_uses_comma() {
        assert_eq!(render_number(1000.5), "1000,5");
        assert_eq!(render_number(250.0), "250");
        assert_eq!(render_number(0.33333333), "0,33333333");
    }

    #[test]
    fn test_datetime_utc_date_time_localized() {
        let row = render_row(&fixture());
        assert_eq!(row["datetime"], "2024-03-15T06:30:00.000Z");
        // 06:30 UTC in March is 07:30 in Zurich (CET).
        assert_eq!(row["date"], "15.03.2024");
        assert_eq!(row["time"], "07:30:00");
    }

    #[test]
    fn test_unfilled_columns_present_and_empty() {
        let row = render_row(&fixture());
        assert_eq!(row.len(), COLUMNS.len());
        assert_eq!(row["wkn"], "");
        assert_eq!(row["realizedgains"], "");
        assert_eq!(row["exchange"], "");
    }
}
