use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use models::{ParqetError, TransactionKind};

/// A parsed statement timestamp. Most statements carry only a value date;
/// some (Saxo trade confirmations) carry a full execution time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatementStamp {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

const DATE_FORMATS: [&str; 4] = ["%d.%m.%Y", "%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y"];

/// Parse the date formats seen across the supported brokers. Timestamps with
/// German month abbreviations are normalized to English before parsing.
pub fn parse_statement_stamp(value: &str) -> Result<StatementStamp, ParqetError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ParqetError::Validation("empty date value".to_string()));
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Ok(StatementStamp::Date(date));
        }
    }

    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
        return Ok(StatementStamp::DateTime(dt));
    }

    // Saxo trade timestamps: "17-Dez-2024 10:31:11" with possible German
    // month names and stray whitespace between date and time.
    let compact: String = trimmed
        .replace("Dez", "Dec")
        .replace("Mär", "Mar")
        .replace("Mrz", "Mar")
        .replace("Okt", "Oct")
        .replace("Mai", "May")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if let Ok(dt) = NaiveDateTime::parse_from_str(&compact, "%d-%b-%Y%H:%M:%S") {
        return Ok(StatementStamp::DateTime(dt));
    }

    Err(ParqetError::Validation(format!(
        "unsupported date format '{}'",
        trimmed
    )))
}

/// Fixed UTC wall time attached to date-only statements, so that the five
/// categories of one day sort in a stable order.
pub fn category_time(kind: TransactionKind) -> NaiveTime {
    let (h, m) = match kind {
        TransactionKind::Trade => (6, 30),
        TransactionKind::Interest => (7, 30),
        TransactionKind::DepositWithdrawal => (8, 30),
        TransactionKind::Dividend => (9, 0),
        TransactionKind::Fee => (10, 0),
    };
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or_default()
}

/// Promote a statement stamp to a UTC instant. Full timestamps are kept;
/// date-only values get the category wall time.
pub fn to_utc(stamp: StatementStamp, kind: TransactionKind) -> DateTime<Utc> {
    match stamp {
        StatementStamp::Date(date) => Utc.from_utc_datetime(&date.and_time(category_time(kind))),
        StatementStamp::DateTime(dt) => Utc.from_utc_datetime(&dt),
    }
}

pub fn parse_to_utc(value: &str, kind: TransactionKind) -> Result<DateTime<Utc>, ParqetError> {
    Ok(to_utc(parse_statement_stamp(value)?, kind))
}
