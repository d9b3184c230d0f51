use crate::datetime::parse_to_utc;
use crate::fields;
use crate::patterns::{BrokerProfile, CategoryRule, TypeRule};
use models::{HoldingMap, NormalizedTransaction, ParqetError, RawTransaction, TransactionKind};
use tracing::warn;

/// Parse a locale-formatted amount string into a signed decimal value.
///
/// Apostrophes and whitespace are always grouping noise and are stripped
/// first. With both `.` and `,` present, the rightmost kind must occur
/// exactly once (the decimal separator) and the other kind must group digits
/// in threes. A lone separator is always the decimal separator.
pub fn parse_amount(value: &str) -> Result<f64, ParqetError> {
    let compact: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\'' && *c != '\u{2019}')
        .collect();

    let (negative, body) = match compact.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, compact.strip_prefix('+').unwrap_or(&compact)),
    };

    if body.is_empty()
        || !body.chars().any(|c| c.is_ascii_digit())
        || !body.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',')
    {
        return Err(ParqetError::AmountValidation(value.to_string()));
    }

    let dots = body.matches('.').count();
    let commas = body.matches(',').count();

    let canonical = match (dots, commas) {
        (0, 0) | (1, 0) => body.to_string(),
        (0, 1) => body.replace(',', "."),
        (_, 0) => ungroup(body, '.').ok_or_else(|| ParqetError::AmountValidation(value.to_string()))?,
        (0, _) => ungroup(body, ',').ok_or_else(|| ParqetError::AmountValidation(value.to_string()))?,
        _ => {
            let (decimal, grouping, decimal_count) =
                if body.rfind('.') > body.rfind(',') {
                    ('.', ',', dots)
                } else {
                    (',', '.', commas)
                };
            if decimal_count != 1 {
                return Err(ParqetError::AmountValidation(value.to_string()));
            }
            let (int_part, frac_part) = match body.split_once(decimal) {
                Some(parts) => parts,
                None => return Err(ParqetError::AmountValidation(value.to_string())),
            };
            let int_part = ungroup(int_part, grouping)
                .ok_or_else(|| ParqetError::AmountValidation(value.to_string()))?;
            format!("{}.{}", int_part, frac_part)
        }
    };

    let parsed: f64 = canonical
        .parse()
        .map_err(|_| ParqetError::AmountValidation(value.to_string()))?;
    Ok(if negative { -parsed } else { parsed })
}

/// Validate `separator` as a thousands separator and strip it. The leading
/// group carries 1 to 3 digits, every following group exactly 3.
fn ungroup(text: &str, separator: char) -> Option<String> {
    let mut groups = text.split(separator);
    let first = groups.next()?;
    if first.is_empty() || first.len() > 3 {
        return None;
    }
    let mut out = first.to_string();
    for group in groups {
        if group.len() != 3 || !group.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        out.push_str(group);
    }
    Some(out)
}

/// Structural ISIN check: 2 letters, 9 alphanumerics, 1 check digit. Input
/// is uppercased and stripped of whitespace (some statements break the code
/// across a line); checksum verification is not performed.
pub fn validate_isin(value: &str) -> Result<String, ParqetError> {
    let isin: String = value
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();
    let chars: Vec<char> = isin.chars().collect();
    let ok = chars.len() == 12
        && chars[..2].iter().all(|c| c.is_ascii_uppercase())
        && chars[2..11]
            .iter()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        && chars[11].is_ascii_digit();
    if ok {
        Ok(isin)
    } else {
        Err(ParqetError::IsinValidation(value.to_string()))
    }
}

pub fn validate_currency(value: &str) -> Result<String, ParqetError> {
    let currency = value.trim().to_uppercase();
    if currency.len() == 3 && currency.chars().all(|c| c.is_ascii_uppercase()) {
        Ok(currency)
    } else {
        Err(ParqetError::Validation(format!(
            "invalid currency code '{}'",
            value
        )))
    }
}

/// Trade amounts rarely equal shares x price to the cent: the statement
/// amount may include the fee, and per-share prices are rounded. The slack
/// is the extracted fee plus a small rounding allowance.
fn trade_tolerance(amount: f64, fee: f64) -> f64 {
    fee + (0.001 * amount).max(0.05)
}

/// Convert one raw occurrence into a typed, validated transaction.
///
/// The portfolio number is resolved through the holding map; an unmapped
/// number logs a warning and leaves the holding empty instead of failing
/// the occurrence.
pub fn normalize(
    raw: &RawTransaction,
    rule: &CategoryRule,
    profile: &BrokerProfile,
    portfolio_number: &str,
    holdings: &HoldingMap,
) -> Result<NormalizedTransaction, ParqetError> {
    let kind = raw.kind;

    let date_str = raw
        .get(fields::DATE)
        .ok_or_else(|| ParqetError::Validation(format!("missing transaction date in {}", raw.source)))?;
    let datetime = parse_to_utc(date_str, kind)?;

    let fee = optional_amount(raw, fields::FEE)?;
    let tax = optional_amount(raw, fields::TAX)?;

    let signed_amount = match raw.get(fields::AMOUNT) {
        Some(value) => Some(parse_amount(value)?),
        None => None,
    };

    let amount = match kind {
        TransactionKind::Fee => {
            // The fee/tax composition already guaranteed at least one field
            // matched; here the values must actually be positive.
            let fee_part = fee.unwrap_or(0.0);
            let tax_part = tax.unwrap_or(0.0);
            if fee_part <= 0.0 && tax_part <= 0.0 {
                return Err(ParqetError::Validation(format!(
                    "fee transaction without a positive fee or tax in {}",
                    raw.source
                )));
            }
            // Sum at cent precision; raw f64 addition drifts.
            ((fee_part + tax_part) * 100.0).round() / 100.0
        }
        _ => signed_amount
            .ok_or_else(|| {
                ParqetError::Validation(format!("missing amount for {} in {}", kind, raw.source))
            })?
            .abs(),
    };

    let currency = validate_currency(
        raw.get(fields::CURRENCY).unwrap_or(profile.default_currency),
    )?;

    let txn_type = row_type(rule, raw, signed_amount.unwrap_or(amount));

    let mut txn = NormalizedTransaction::new(datetime, kind, txn_type, profile.name, currency, amount);
    txn.fee = fee.filter(|v| *v > 0.0);
    txn.tax = tax.filter(|v| *v > 0.0);
    txn.fxrate = optional_amount(raw, fields::FX_RATE)?;

    if let Some(isin) = raw.get(fields::ISIN) {
        txn.identifier = Some(validate_isin(isin)?);
    }

    match kind {
        TransactionKind::Trade => {
            if txn.identifier.is_none() {
                return Err(ParqetError::Validation(format!(
                    "trade without ISIN in {}",
                    raw.source
                )));
            }
            let shares = optional_amount(raw, fields::SHARES)?.ok_or_else(|| {
                ParqetError::Validation(format!("trade without shares in {}", raw.source))
            })?;
            if shares <= 0.0 {
                return Err(ParqetError::Validation(format!(
                    "non-positive share count in {}",
                    raw.source
                )));
            }
            let price = match optional_amount(raw, fields::PRICE)? {
                Some(price) => {
                    let implied = shares * price;
                    if (amount - implied).abs() > trade_tolerance(amount, txn.fee.unwrap_or(0.0)) {
                        return Err(ParqetError::Validation(format!(
                            "trade amount {} inconsistent with {} x {} in {}",
                            amount, shares, price, raw.source
                        )));
                    }
                    price
                }
                None => amount / shares,
            };
            txn.shares = Some(shares);
            txn.price = Some(price);
            txn.assettype = Some("Security".to_string());
        }
        TransactionKind::Dividend => {
            if txn.identifier.is_none() {
                return Err(ParqetError::Validation(format!(
                    "dividend without ISIN in {}",
                    raw.source
                )));
            }
            txn.shares = optional_amount(raw, fields::SHARES)?;
            txn.assettype = Some("Security".to_string());
        }
        TransactionKind::DepositWithdrawal
        | TransactionKind::Interest
        | TransactionKind::Fee => {
            txn.assettype = Some("Cash".to_string());
        }
    }

    match holdings.resolve(portfolio_number) {
        Some(holding) => txn.holding = holding.to_string(),
        None => {
            warn!(
                portfolio = portfolio_number,
                source = %raw.source,
                "portfolio number has no holding mapping"
            );
        }
    }

    Ok(txn)
}

fn optional_amount(raw: &RawTransaction, field: &str) -> Result<Option<f64>, ParqetError> {
    match raw.get(field) {
        Some(value) => Ok(Some(parse_amount(value)?.abs())),
        None => Ok(None),
    }
}

/// Derive the output row type string for one occurrence.
fn row_type(rule: &CategoryRule, raw: &RawTransaction, signed_amount: f64) -> String {
    match &rule.type_rule {
        TypeRule::Fixed(value) => (*value).to_string(),
        TypeRule::MatchEquals {
            value,
            then,
            otherwise,
        } => {
            let matched = raw
                .get(fields::MATCH)
                .map(|m| m.eq_ignore_ascii_case(value))
                .unwrap_or(false);
            if matched { then } else { otherwise }.to_string()
        }
        TypeRule::AmountSign { positive, negative } => {
            if signed_amount >= 0.0 { positive } else { negative }.to_string()
        }
    }
}
