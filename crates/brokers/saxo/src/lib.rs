//! Saxo Bank CH statement profile. Trade confirmations carry a real
//! execution time (`Trade-Zeit`), so trades keep their timestamp instead of
//! the category wall time.

use engine::fields;
use engine::{pattern, BrokerProfile, CategoryRule, FieldRule, PatternBroker, TypeRule};
use models::{ParqetError, TransactionKind};

pub const BROKER_NAME: &str = "Saxo Bank CH";

pub fn broker() -> Result<PatternBroker, ParqetError> {
    Ok(PatternBroker::new(profile()?))
}

pub fn profile() -> Result<BrokerProfile, ParqetError> {
    BrokerProfile::new(
        BROKER_NAME,
        &["SaxoBankCH"],
        r"Kunden-ID:\s*([\d.-]+)",
        "CHF",
        vec![trades()?, deposits()?, interest()?, dividends()?, fees()?],
    )
}

fn trades() -> Result<CategoryRule, ParqetError> {
    CategoryRule::new(
        TransactionKind::Trade,
        r"(Trade-ID)",
        // Trade-Wert is the cash side and prints negative on buys; the
        // confirmations only cover purchases, so the type is fixed.
        TypeRule::Fixed("buy"),
        vec![
            FieldRule::required(
                fields::AMOUNT,
                vec![pattern(1, r"Trade-Wert\s*([\-\d,.]+)")?],
            )?,
            FieldRule::optional(fields::CURRENCY, vec![pattern(1, r"hrung:\s*([A-Z]+)")?])?,
            FieldRule::required(fields::SHARES, vec![pattern(1, r"Menge\s*(\d+)")?])?,
            FieldRule::optional(fields::PRICE, vec![pattern(1, r"Preis\s*([\d,.]+)")?])?,
            FieldRule::optional(
                fields::FX_RATE,
                vec![pattern(1, r"Umrechnungskurs\s*([\d,.]+)")?],
            )?,
            FieldRule::required(
                fields::DATE,
                vec![pattern(
                    1,
                    // \p{L} so that German month abbreviations (Mär) match.
                    r"Trade-Zeit\s*(\d{2}-\p{L}{3}-\d{4}\s*\d{2}:\d{2}:\d{2})",
                )?],
            )?,
            FieldRule::required(fields::ISIN, vec![pattern(1, r"ISIN:\s*([A-Z0-9]+)")?])?,
        ],
    )
}

fn deposits() -> Result<CategoryRule, ParqetError> {
    CategoryRule::new(
        TransactionKind::DepositWithdrawal,
        r"(Gu\s*tschriftsanzeige|Belastu\s*ngsanzeige|Credit Advice)",
        TypeRule::Fixed("TransferIn"),
        vec![
            FieldRule::required(
                fields::AMOUNT,
                vec![pattern(
                    1,
                    r"(?:gutgeschrieben|belastet|has been credited):\s*CHF\s*([\d'.,]+)",
                )?],
            )?,
            FieldRule::required(
                fields::DATE,
                vec![pattern(1, r"V\s*(?:aluta|alue date)\s+(\d{2}\.\d{2}\.\d{4})")?],
            )?,
        ],
    )
}

fn interest() -> Result<CategoryRule, ParqetError> {
    CategoryRule::new(
        TransactionKind::Interest,
        r"Am\s*(\d{2}\.\d{2}\.\d{4})\s*haben wir Ihrem Konto gutgeschrieben",
        TypeRule::Fixed("Interest"),
        vec![
            FieldRule::required(
                fields::AMOUNT,
                vec![pattern(1, r"Zinsgutschrift:\s*CHF\s*([\d'.,-]+)")?],
            )?,
            FieldRule::required(
                fields::DATE,
                vec![pattern(1, r"Am\s*(\d{2}\.\d{2}\.\d{4})\s*haben wir")?],
            )?,
        ],
    )
}

fn dividends() -> Result<CategoryRule, ParqetError> {
    CategoryRule::new(
        TransactionKind::Dividend,
        r"(Dividendenausschüttung|Rückerstattung Quellensteuer)",
        TypeRule::Fixed("Dividend"),
        vec![
            FieldRule::required(
                fields::AMOUNT,
                vec![pattern(
                    1,
                    r"Gutgeschriebener Betrag:\s*Valuta\s*\d{2}\.\d{2}\.\d{4}\s*CHF\s*([\d'.,-]+)",
                )?],
            )?,
            FieldRule::optional(fields::SHARES, vec![pattern(1, r"Anzahl:\s*(-?[\d.,]+)")?])?,
            FieldRule::required(
                fields::DATE,
                vec![pattern(1, r"Valuta:?\s*(\d{2}\.\d{2}\.\d{4})")?],
            )?,
            FieldRule::required(fields::ISIN, vec![pattern(1, r"ISIN:\s*([A-Z0-9]+)")?])?,
        ],
    )
}

fn fees() -> Result<CategoryRule, ParqetError> {
    Ok(CategoryRule::new(
        TransactionKind::Fee,
        r"(Verwaltungsgebühr)",
        TypeRule::Fixed("cost"),
        vec![
            FieldRule::optional(
                fields::FEE,
                vec![pattern(
                    1,
                    r"Verrechneter\s+Betrag:\s+Valuta\s+\d{2}\.\d{2}\.\d{4}\s+CHF\s+([\d'.,-]+)",
                )?],
            )?,
            FieldRule::required(
                fields::DATE,
                vec![pattern(1, r"Am\s*(\d{2}\.\d{2}\.\d{4})\s*haben wir")?],
            )?,
        ],
    )?
    .with_one_of(&[fields::FEE, fields::TAX]))
}
