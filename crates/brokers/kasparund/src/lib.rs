//! Kasparund AG statement profile. Statements are German-language PDFs from
//! St.Gallen; one page carries one transaction advice.

use engine::fields;
use engine::{pattern, BrokerProfile, CategoryRule, FieldRule, PatternBroker, TypeRule};
use models::{ParqetError, TransactionKind};

pub const BROKER_NAME: &str = "Kasparund AG";

pub fn broker() -> Result<PatternBroker, ParqetError> {
    Ok(PatternBroker::new(profile()?))
}

pub fn profile() -> Result<BrokerProfile, ParqetError> {
    BrokerProfile::new(
        BROKER_NAME,
        &["Kasparund AG", "St.Gallen"],
        r"(CH\d{2}\s\d{4}\s\d{4}\s\d{4}\s\d{4}\s\d)",
        "CHF",
        vec![trades()?, deposits_withdrawals()?, interest()?, dividends()?, fees()?],
    )
}

fn trades() -> Result<CategoryRule, ParqetError> {
    CategoryRule::new(
        TransactionKind::Trade,
        r"Typ:\s*(Kauf|Verkauf)",
        TypeRule::MatchEquals {
            value: "Verkauf",
            then: "sell",
            otherwise: "buy",
        },
        vec![
            FieldRule::required(
                fields::AMOUNT,
                vec![pattern(1, r"Verrechneter Betrag:\s*[A-Z]{3}\s*([\d'.,-]+)")?],
            )?,
            FieldRule::optional(
                fields::CURRENCY,
                vec![pattern(1, r"Verrechneter Betrag:\s*([A-Z]{3})")?],
            )?,
            FieldRule::required(fields::SHARES, vec![pattern(1, r"Anzahl:\s*(-?[\d.,]+)")?])?,
            FieldRule::optional(
                fields::PRICE,
                vec![pattern(1, r"Kurs:\s*(?:[A-Z]{3}\s)?([\d'.,]+)")?],
            )?,
            FieldRule::optional(
                fields::FX_RATE,
                vec![pattern(1, r"Umrechnungskurs\s*[A-Z]{3}/[A-Z]{3}\s*([\d'.,]+)")?],
            )?,
            FieldRule::required(
                fields::DATE,
                vec![pattern(1, r"Valuta:\s*(\d{2}\.\d{2}\.\d{4})")?],
            )?,
            FieldRule::required(fields::ISIN, vec![pattern(1, r"ISIN:\s*([A-Z0-9]+)")?])?,
        ],
    )
}

fn deposits_withdrawals() -> Result<CategoryRule, ParqetError> {
    CategoryRule::new(
        TransactionKind::DepositWithdrawal,
        r"Typ:\s*(Kontoübertrag|Wechselgeld|Übertrag von Anlagen)",
        TypeRule::Fixed("TransferIn"),
        vec![
            FieldRule::required(
                fields::AMOUNT,
                vec![pattern(1, r"Verrechneter Betrag:\s*CHF\s*([\d'.,]+)")?],
            )?,
            FieldRule::optional(
                fields::CURRENCY,
                vec![pattern(1, r"Verrechneter Betrag:\s*([A-Z]{3})")?],
            )?,
            FieldRule::required(
                fields::DATE,
                vec![pattern(1, r"Valuta:\s*(\d{2}\.\d{2}\.\d{4})")?],
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
            FieldRule::optional(
                fields::CURRENCY,
                vec![pattern(1, r"Zinsgutschrift:\s*([A-Z]{3})")?],
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
            FieldRule::optional(
                fields::CURRENCY,
                vec![pattern(
                    1,
                    r"Gutgeschriebener Betrag:\s*Valuta\s*\d{2}\.\d{2}\.\d{4}\s*([A-Z]{3})",
                )?],
            )?,
            FieldRule::optional(fields::SHARES, vec![pattern(1, r"Anzahl:\s*(-?[\d.,]+)")?])?,
            FieldRule::required(
                fields::DATE,
                vec![
                    pattern(1, r"Valuta:\s*(\d{2}\.\d{2}\.\d{4})")?,
                    // Dividend advices sometimes omit the colon.
                    pattern(2, r"Valuta\s*(\d{2}\.\d{2}\.\d{4})")?,
                ],
            )?,
            FieldRule::required(fields::ISIN, vec![pattern(1, r"ISIN:\s*([A-Z0-9]+)")?])?,
        ],
    )
}

/// Fee advices vary the most across statement versions. The strict
/// Depotführungsgebühren line comes first; the looser fallbacks pick up
/// amounts near fee wording or a trailing line amount like `-14.35 *`.
fn fees() -> Result<CategoryRule, ParqetError> {
    Ok(CategoryRule::new(
        TransactionKind::Fee,
        r"(Verwaltungsgebühr|Depotgebühr|Transaktionsgebühr|Kommission|gebühr|Depotführungsgebühr)",
        TypeRule::Fixed("cost"),
        vec![
            FieldRule::optional(
                fields::FEE,
                vec![
                    pattern(1, r"Depotführungsgebühren:\s*CHF\s*(-?[\d'.,]+)")?,
                    // Fee wording and amount share a line; crossing lines
                    // would pick up the Mehrwertsteuer amount.
                    pattern(2, r"(?:gebühr|verwaltung|depot)[^:\n]*:\s*CHF\s*(-?[\d'.,]+)")?,
                    pattern(3, r"CHF\s*(-?[\d'.,]+).*?(?:gebühr|verwaltung|depot)")?,
                    pattern(4, r"(?m)(-?[\d'.,]+)\s*\*\s*$")?,
                ],
            )?,
            FieldRule::optional(
                fields::TAX,
                vec![
                    pattern(1, r"Mehrwertsteuer:\s*CHF\s*(-?[\d'.,]+)")?,
                    pattern(2, r"MwSt[^:]*:\s*CHF\s*(-?[\d'.,]+)")?,
                    pattern(3, r"VAT[^:]*:\s*CHF\s*(-?[\d'.,]+)")?,
                ],
            )?,
            FieldRule::optional(
                fields::CURRENCY,
                vec![pattern(1, r"Depotführungsgebühren:\s*(CHF)")?],
            )?,
            FieldRule::required(
                fields::DATE,
                vec![
                    pattern(1, r"Valuta:\s*(\d{2}\.\d{2}\.\d{4})")?,
                    pattern(2, r"Am\s*(\d{2}\.\d{2}\.\d{4})\s*haben wir")?,
                ],
            )?,
        ],
    )?
    .with_one_of(&[fields::FEE, fields::TAX]))
}
