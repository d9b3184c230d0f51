//! Terzo Vorsorgestiftung (pillar 3a) statement profile.

use engine::fields;
use engine::{pattern, BrokerProfile, CategoryRule, FieldRule, PatternBroker, TypeRule};
use models::{ParqetError, TransactionKind};

pub const BROKER_NAME: &str = "Terzo Vorsorgestiftung";

pub fn broker() -> Result<PatternBroker, ParqetError> {
    Ok(PatternBroker::new(profile()?))
}

pub fn profile() -> Result<BrokerProfile, ParqetError> {
    BrokerProfile::new(
        BROKER_NAME,
        &["Terzo Vorsorgestiftung"],
        r"Portfolio\s*(?:Nr\.)?\s*([\d.-]+)",
        "CHF",
        vec![trades()?, deposits()?, interest()?, dividends()?, fees()?],
    )
}

fn trades() -> Result<CategoryRule, ParqetError> {
    CategoryRule::new(
        TransactionKind::Trade,
        r"Order:\s*(Kauf|Verkauf)",
        TypeRule::MatchEquals {
            value: "Kauf",
            then: "buy",
            otherwise: "sell",
        },
        vec![
            FieldRule::required(
                fields::AMOUNT,
                vec![pattern(1, r"Betrag\s*[A-Z]{3}\s*([\d'.,-]+)")?],
            )?,
            FieldRule::required(
                fields::SHARES,
                vec![pattern(1, r"(\d+[.\d]*)\s*(?:Ant|Anteile)\s+[A-Za-z0-9\s]*")?],
            )?,
            FieldRule::optional(
                fields::PRICE,
                vec![pattern(1, r"Kurs:\s*(?:[A-Z]{3}\s)?([\d'.,-]+)")?],
            )?,
            FieldRule::optional(fields::CURRENCY, vec![pattern(1, r"Betrag\s*([A-Z]{3})")?])?,
            FieldRule::optional(
                fields::FX_RATE,
                vec![pattern(1, r"Umrechnungskurs\s*[A-Z]{3}/[A-Z]{3}\s*([\d'.,]+)")?],
            )?,
            FieldRule::required(
                fields::DATE,
                vec![pattern(1, r"Valuta\s*(\d{2}\.\d{2}\.\d{4})")?],
            )?,
            FieldRule::required(fields::ISIN, vec![pattern(1, r"ISIN:\s*([A-Z0-9]+)")?])?,
        ],
    )
}

fn deposits() -> Result<CategoryRule, ParqetError> {
    CategoryRule::new(
        TransactionKind::DepositWithdrawal,
        r"(Zahlungseingang)",
        TypeRule::Fixed("TransferIn"),
        vec![
            FieldRule::required(
                fields::AMOUNT,
                vec![pattern(1, r"Betrag\s*CHF\s*([\d'.,-]+)")?],
            )?,
            FieldRule::optional(fields::CURRENCY, vec![pattern(1, r"Betrag\s*([A-Z]{3})")?])?,
            FieldRule::required(
                fields::DATE,
                vec![pattern(1, r"Valuta\s*(\d{2}\.\d{2}\.\d{4})")?],
            )?,
        ],
    )
}

fn interest() -> Result<CategoryRule, ParqetError> {
    CategoryRule::new(
        TransactionKind::Interest,
        r"(Zins)",
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
            FieldRule::optional(
                fields::CURRENCY,
                vec![pattern(
                    1,
                    r"Gutgeschriebener Betrag:\s*Valuta\s*\d{2}\.\d{2}\.\d{4}\s*([A-Z]{3})",
                )?],
            )?,
            FieldRule::required(
                fields::DATE,
                vec![pattern(1, r"Valuta\s*(\d{2}\.\d{2}\.\d{4})")?],
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
            FieldRule::optional(
                fields::CURRENCY,
                vec![pattern(
                    1,
                    r"Verrechneter\s+Betrag:\s+Valuta\s+\d{2}\.\d{2}\.\d{4}\s+(CHF)",
                )?],
            )?,
            FieldRule::required(
                fields::DATE,
                vec![
                    pattern(1, r"Am\s*(\d{2}\.\d{2}\.\d{4})\s*haben wir")?,
                    pattern(2, r"Valuta\s*(\d{2}\.\d{2}\.\d{4})")?,
                ],
            )?,
        ],
    )?
    .with_one_of(&[fields::FEE, fields::TAX]))
}
