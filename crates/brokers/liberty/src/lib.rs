//! Liberty Vorsorge AG statement profile. The PDF text layer hyphenates
//! mid-word (`Gu tschriftsanzeige`, `Total K ursw ert`), so the patterns
//! tolerate stray whitespace inside keywords.

use engine::fields;
use engine::{pattern, BrokerProfile, CategoryRule, FieldRule, PatternBroker, TypeRule};
use models::{ParqetError, TransactionKind};

pub const BROKER_NAME: &str = "Liberty Vorsorge AG";

pub fn broker() -> Result<PatternBroker, ParqetError> {
    Ok(PatternBroker::new(profile()?))
}

pub fn profile() -> Result<BrokerProfile, ParqetError> {
    BrokerProfile::new(
        BROKER_NAME,
        // The foundation prints three name variants; all contain this stem.
        &["Liberty"],
        r"Portfolio\s*(?:Nr\.)?\s*([\d.-]+)",
        "CHF",
        vec![trades()?, deposits()?, interest()?, dividends()?, fees()?],
    )
}

fn trades() -> Result<CategoryRule, ParqetError> {
    CategoryRule::new(
        TransactionKind::Trade,
        r"(Börsenabrechnu\s*ng)",
        TypeRule::Fixed("buy"),
        vec![
            FieldRule::required(
                fields::AMOUNT,
                vec![pattern(1, r"Total K\s*ursw\s*ert\s*[A-Z ]*\s*([\-\d'.,]+)")?],
            )?,
            FieldRule::optional(
                fields::CURRENCY,
                vec![pattern(1, r"Total K\s*ursw\s*ert\s*([A-Z]{3})")?],
            )?,
            FieldRule::required(
                fields::SHARES,
                vec![pattern(
                    1,
                    r"(\d+\.\d+) (?:Namen-Aktie|Na\.\s*u\.\s*Inh|Inhaber-Aktie|Anrecht|Anteile)",
                )?],
            )?,
            FieldRule::optional(
                fields::PRICE,
                vec![pattern(1, r"(\d+\.\d+)\s*(?:\r?\n)?\s*Total")?],
            )?,
            FieldRule::optional(
                fields::FX_RATE,
                vec![pattern(1, r"Change (?:[A-Z\s]+/[A-Z]+)\s*([\d.]+)")?],
            )?,
            FieldRule::required(
                fields::DATE,
                vec![pattern(1, r"V\s*aluta\s*(\d{2}\.\d{2}\.\d{4})")?],
            )?,
            FieldRule::required(fields::ISIN, vec![pattern(1, r"ISIN:\s*([A-Z0-9 ]+)")?])?,
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
            FieldRule::optional(
                fields::CURRENCY,
                vec![pattern(
                    1,
                    r"(?:gutgeschrieben|belastet|has been credited):\s*(CHF)",
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
        r"(Verwaltungsgebühr|Rückerstattung Produktkosten|Produktkosten|Gebühr für Portfolio|Stiftungsgebühr|Beratergebühr)",
        TypeRule::Fixed("cost"),
        vec![
            FieldRule::optional(
                fields::FEE,
                vec![pattern(1, r"Total.*?CHF\s*([\d'.,-]+)")?],
            )?,
            FieldRule::optional(
                fields::CURRENCY,
                vec![pattern(1, r"Total.*?(CHF)")?],
            )?,
            FieldRule::required(
                fields::DATE,
                vec![pattern(1, r"V\s*aluta\s*(\d{2}\.\d{2}\.\d{4})")?],
            )?,
        ],
    )?
    .with_one_of(&[fields::FEE, fields::TAX]))
}
