use crate::extract::extract_category;
use crate::normalize::normalize;
use crate::patterns::BrokerProfile;
use models::{Document, HoldingMap, NormalizedTransaction, ParqetError};
use tracing::{debug, warn};

/// Result of processing one document: the transactions that made it through
/// extraction and normalization, plus the per-occurrence failures that did
/// not. A failed occurrence never aborts the document.
#[derive(Debug, Default)]
pub struct Extraction {
    pub transactions: Vec<NormalizedTransaction>,
    pub failures: Vec<ParqetError>,
}

/// One supported statement format. PDF brokers are driven by a
/// `BrokerProfile` pattern library; CSV brokers implement the trait
/// directly over their export schema.
pub trait Broker: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this broker produced the document. Detection rules are
    /// mutually exclusive by construction.
    fn detect(&self, document: &Document) -> bool;

    fn process(
        &self,
        document: &Document,
        holdings: &HoldingMap,
    ) -> Result<Extraction, ParqetError>;
}

/// Pick the broker that claims this document. Registration order decides
/// ties, but a tie is a configuration defect and is logged.
pub fn detect_broker<'a>(
    brokers: &'a [Box<dyn Broker>],
    document: &Document,
) -> Result<&'a dyn Broker, ParqetError> {
    let mut matches = brokers.iter().filter(|b| b.detect(document));

    let Some(first) = matches.next() else {
        return Err(ParqetError::BrokerDetection(
            document.filename().to_string(),
        ));
    };
    for extra in matches {
        warn!(
            document = document.filename(),
            first = first.name(),
            also = extra.name(),
            "multiple brokers claim the same document, keeping the first"
        );
    }
    Ok(first.as_ref())
}

/// Header-based detection shared by the CSV brokers: every expected header
/// must appear in the file's header line.
pub fn csv_header_matches(document: &Document, expected: &[&str]) -> bool {
    let Some(header) = document.csv_header() else {
        return false;
    };
    let names: Vec<&str> = header
        .split(',')
        .map(|h| h.trim().trim_matches('"'))
        .collect();
    expected.iter().all(|e| names.contains(e))
}

/// Generic PDF-statement broker driven by a static pattern library. All of
/// the profile's identifiers must appear somewhere in the page text.
pub struct PatternBroker {
    profile: BrokerProfile,
}

impl PatternBroker {
    pub fn new(profile: BrokerProfile) -> Self {
        Self { profile }
    }

    fn portfolio_number(&self, pages: &[String]) -> String {
        for page in pages {
            if let Some(caps) = self.profile.portfolio_number.captures(page) {
                if let Some(m) = caps.get(1) {
                    return m.as_str().trim().to_string();
                }
            }
        }
        "unknown".to_string()
    }
}

impl Broker for PatternBroker {
    fn name(&self) -> &str {
        self.profile.name
    }

    fn detect(&self, document: &Document) -> bool {
        let Some(pages) = document.pages() else {
            return false;
        };
        self.profile
            .identifiers
            .iter()
            .all(|id| pages.iter().any(|p| p.contains(id)))
    }

    fn process(
        &self,
        document: &Document,
        holdings: &HoldingMap,
    ) -> Result<Extraction, ParqetError> {
        let pages = document
            .pages()
            .ok_or_else(|| ParqetError::PdfParsing(document.filename().to_string()))?;

        let portfolio = self.portfolio_number(pages);
        let mut extraction = Extraction::default();

        for rule in &self.profile.categories {
            for result in extract_category(pages, rule, document.filename()) {
                let outcome = result.and_then(|raw| {
                    normalize(&raw, rule, &self.profile, &portfolio, holdings)
                });
                match outcome {
                    Ok(txn) => {
                        debug!(
                            broker = self.profile.name,
                            kind = %txn.kind,
                            "occurrence normalized"
                        );
                        extraction.transactions.push(txn);
                    }
                    Err(err) => extraction.failures.push(err),
                }
            }
        }

        Ok(extraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields;
    use crate::patterns::{pattern, CategoryRule, FieldRule, TypeRule};
    use models::TransactionKind;

    fn interest_profile(name: &'static str, identifier: &'static str) -> BrokerProfile {
        let rule = CategoryRule::new(
            TransactionKind::Interest,
            r"Zinsgutschrift",
            TypeRule::Fixed("Interest"),
            vec![
                FieldRule::required(
                    fields::AMOUNT,
                    vec![pattern(1, r"Zins:\s*CHF\s*([\d.']+)").unwrap()],
                )
                .unwrap(),
                FieldRule::required(
                    fields::DATE,
                    vec![pattern(1, r"per\s*(\d{2}\.\d{2}\.\d{4})").unwrap()],
                )
                .unwrap(),
            ],
        )
        .unwrap();
        BrokerProfile::new(name, &[identifier], r"Konto\s*(CH[\d]+)", "CHF", vec![rule]).unwrap()
    }

    fn brokers() -> Vec<Box<dyn Broker>> {
        vec![
            Box::new(PatternBroker::new(interest_profile("Alpha Bank", "Alpha Bank AG"))),
            Box::new(PatternBroker::new(interest_profile("Beta Bank", "Beta Bank AG"))),
        ]
    }

    #[test]
    fn test_detection_first_positive_match() {
        let doc = Document::pdf("stmt.pdf", "Beta Bank AG\nZinsgutschrift");
        let brokers = brokers();
        let broker = detect_broker(&brokers, &doc).unwrap();
        assert_eq!(broker.name(), "Beta Bank");
    }

    #[test]
    fn test_detection_requires_all_identifiers() {
        let profile = BrokerProfile::new(
            "Alpha Bank",
            &["Alpha Bank AG", "St.Gallen"],
            r"Konto\s*(CH[\d]+)",
            "CHF",
            vec![],
        )
        .unwrap();
        let broker = PatternBroker::new(profile);
        assert!(!broker.detect(&Document::pdf("a.pdf", "Alpha Bank AG only")));
        assert!(broker.detect(&Document::pdf("a.pdf", "Alpha Bank AG\u{c}St.Gallen")));
    }

    #[test]
    fn test_no_match_is_detection_error() {
        let doc = Document::pdf("stmt.pdf", "Gamma Bank AG");
        assert!(matches!(
            detect_broker(&brokers(), &doc),
            Err(ParqetError::BrokerDetection(_))
        ));
    }

    #[test]
    fn test_process_extracts_and_normalizes() {
        let doc = Document::pdf(
            "stmt.pdf",
            "Alpha Bank AG Konto CH9300762011623852957\nZinsgutschrift per 31.12.2024\nZins: CHF 12.50",
        );
        let brokers = brokers();
        let broker = detect_broker(&brokers, &doc).unwrap();
        let extraction = broker.process(&doc, &HoldingMap::default()).unwrap();
        assert_eq!(extraction.transactions.len(), 1);
        assert!(extraction.failures.is_empty());

        let txn = &extraction.transactions[0];
        assert_eq!(txn.amount, 12.50);
        assert_eq!(txn.txn_type, "Interest");
        assert_eq!(txn.broker, "Alpha Bank");
        assert_eq!(txn.datetime.to_rfc3339(), "2024-12-31T07:30:00+00:00");
    }

    #[test]
    fn test_failed_occurrence_recorded_not_fatal() {
        let doc = Document::pdf(
            "stmt.pdf",
            "Alpha Bank AG\nZinsgutschrift ohne Betrag\u{c}Alpha Bank AG\nZinsgutschrift per 31.12.2024\nZins: CHF 3.20",
        );
        let broker = PatternBroker::new(interest_profile("Alpha Bank", "Alpha Bank AG"));
        let extraction = broker.process(&doc, &HoldingMap::default()).unwrap();
        assert_eq!(extraction.transactions.len(), 1);
        assert_eq!(extraction.failures.len(), 1);
    }
}
