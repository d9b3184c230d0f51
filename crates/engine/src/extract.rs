use crate::patterns::{CategoryRule, FieldRule};
use models::{ParqetError, RawTransaction};
use tracing::debug;

/// Apply one category's pattern library to a document's pages. Each page
/// whose text matches the anchor is one occurrence; failures are
/// per-occurrence, so one bad page never drops the rest of the document.
pub fn extract_category(
    pages: &[String],
    rule: &CategoryRule,
    source: &str,
) -> Vec<Result<RawTransaction, ParqetError>> {
    let mut out = Vec::new();

    for page in pages {
        let Some(anchor) = rule.anchor.captures(page) else {
            continue;
        };

        let mut raw = RawTransaction::new(rule.kind, source);
        if let Some(m) = anchor.get(1) {
            raw.set(crate::fields::MATCH, m.as_str().trim());
        }

        let mut missing = None;
        for field in &rule.fields {
            match match_field(field, page) {
                Some(value) => {
                    debug!(field = field.name, %value, "field matched");
                    raw.set(field.name, value);
                }
                None if field.required => {
                    missing = Some(field.name.to_string());
                    break;
                }
                None => {}
            }
        }

        if let Some(field) = missing {
            out.push(Err(ParqetError::TransactionExtraction {
                kind: rule.kind,
                field,
                document: source.to_string(),
            }));
            continue;
        }

        if !rule.require_one_of.is_empty()
            && rule.require_one_of.iter().all(|f| raw.get(f).is_none())
        {
            out.push(Err(ParqetError::TransactionExtraction {
                kind: rule.kind,
                field: rule.require_one_of.join("|"),
                document: source.to_string(),
            }));
            continue;
        }

        out.push(Ok(raw));
    }

    out
}

/// First-success-wins over the field's fallback chain (already sorted by
/// ascending priority). A non-matching pattern is an empty result, not an
/// error.
fn match_field(field: &FieldRule, text: &str) -> Option<String> {
    for candidate in &field.patterns {
        if let Some(caps) = candidate.regex.captures(text) {
            if let Some(m) = caps.get(1) {
                return Some(m.as_str().trim().to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::{pattern, CategoryRule, FieldRule, TypeRule};
    use models::TransactionKind;

    fn one_page(text: &str) -> Vec<String> {
        vec![text.to_string()]
    }

    fn amount_rule(fields: Vec<FieldRule>) -> CategoryRule {
        CategoryRule::new(
            TransactionKind::Interest,
            r"Zinsgutschrift",
            TypeRule::Fixed("Interest"),
            fields,
        )
        .unwrap()
    }

    #[test]
    fn test_lowest_priority_number_wins() {
        // Both patterns match; priority 1 must be selected.
        let rule = amount_rule(vec![FieldRule::required(
            "amount",
            vec![
                pattern(2, r"CHF\s*([\d.]+)").unwrap(),
                pattern(1, r"Zinsgutschrift:\s*CHF\s*([\d.]+)").unwrap(),
            ],
        )
        .unwrap()]);

        let pages = one_page("Zinsgutschrift: CHF 12.50 Saldo CHF 999.99");
        let results = extract_category(&pages, &rule, "doc.pdf");
        assert_eq!(results.len(), 1);
        let raw = results[0].as_ref().unwrap();
        assert_eq!(raw.get("amount"), Some("12.50"));
    }

    #[test]
    fn test_fallback_pattern_used_when_strict_fails() {
        let rule = amount_rule(vec![FieldRule::required(
            "amount",
            vec![
                pattern(1, r"Zinsgutschrift:\s*CHF\s*([\d.]+)").unwrap(),
                pattern(2, r"([\d.]+)\s*\*\s*$").unwrap(),
            ],
        )
        .unwrap()]);

        let pages = one_page("Zinsgutschrift\nim Berichtszeitraum 14.35 *");
        let results = extract_category(&pages, &rule, "doc.pdf");
        let raw = results[0].as_ref().unwrap();
        assert_eq!(raw.get("amount"), Some("14.35"));
    }

    #[test]
    fn test_missing_required_field_names_field_and_kind() {
        let rule = amount_rule(vec![FieldRule::required(
            "amount",
            vec![pattern(1, r"CHF\s*([\d.]+)").unwrap()],
        )
        .unwrap()]);

        let pages = one_page("Zinsgutschrift ohne Betrag");
        let results = extract_category(&pages, &rule, "doc.pdf");
        match &results[0] {
            Err(ParqetError::TransactionExtraction { kind, field, document }) => {
                assert_eq!(*kind, TransactionKind::Interest);
                assert_eq!(field, "amount");
                assert_eq!(document, "doc.pdf");
            }
            other => panic!("expected extraction error, got {:?}", other),
        }
    }

    #[test]
    fn test_other_occurrences_survive_one_failure() {
        let rule = amount_rule(vec![FieldRule::required(
            "amount",
            vec![pattern(1, r"CHF\s*([\d.]+)").unwrap()],
        )
        .unwrap()]);

        let pages = vec![
            "Zinsgutschrift ohne Betrag".to_string(),
            "Zinsgutschrift CHF 3.20".to_string(),
        ];
        let results = extract_category(&pages, &rule, "doc.pdf");
        assert_eq!(results.len(), 2);
        assert!(results[0].is_err());
        assert!(results[1].is_ok());
    }

    #[test]
    fn test_one_of_composition() {
        let make_rule = || {
            amount_rule(vec![
                FieldRule::optional("fee", vec![pattern(1, r"Geb(?:ü|u)hr:\s*CHF\s*([\d.]+)").unwrap()])
                    .unwrap(),
                FieldRule::optional("tax", vec![pattern(1, r"Mehrwertsteuer:\s*CHF\s*([\d.]+)").unwrap()])
                    .unwrap(),
            ])
            .with_one_of(&["fee", "tax"])
        };

        // Only the tax sub-extractor finds something: occurrence is valid.
        let results = extract_category(
            &one_page("Zinsgutschrift Mehrwertsteuer: CHF 1.10"),
            &make_rule(),
            "doc.pdf",
        );
        let raw = results[0].as_ref().unwrap();
        assert_eq!(raw.get("tax"), Some("1.10"));
        assert_eq!(raw.get("fee"), None);

        // Neither matched: the occurrence itself is invalid.
        let results = extract_category(&one_page("Zinsgutschrift"), &make_rule(), "doc.pdf");
        match &results[0] {
            Err(ParqetError::TransactionExtraction { field, .. }) => {
                assert_eq!(field, "fee|tax");
            }
            other => panic!("expected extraction error, got {:?}", other),
        }
    }
}
