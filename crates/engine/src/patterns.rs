use models::{ParqetError, TransactionKind};
use regex::{Regex, RegexBuilder};

/// One candidate rule for extracting one field. Lower priority numbers are
/// stricter patterns and are tried first; higher numbers are looser
/// fallbacks for older or degraded statement layouts.
#[derive(Debug, Clone)]
pub struct ExtractionPattern {
    pub priority: u8,
    pub regex: Regex,
}

/// Compile a case-insensitive extraction pattern. A malformed expression is
/// a configuration defect, surfaced before any document is processed.
pub fn pattern(priority: u8, expr: &str) -> Result<ExtractionPattern, ParqetError> {
    let regex = compile(expr)?;
    Ok(ExtractionPattern { priority, regex })
}

pub(crate) fn compile(expr: &str) -> Result<Regex, ParqetError> {
    RegexBuilder::new(expr)
        .case_insensitive(true)
        .build()
        .map_err(|e| ParqetError::Configuration(format!("invalid pattern '{}': {}", expr, e)))
}

/// Fallback chain for one field: patterns are evaluated in ascending
/// priority order and the first successful match wins. A failed pattern is
/// the normal path, not a fault.
#[derive(Debug, Clone)]
pub struct FieldRule {
    pub name: &'static str,
    pub required: bool,
    pub patterns: Vec<ExtractionPattern>,
}

impl FieldRule {
    pub fn required(
        name: &'static str,
        patterns: Vec<ExtractionPattern>,
    ) -> Result<Self, ParqetError> {
        Self::build(name, true, patterns)
    }

    pub fn optional(
        name: &'static str,
        patterns: Vec<ExtractionPattern>,
    ) -> Result<Self, ParqetError> {
        Self::build(name, false, patterns)
    }

    fn build(
        name: &'static str,
        required: bool,
        mut patterns: Vec<ExtractionPattern>,
    ) -> Result<Self, ParqetError> {
        patterns.sort_by_key(|p| p.priority);
        // Priorities must be unique within one field's chain.
        for pair in patterns.windows(2) {
            if pair[0].priority == pair[1].priority {
                return Err(ParqetError::Configuration(format!(
                    "duplicate pattern priority {} for field '{}'",
                    pair[0].priority, name
                )));
            }
        }
        Ok(Self {
            name,
            required,
            patterns,
        })
    }
}

/// How the output row type string is derived for one category.
#[derive(Debug, Clone)]
pub enum TypeRule {
    /// Always the same type (e.g. `Interest`).
    Fixed(&'static str),
    /// Compare the anchor capture (e.g. `Verkauf` -> `sell`, else `buy`).
    MatchEquals {
        value: &'static str,
        then: &'static str,
        otherwise: &'static str,
    },
    /// Pick by the sign of the extracted amount.
    AmountSign {
        positive: &'static str,
        negative: &'static str,
    },
}

/// Pattern library for one transaction kind within one broker's statements.
/// The anchor recognizes the occurrence boundary (one statement page is one
/// occurrence).
#[derive(Debug, Clone)]
pub struct CategoryRule {
    pub kind: TransactionKind,
    pub anchor: Regex,
    pub fields: Vec<FieldRule>,
    /// Composition rule: the occurrence is valid if at least one of these
    /// fields matched, even when the others found nothing. Empty when not
    /// applicable.
    pub require_one_of: Vec<&'static str>,
    pub type_rule: TypeRule,
}

impl CategoryRule {
    pub fn new(
        kind: TransactionKind,
        anchor: &str,
        type_rule: TypeRule,
        fields: Vec<FieldRule>,
    ) -> Result<Self, ParqetError> {
        Ok(Self {
            kind,
            anchor: compile(anchor)?,
            fields,
            require_one_of: Vec::new(),
            type_rule,
        })
    }

    pub fn with_one_of(mut self, names: &[&'static str]) -> Self {
        self.require_one_of = names.to_vec();
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldRule> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Static descriptor for one PDF-statement broker: detection identifiers,
/// the portfolio-number pattern and the per-kind pattern libraries. Built
/// once at process start and shared read-only.
#[derive(Debug, Clone)]
pub struct BrokerProfile {
    pub name: &'static str,
    /// Every identifier must appear somewhere in the document text.
    pub identifiers: Vec<&'static str>,
    pub portfolio_number: Regex,
    pub default_currency: &'static str,
    pub categories: Vec<CategoryRule>,
}

impl BrokerProfile {
    pub fn new(
        name: &'static str,
        identifiers: &[&'static str],
        portfolio_number: &str,
        default_currency: &'static str,
        categories: Vec<CategoryRule>,
    ) -> Result<Self, ParqetError> {
        Ok(Self {
            name,
            identifiers: identifiers.to_vec(),
            portfolio_number: compile(portfolio_number)?,
            default_currency,
            categories,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_rule_sorts_by_priority() {
        let rule = FieldRule::required(
            "amount",
            vec![
                pattern(3, r"c(\d+)").unwrap(),
                pattern(1, r"a(\d+)").unwrap(),
                pattern(2, r"b(\d+)").unwrap(),
            ],
        )
        .unwrap();
        let priorities: Vec<u8> = rule.patterns.iter().map(|p| p.priority).collect();
        assert_eq!(priorities, vec![1, 2, 3]);
    }

    #[test]
    fn test_duplicate_priorities_rejected() {
        let result = FieldRule::required(
            "amount",
            vec![
                pattern(1, r"a(\d+)").unwrap(),
                pattern(1, r"b(\d+)").unwrap(),
            ],
        );
        assert!(matches!(result, Err(ParqetError::Configuration(_))));
    }

    #[test]
    fn test_malformed_pattern_is_configuration_error() {
        assert!(matches!(
            pattern(1, r"([unclosed"),
            Err(ParqetError::Configuration(_))
        ));
    }
}
