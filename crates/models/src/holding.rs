use crate::error::ParqetError;
use std::collections::HashMap;
use std::path::Path;

/// Portfolio/IBAN-to-holding mapping, loaded once per run from a JSON object
/// of string pairs. Keys are compared with separators stripped, so
/// `CH93 0076 2011 6238 5295 7` and `CH9300762011623852957` resolve the same.
#[derive(Debug, Clone, Default)]
pub struct HoldingMap {
    map: HashMap<String, String>,
}

impl HoldingMap {
    pub fn load(path: &Path) -> Result<Self, ParqetError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ParqetError::Configuration(format!(
                "cannot read holding map {}: {}",
                path.display(),
                e
            ))
        })?;
        let parsed: HashMap<String, String> = serde_json::from_str(&raw).map_err(|e| {
            ParqetError::Configuration(format!(
                "invalid JSON in holding map {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self::from_map(parsed))
    }

    pub fn from_map(raw: HashMap<String, String>) -> Self {
        let map = raw
            .into_iter()
            .map(|(k, v)| (clean_key(&k), v))
            .collect();
        Self { map }
    }

    /// Resolve a portfolio/account number to its holding id. Unknown keys are
    /// not an error; callers log and leave the holding empty.
    pub fn resolve(&self, portfolio_number: &str) -> Option<&str> {
        self.map.get(&clean_key(portfolio_number)).map(|s| s.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

fn clean_key(key: &str) -> String {
    key.chars()
        .filter(|c| !matches!(c, '.' | '-') && !c.is_whitespace())
        .collect()
}
