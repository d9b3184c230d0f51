use crate::identity::transaction_id;
use crate::row::{Row, COLUMNS, ID_COLUMN};
use models::ParqetError;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Outcome counts of one merge call.
#[derive(Debug, Clone, Default)]
pub struct MergeStats {
    pub added: usize,
    pub skipped: usize,
    pub total: usize,
}

impl MergeStats {
    pub fn has_duplicates(&self) -> bool {
        self.skipped > 0
    }
}

/// Load one category ledger. A missing file is an empty ledger, not an
/// error. Rows written before ids were exported get their id recomputed
/// from the canonical columns.
pub fn read_ledger(path: &Path) -> Result<Vec<Row>, ParqetError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_path(path)
        .map_err(|e| {
            ParqetError::FileOperation(format!("cannot open ledger {}: {}", path.display(), e))
        })?;

    let headers = reader
        .headers()
        .map_err(|e| {
            ParqetError::FileOperation(format!("cannot read ledger {}: {}", path.display(), e))
        })?
        .clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| {
            ParqetError::FileOperation(format!("cannot read ledger {}: {}", path.display(), e))
        })?;

        let mut row = Row::new();
        for (header, value) in headers.iter().zip(record.iter()) {
            row.insert(header.to_string(), value.to_string());
        }
        if row.get(ID_COLUMN).map(|id| id.is_empty()).unwrap_or(true) {
            let id = transaction_id(&row);
            warn!(ledger = %path.display(), id, "row without id, recomputed");
            row.insert(ID_COLUMN.to_string(), id);
        }
        rows.push(row);
    }

    Ok(rows)
}

/// Insertion-only merge keyed by transaction id: existing rows are never
/// replaced, a new row whose id is already present is dropped.
pub fn merge_rows(existing: Vec<Row>, new_rows: Vec<Row>) -> (Vec<Row>, MergeStats) {
    let mut seen: HashSet<String> = existing
        .iter()
        .filter_map(|row| row.get(ID_COLUMN).cloned())
        .collect();

    let mut stats = MergeStats {
        total: new_rows.len(),
        ..MergeStats::default()
    };

    let mut merged = existing;
    for row in new_rows {
        let id = row.get(ID_COLUMN).cloned().unwrap_or_default();
        if seen.contains(&id) {
            stats.skipped += 1;
        } else {
            seen.insert(id);
            merged.push(row);
            stats.added += 1;
        }
    }

    (merged, stats)
}

/// Serialize one category ledger: id column first, remaining columns in
/// ascending name order, rows newest first. The file is written to a
/// temporary sibling and renamed into place so a failed write never leaves
/// a truncated ledger behind.
pub fn write_ledger(path: &Path, mut rows: Vec<Row>) -> Result<(), ParqetError> {
    // Datetimes render in a fixed-width ISO format, so the string order is
    // the chronological order.
    rows.sort_by(|a, b| {
        let da = a.get("datetime").map(|s| s.as_str()).unwrap_or("");
        let db = b.get("datetime").map(|s| s.as_str()).unwrap_or("");
        db.cmp(da)
    });

    let tmp_path = path.with_extension("csv.tmp");
    {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b';')
            .from_path(&tmp_path)
            .map_err(|e| {
                ParqetError::CsvWrite(format!("cannot create {}: {}", tmp_path.display(), e))
            })?;

        let mut header = vec![ID_COLUMN];
        header.extend(COLUMNS);
        writer
            .write_record(&header)
            .map_err(|e| ParqetError::CsvWrite(format!("{}: {}", path.display(), e)))?;

        for row in &rows {
            let mut record = Vec::with_capacity(header.len());
            for column in &header {
                record.push(row.get(*column).map(|s| s.as_str()).unwrap_or(""));
            }
            writer
                .write_record(&record)
                .map_err(|e| ParqetError::CsvWrite(format!("{}: {}", path.display(), e)))?;
        }
        writer
            .flush()
            .map_err(|e| ParqetError::CsvWrite(format!("{}: {}", path.display(), e)))?;
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        ParqetError::CsvWrite(format!("cannot replace {}: {}", path.display(), e))
    })?;

    info!(ledger = %path.display(), rows = rows.len(), "ledger written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::render_row;
    use chrono::{TimeZone, Utc};
    use models::{NormalizedTransaction, TransactionKind};
    use std::path::PathBuf;

    fn txn(day: u32, amount: f64) -> NormalizedTransaction {
        let datetime = Utc.with_ymd_and_hms(2024, 3, day, 6, 30, 0).unwrap();
        let mut txn = NormalizedTransaction::new(
            datetime,
            TransactionKind::Trade,
            "buy",
            "Kasparund AG",
            "CHF",
            amount,
        );
        txn.identifier = Some("IE00B4L5Y983".to_string());
        txn
    }

    fn identified(txn: &NormalizedTransaction) -> Row {
        let mut row = render_row(txn);
        let id = transaction_id(&row);
        row.insert(ID_COLUMN.to_string(), id);
        row
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("ledger_{}_{}.csv", name, std::process::id()))
    }

    #[test]
    fn test_merge_is_idempotent() {
        let rows = vec![identified(&txn(1, 100.0)), identified(&txn(2, 200.0))];

        let (merged, stats) = merge_rows(Vec::new(), rows.clone());
        assert_eq!(stats.added, 2);

        let (remerged, stats) = merge_rows(merged.clone(), rows);
        assert_eq!(stats.added, 0);
        assert_eq!(stats.skipped, 2);
        assert_eq!(remerged.len(), merged.len());
    }

    #[test]
    fn test_merge_never_replaces_existing() {
        let original = identified(&txn(1, 100.0));
        let mut altered = original.clone();
        altered.insert("exchange".to_string(), "SIX".to_string());

        let (merged, stats) = merge_rows(vec![original.clone()], vec![altered]);
        assert_eq!(stats.skipped, 1);
        assert_eq!(merged[0], original);
    }

    #[test]
    fn test_write_and_read_back() {
        let path = temp_path("roundtrip");
        let rows = vec![identified(&txn(1, 100.0)), identified(&txn(5, 200.0))];
        write_ledger(&path, rows).unwrap();

        let loaded = read_ledger(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        // Newest first.
        assert_eq!(loaded[0]["datetime"], "2024-03-05T06:30:00.000Z");
        assert!(loaded[0][ID_COLUMN].starts_with("txn_"));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_ledger_is_empty() {
        let rows = read_ledger(Path::new("/nonexistent/ledger.csv")).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_legacy_rows_get_recomputed_ids() {
        let path = temp_path("legacy");
        // Hand-written legacy file without the id column.
        std::fs::write(
            &path,
            "amount;broker;datetime;holding;identifier;type\n\
             100,5;Kasparund AG;2024-03-01T06:30:00.000Z;hld_1;IE00B4L5Y983;buy\n",
        )
        .unwrap();

        let loaded = read_ledger(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        let id = &loaded[0][ID_COLUMN];
        assert!(id.starts_with("txn_"));

        // A freshly rendered row with the same canonical fields dedups
        // against the legacy row.
        let mut row = Row::new();
        for (k, v) in &loaded[0] {
            if k != ID_COLUMN {
                row.insert(k.clone(), v.clone());
            }
        }
        let recomputed = transaction_id(&row);
        assert_eq!(&recomputed, id);

        std::fs::remove_file(&path).ok();
    }
}
