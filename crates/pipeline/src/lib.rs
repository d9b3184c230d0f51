//! Batch orchestration: broker registry, per-document processing and the
//! per-category merge into the on-disk ledgers.

use engine::{detect_broker, Broker};
use ledger::{merge_rows, read_ledger, render_row, transaction_id, write_ledger};
use ledger::{MergeStats, Row, ID_COLUMN};
use models::{Document, HoldingMap, NormalizedTransaction, ParqetError, TransactionKind};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub holdings_path: PathBuf,
    pub output_dir: PathBuf,
}

/// The closed set of supported brokers, in detection order.
pub fn registry() -> Result<Vec<Box<dyn Broker>>, ParqetError> {
    Ok(vec![
        Box::new(kasparund::broker()?),
        Box::new(terzo::broker()?),
        Box::new(liberty::broker()?),
        Box::new(saxo::broker()?),
        Box::new(selma::SelmaBroker::new()),
        Box::new(n26::N26Broker::new()),
        Box::new(relai::RelaiBroker::new()),
    ])
}

/// Per-document outcome for the end-of-run report.
#[derive(Debug)]
pub struct DocumentOutcome {
    pub filename: String,
    pub broker: Option<String>,
    pub transactions: usize,
    /// Occurrence-level failures; the document still contributed the rest.
    pub failures: Vec<String>,
    /// Document-level failure; nothing was contributed.
    pub error: Option<String>,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub outcomes: Vec<DocumentOutcome>,
    /// Merge statistics per category ledger that received new rows.
    pub merged: BTreeMap<&'static str, MergeStats>,
    /// Ledger read/write failures, per category. Other categories still
    /// complete.
    pub write_errors: BTreeMap<&'static str, String>,
}

impl RunSummary {
    pub fn total_added(&self) -> usize {
        self.merged.values().map(|s| s.added).sum()
    }
}

/// Process a batch of documents and merge the results into the per-category
/// ledgers under the output directory. Configuration problems are fatal and
/// surface before any document is touched; everything else is collected.
pub fn run(config: &RunConfig, documents: &[Document]) -> Result<RunSummary, ParqetError> {
    let holdings = HoldingMap::load(&config.holdings_path)?;
    if holdings.is_empty() {
        warn!(path = %config.holdings_path.display(), "holding map is empty");
    }
    let brokers = registry()?;

    let mut summary = RunSummary::default();
    let mut extracted: Vec<NormalizedTransaction> = Vec::new();

    for document in documents {
        let outcome = process_document(&brokers, document, &holdings, &mut extracted);
        summary.outcomes.push(outcome);
    }

    for kind in TransactionKind::ALL {
        let rows: Vec<Row> = extracted
            .iter()
            .filter(|t| t.kind == kind)
            .map(identified_row)
            .collect();
        if rows.is_empty() {
            continue;
        }

        let category = kind.category();
        let path = config.output_dir.join(format!("{}.csv", category));
        match merge_into_ledger(&path, rows) {
            Ok(stats) => {
                info!(
                    category,
                    added = stats.added,
                    skipped = stats.skipped,
                    "category merged"
                );
                summary.merged.insert(category, stats);
            }
            Err(e) => {
                error!(category, %e, "ledger update failed");
                summary.write_errors.insert(category, e.to_string());
            }
        }
    }

    Ok(summary)
}

fn process_document(
    brokers: &[Box<dyn Broker>],
    document: &Document,
    holdings: &HoldingMap,
    extracted: &mut Vec<NormalizedTransaction>,
) -> DocumentOutcome {
    let mut outcome = DocumentOutcome {
        filename: document.filename().to_string(),
        broker: None,
        transactions: 0,
        failures: Vec::new(),
        error: None,
    };

    let broker = match detect_broker(brokers, document) {
        Ok(broker) => broker,
        Err(e) => {
            warn!(document = document.filename(), %e, "document skipped");
            outcome.error = Some(e.to_string());
            return outcome;
        }
    };
    outcome.broker = Some(broker.name().to_string());

    match broker.process(document, holdings) {
        Ok(extraction) => {
            outcome.transactions = extraction.transactions.len();
            outcome.failures = extraction.failures.iter().map(|e| e.to_string()).collect();
            for failure in &extraction.failures {
                warn!(document = document.filename(), %failure, "occurrence dropped");
            }
            extracted.extend(extraction.transactions);
        }
        Err(e) => {
            warn!(document = document.filename(), %e, "document failed");
            outcome.error = Some(e.to_string());
        }
    }

    outcome
}

fn identified_row(txn: &NormalizedTransaction) -> Row {
    let mut row = render_row(txn);
    let id = transaction_id(&row);
    row.insert(ID_COLUMN.to_string(), id);
    row
}

fn merge_into_ledger(path: &std::path::Path, rows: Vec<Row>) -> Result<MergeStats, ParqetError> {
    let existing = read_ledger(path)?;
    let (merged, stats) = merge_rows(existing, rows);
    write_ledger(path, merged)?;
    Ok(stats)
}
