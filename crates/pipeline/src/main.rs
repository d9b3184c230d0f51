use anyhow::{Context, Result};
use clap::Parser;
use models::Document;
use pipeline::{run, RunConfig};
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "parqet-parser",
    about = "Extract transactions from broker statements into category CSV ledgers."
)]
struct Args {
    /// Directory of input documents (.txt page streams from PDF extraction,
    /// .csv exports)
    #[arg(short, long)]
    input: PathBuf,

    /// Path to the portfolio-to-holding mapping JSON
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Directory receiving the category ledgers
    #[arg(short, long, default_value = "output")]
    output: PathBuf,
}

fn load_documents(input: &PathBuf) -> Result<Vec<Document>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(input)
        .with_context(|| format!("reading {}", input.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    // Deterministic batch order.
    paths.sort();

    let mut documents = Vec::new();
    for path in paths {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let extension = path.extension().and_then(|e| e.to_str());
        match extension {
            Some("txt") => {
                let text =
                    fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
                documents.push(Document::pdf(name, &text));
            }
            Some("csv") => {
                let content =
                    fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
                documents.push(Document::csv(name, content));
            }
            _ => {}
        }
    }
    Ok(documents)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pipeline=info,engine=info,ledger=info".into()),
        )
        .init();

    let args = Args::parse();
    fs::create_dir_all(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;

    let documents = load_documents(&args.input)?;
    tracing::info!(count = documents.len(), "documents loaded");

    let config = RunConfig {
        holdings_path: args.config,
        output_dir: args.output,
    };
    let summary = run(&config, &documents)?;

    for outcome in &summary.outcomes {
        match &outcome.error {
            Some(error) => println!("{}: FAILED ({})", outcome.filename, error),
            None => println!(
                "{}: {} via {} ({} occurrence failures)",
                outcome.filename,
                outcome.transactions,
                outcome.broker.as_deref().unwrap_or("-"),
                outcome.failures.len()
            ),
        }
    }
    for (category, stats) in &summary.merged {
        println!(
            "{}: {} added, {} duplicates skipped",
            category, stats.added, stats.skipped
        );
    }
    for (category, error) in &summary.write_errors {
        eprintln!("{}: write failed: {}", category, error);
    }

    if !summary.write_errors.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}
