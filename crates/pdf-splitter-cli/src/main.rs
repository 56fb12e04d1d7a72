//! PDF Splitter CLI - upload, split and sweep against a local document store.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pdf_splitter_core::{AppConfig, PdfSplitter, RangeSpec, range};
use std::path::PathBuf;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "pdf-split")]
#[command(author, version, about = "Store PDF documents and compose new ones from page ranges", long_about = None)]
struct Args {
    /// Directory holding uploaded and composed documents
    #[arg(long, global = true, env = "PDF_SPLITTER_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Config file path
    #[arg(short, long, global = true, env = "PDF_SPLITTER_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate and store PDF files, printing their document ids
    Upload {
        /// PDF files to store
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Compose a new PDF from page ranges of stored documents
    Split {
        /// Output PDF file
        #[arg(short, long)]
        output: PathBuf,

        /// Reject malformed range expressions instead of skipping stray text
        #[arg(long)]
        strict: bool,

        /// Selections as DOCUMENT_ID:RANGES, e.g. 3f2c...:1-3,7
        #[arg(required = true, value_parser = parse_selection)]
        selections: Vec<RangeSpec>,
    },

    /// Delete stored files older than the retention window
    Sweep,
}

/// `DOCUMENT_ID:RANGES`
fn parse_selection(value: &str) -> std::result::Result<RangeSpec, String> {
    let (id, ranges) = value
        .split_once(':')
        .ok_or_else(|| format!("expected DOCUMENT_ID:RANGES, got {value:?}"))?;
    Ok(RangeSpec::new(id.trim(), ranges))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before parsing args so env vars are available)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Setup logging
    let log_level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    // Load or create config
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path).context("Failed to load config file")?
    } else {
        AppConfig::load()
    };

    // Override config with CLI arguments
    if let Some(dir) = args.data_dir {
        config.data_dir = Some(dir);
    }

    let splitter = PdfSplitter::new(config).context("Invalid configuration")?;

    match args.command {
        Command::Upload { files } => upload(&splitter, files).await,
        Command::Split {
            output,
            strict,
            selections,
        } => split(&splitter, &output, strict, selections).await,
        Command::Sweep => sweep(&splitter).await,
    }
}

async fn upload(splitter: &PdfSplitter, files: Vec<PathBuf>) -> Result<()> {
    for path in files {
        info!("Uploading {}", path.display());
        let file = tokio::fs::File::open(&path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let uploaded = splitter
            .upload_reader(file)
            .await
            .with_context(|| format!("Failed to upload {}", path.display()))?;

        // CLI output is intentional
        #[allow(clippy::print_stdout)]
        {
            println!(
                "{}\t{} pages\t{}",
                uploaded.id,
                uploaded.pages,
                path.display()
            );
        }
    }
    Ok(())
}

async fn split(
    splitter: &PdfSplitter,
    output: &std::path::Path,
    strict: bool,
    selections: Vec<RangeSpec>,
) -> Result<()> {
    if strict {
        for selection in &selections {
            range::parse_strict(&selection.split).with_context(|| {
                format!(
                    "Invalid range {:?} for {}",
                    selection.split, selection.document_id
                )
            })?;
        }
    }

    let composition = splitter
        .split_to(selections, output)
        .await
        .context("Failed to compose PDF")?;

    // CLI output is intentional
    #[allow(clippy::print_stdout)]
    {
        println!(
            "Wrote {} pages ({} bytes) to {}",
            composition.page_count,
            composition.size,
            output.display()
        );
    }
    Ok(())
}

async fn sweep(splitter: &PdfSplitter) -> Result<()> {
    let report = splitter.sweep().await.context("Retention sweep failed")?;

    // CLI output is intentional
    #[allow(clippy::print_stdout)]
    {
        println!(
            "Deleted {}, retained {}, failed {}",
            report.deleted, report.retained, report.failed
        );
    }
    Ok(())
}
