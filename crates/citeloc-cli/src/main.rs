use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use citeloc_core::config_file::{self, ConfigFile};
use citeloc_core::{
    BatchConfig, BatchEvent, BatchOutcome, CitationLocationResult, LocateStatus,
    SourcePublication,
};
use citeloc_parsing::{CitationLocator, LocatorConfigBuilder, classify_page, extract_document_doi};
use citeloc_pdf_mupdf::MupdfBackend;

mod output;
mod request;

use output::ColorMode;

/// Citation locator - find where a publication is cited in a PDF
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to a TOML config file (default: platform config and ./.citeloc.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// The cited publication.
#[derive(Args, Debug, Clone, Default)]
struct PublicationArgs {
    /// DOI of the cited publication
    #[arg(long)]
    doi: Option<String>,

    /// Author name (repeat for several; the first is used for matching)
    #[arg(long = "author")]
    authors: Vec<String>,

    /// Publication year
    #[arg(long)]
    year: Option<i32>,

    /// Publication title
    #[arg(long, default_value = "")]
    title: String,
}

impl PublicationArgs {
    fn into_publication(self) -> SourcePublication {
        SourcePublication {
            title: self.title,
            doi: self.doi.filter(|d| !d.trim().is_empty()),
            authors: self.authors,
            year: self.year,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Locate the bibliography entry and citation markers in one PDF
    Locate {
        /// Path to the citing PDF (omit when using --request)
        pdf: Option<PathBuf>,

        #[command(flatten)]
        publication: PublicationArgs,

        /// JSON request (inline, or a path to a file) with pdf_path and article_data
        #[arg(long, conflicts_with = "pdf")]
        request: Option<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,

        /// Path to output file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Locate the same publication across many PDFs
    Batch {
        /// Paths to the citing PDFs
        #[arg(required = true)]
        pdfs: Vec<PathBuf>,

        #[command(flatten)]
        publication: PublicationArgs,

        /// Number of documents processed concurrently
        #[arg(long)]
        workers: Option<usize>,

        /// Per-document timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Print the results as JSON
        #[arg(long)]
        json: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,

        /// Path to output file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Dry run: show how each page of a PDF is classified
    Classify {
        /// Path to the PDF
        pdf: PathBuf,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// Print the DOI of a PDF, read from its first pages
    ExtractDoi {
        /// Path to the PDF
        pdf: PathBuf,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let file_config = match cli.config {
        Some(ref path) => match config_file::load_from_path(path) {
            Some(config) => config,
            None => {
                tracing::error!(path = %path.display(), "config file missing or unparsable");
                anyhow::bail!("Cannot load config file: {}", path.display());
            }
        },
        None => config_file::load_config(),
    };
    let locator = build_locator(&file_config)?;

    match cli.command {
        Command::Locate {
            pdf,
            publication,
            request,
            json,
            no_color,
            output,
        } => {
            if let Some(request) = request {
                locate_request(&locator, &request, output)
            } else {
                let pdf = pdf.ok_or_else(|| {
                    anyhow::anyhow!("A PDF path is required unless --request is given")
                })?;
                locate(
                    &locator,
                    &pdf,
                    publication.into_publication(),
                    json,
                    no_color,
                    output,
                )
            }
        }
        Command::Batch {
            pdfs,
            publication,
            workers,
            timeout_secs,
            json,
            no_color,
            output,
        } => {
            let config = batch_config(&file_config, workers, timeout_secs);
            batch(
                locator,
                pdfs,
                publication.into_publication(),
                config,
                json,
                no_color,
                output,
            )
            .await
        }
        Command::Classify { pdf, no_color } => classify(&locator, &pdf, no_color),
        Command::ExtractDoi {
            pdf,
            json,
            no_color,
        } => extract_doi(&locator, &pdf, json, no_color),
    }
}

/// Logs go to stderr so JSON on stdout stays clean. `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "citeloc_parsing=debug,citeloc_core=debug,citeloc_pdf_mupdf=debug,info",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| level.to_string()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn build_locator(file_config: &ConfigFile) -> anyhow::Result<CitationLocator> {
    let mut builder = LocatorConfigBuilder::new();
    if let Some(ref section) = file_config.locator {
        builder = builder.apply_file(section)?;
    }
    let config = builder.build()?;

    let mut backend = MupdfBackend::new();
    if let Some(ref extraction) = file_config.extraction {
        if let Some(ratio) = extraction.header_exclusion {
            backend = backend.with_header_exclusion(ratio);
        }
        if let Some(ratio) = extraction.footer_exclusion {
            backend = backend.with_footer_exclusion(ratio);
        }
    }
    Ok(CitationLocator::new(Box::new(backend)).with_config(config))
}

/// Resolve batch settings: CLI flags > env vars > config file > defaults.
fn batch_config(
    file_config: &ConfigFile,
    workers: Option<usize>,
    timeout_secs: Option<u64>,
) -> BatchConfig {
    let defaults = BatchConfig::default();
    let section = file_config.batch.clone().unwrap_or_default();
    let num_workers = workers
        .or_else(|| {
            std::env::var("CITELOC_WORKERS")
                .ok()
                .and_then(|v| v.parse().ok())
        })
        .or(section.num_workers)
        .unwrap_or(defaults.num_workers);
    let timeout = timeout_secs
        .or_else(|| {
            std::env::var("CITELOC_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
        })
        .or(section.timeout_secs)
        .map(Duration::from_secs)
        .unwrap_or(defaults.timeout);
    BatchConfig {
        num_workers,
        timeout,
    }
}

fn open_writer(output: &Option<PathBuf>) -> anyhow::Result<Box<dyn Write>> {
    Ok(if let Some(output_path) = output {
        Box::new(std::fs::File::create(output_path)?)
    } else {
        Box::new(std::io::stdout())
    })
}

fn locate(
    locator: &CitationLocator,
    pdf: &Path,
    publication: SourcePublication,
    json: bool,
    no_color: bool,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let color = ColorMode(!no_color && !json && output.is_none());
    let mut writer = open_writer(&output)?;

    let result = if json {
        locator.locate_citation(&publication, pdf)
    } else {
        let progress_writer = Mutex::new(std::io::stderr());
        locator.locate_citation_with_progress(&publication, pdf, &|event| {
            if let Ok(mut w) = progress_writer.lock() {
                let _ = output::print_progress(&mut *w, &event, color);
            }
        })
    };

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&result)?)?;
    } else {
        writeln!(writer)?;
        output::print_locate_report(&mut writer, pdf, &result, color)?;
    }
    writer.flush()?;
    Ok(())
}

/// Request mode prints exactly one JSON object on stdout, errors included.
fn locate_request(
    locator: &CitationLocator,
    request: &str,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut writer = open_writer(&output)?;
    let result = match request::parse_request(request) {
        Ok(request) => {
            let publication = request.article_data.into_publication();
            locator.locate_citation(&publication, &request.pdf_path)
        }
        Err(e) => {
            tracing::warn!(error = %e, "rejected locate request");
            CitationLocationResult::read_error(e.to_string())
        }
    };
    writeln!(writer, "{}", serde_json::to_string(&result)?)?;
    writer.flush()?;
    Ok(())
}

async fn batch(
    locator: CitationLocator,
    pdfs: Vec<PathBuf>,
    publication: SourcePublication,
    config: BatchConfig,
    json: bool,
    no_color: bool,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let color = ColorMode(!no_color && !json && output.is_none());
    let mut writer = open_writer(&output)?;

    let bar = ProgressBar::new(pdfs.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {wide_msg}")
            .unwrap()
            .progress_chars("=> "),
    );
    let progress_cb = {
        let bar = bar.clone();
        move |event: BatchEvent| match event {
            BatchEvent::Started { path, .. } => {
                bar.set_message(path.display().to_string());
            }
            BatchEvent::Finished { path, outcome, .. } => {
                if let BatchOutcome::TimedOut = outcome {
                    bar.println(format!("timed out: {}", path.display()));
                }
                bar.inc(1);
            }
            BatchEvent::Locator { .. } => {}
        }
    };

    let cancel = CancellationToken::new();

    // Set up Ctrl+C handler
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_clone.cancel();
        }
    });

    let items = citeloc_core::locate_batch(
        Arc::new(locator),
        Arc::new(publication),
        pdfs,
        config,
        progress_cb,
        cancel,
    )
    .await;
    bar.finish_and_clear();

    let located = items
        .iter()
        .filter(|item| {
            matches!(&item.outcome, BatchOutcome::Completed(r) if r.status == LocateStatus::Located)
        })
        .count();
    let timed_out = items
        .iter()
        .filter(|item| item.outcome == BatchOutcome::TimedOut)
        .count();
    tracing::info!(total = items.len(), located, timed_out, "batch finished");

    if json {
        let entries: Vec<serde_json::Value> = items
            .iter()
            .map(|item| {
                let (outcome, result) = match &item.outcome {
                    BatchOutcome::Completed(result) => ("completed", serde_json::to_value(result)),
                    BatchOutcome::TimedOut => ("timed_out", Ok(serde_json::Value::Null)),
                    BatchOutcome::Cancelled => ("cancelled", Ok(serde_json::Value::Null)),
                    BatchOutcome::Failed(message) => {
                        ("failed", Ok(serde_json::Value::String(message.clone())))
                    }
                };
                serde_json::json!({
                    "pdf_path": item.path.display().to_string(),
                    "outcome": outcome,
                    "result": result.unwrap_or(serde_json::Value::Null),
                })
            })
            .collect();
        writeln!(writer, "{}", serde_json::to_string_pretty(&entries)?)?;
    } else {
        output::print_batch_summary(&mut writer, &items, color)?;
    }
    writer.flush()?;
    Ok(())
}

fn classify(locator: &CitationLocator, pdf: &Path, no_color: bool) -> anyhow::Result<()> {
    let color = ColorMode(!no_color);
    let doc = locator
        .load(pdf)
        .map_err(|e| anyhow::anyhow!("Classification failed: {}", e))?;
    let pages: Vec<_> = doc
        .pages()
        .iter()
        .map(|page| classify_page(page, locator.config()))
        .collect();
    tracing::debug!(
        pdf = %pdf.display(),
        reference_pages = pages.iter().filter(|p| p.is_reference).count(),
        "classified"
    );

    let mut writer = std::io::stdout();
    output::print_classification(&mut writer, pdf, &pages, color)?;
    Ok(())
}

fn extract_doi(
    locator: &CitationLocator,
    pdf: &Path,
    json: bool,
    no_color: bool,
) -> anyhow::Result<()> {
    let color = ColorMode(!no_color && !json);
    let doc = locator
        .load(pdf)
        .map_err(|e| anyhow::anyhow!("DOI extraction failed: {}", e))?;
    let doi = extract_document_doi(&doc);

    let mut writer = std::io::stdout();
    if json {
        let value = match doi {
            Some(d) => serde_json::json!({
                "doi": d.doi,
                "page": d.page_number,
                "source": d.source.as_str(),
            }),
            None => serde_json::json!({ "doi": null }),
        };
        writeln!(writer, "{}", value)?;
    } else {
        output::print_document_doi(&mut writer, pdf, doi.as_ref(), color)?;
    }
    Ok(())
}
