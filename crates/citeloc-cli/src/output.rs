use std::io::Write;
use std::path::Path;

use citeloc_core::{
    BatchItem, BatchOutcome, BoundingBox, CitationLocationResult, LocateStatus, LocatorEvent,
};
use citeloc_parsing::{DocumentDoi, PageClassification};
use owo_colors::OwoColorize;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

fn format_bbox(bbox: Option<BoundingBox>) -> String {
    match bbox {
        Some(b) => format!("[{:.1}, {:.1}, {:.1}, {:.1}]", b.x0, b.top, b.x1, b.bottom),
        None => "-".to_string(),
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Print a locator progress event (human-readable mode only).
pub fn print_progress(
    w: &mut dyn Write,
    event: &LocatorEvent,
    color: ColorMode,
) -> std::io::Result<()> {
    match event {
        LocatorEvent::DocumentLoaded {
            pages,
            reference_pages,
        } => {
            writeln!(
                w,
                "Loaded {} pages (reference pages: {:?})",
                pages, reference_pages
            )?;
        }
        LocatorEvent::ReadFailed { message } => {
            if color.enabled() {
                writeln!(w, "{} {}", "READ ERROR:".red(), message)?;
            } else {
                writeln!(w, "READ ERROR: {}", message)?;
            }
        }
        LocatorEvent::ReferenceFound { reference } => {
            writeln!(
                w,
                "Reference entry {} on page {} (matched by {})",
                reference.entry_number, reference.page_number, reference.strategy
            )?;
        }
        LocatorEvent::ReferenceNotFound => {
            if color.enabled() {
                writeln!(w, "{}", "Reference entry not found".yellow())?;
            } else {
                writeln!(w, "Reference entry not found")?;
            }
        }
        LocatorEvent::PageReclassified { page_number } => {
            writeln!(w, "Page {} treated as a reference page", page_number)?;
        }
        LocatorEvent::MarkerFound {
            page_number,
            grammar,
        } => {
            writeln!(w, "  Marker on page {} ({})", page_number, grammar)?;
        }
        LocatorEvent::BracketFallback => {
            if color.enabled() {
                writeln!(
                    w,
                    "{}",
                    "No bracketed markers, trying bare numbers (may over-match)".yellow()
                )?;
            } else {
                writeln!(w, "No bracketed markers, trying bare numbers (may over-match)")?;
            }
        }
        LocatorEvent::SyntheticOccurrence { page_number } => {
            writeln!(
                w,
                "No marker in body text; using reference page {}",
                page_number
            )?;
        }
    }
    Ok(())
}

/// Print the result for one document.
pub fn print_locate_report(
    w: &mut dyn Write,
    pdf_path: &Path,
    result: &CitationLocationResult,
    color: ColorMode,
) -> std::io::Result<()> {
    let name = display_name(pdf_path);
    match result.status {
        LocateStatus::ReadError => {
            let message = result.message.as_deref().unwrap_or("unknown error");
            if color.enabled() {
                writeln!(w, "{} {}: {}", "ERROR".red().bold(), name.bold(), message)?;
            } else {
                writeln!(w, "ERROR {}: {}", name, message)?;
            }
        }
        LocateStatus::ReferenceNotFound => {
            if color.enabled() {
                writeln!(w, "{} {}", "NOT FOUND".yellow().bold(), name.bold())?;
            } else {
                writeln!(w, "NOT FOUND {}", name)?;
            }
        }
        LocateStatus::Located => {
            if color.enabled() {
                writeln!(w, "{} {}", "LOCATED".green().bold(), name.bold())?;
            } else {
                writeln!(w, "LOCATED {}", name)?;
            }
            if let Some(reference) = result.reference {
                writeln!(
                    w,
                    "  Reference #{} on page {} via {} {}",
                    reference.entry_number,
                    reference.page_number,
                    reference.strategy,
                    format_bbox(result.reference_bbox)
                )?;
            }
            for occurrence in &result.occurrences {
                writeln!(
                    w,
                    "  Cited on page {} {}",
                    occurrence.page_number,
                    format_bbox(occurrence.bbox)
                )?;
            }
            let pages: Vec<String> = result
                .required_pages()
                .iter()
                .map(|p| p.to_string())
                .collect();
            if color.enabled() {
                writeln!(w, "  {} {}", "Required pages:".dimmed(), pages.join(", "))?;
            } else {
                writeln!(w, "  Required pages: {}", pages.join(", "))?;
            }
        }
    }
    Ok(())
}

/// Print one line per batch item followed by totals.
pub fn print_batch_summary(
    w: &mut dyn Write,
    items: &[BatchItem],
    color: ColorMode,
) -> std::io::Result<()> {
    let mut located = 0;
    for item in items {
        match &item.outcome {
            BatchOutcome::Completed(result) => {
                if result.status == LocateStatus::Located {
                    located += 1;
                }
                print_locate_report(w, &item.path, result, color)?;
            }
            BatchOutcome::TimedOut => {
                if color.enabled() {
                    writeln!(w, "{} {}", "TIMED OUT".red(), display_name(&item.path))?;
                } else {
                    writeln!(w, "TIMED OUT {}", display_name(&item.path))?;
                }
            }
            BatchOutcome::Cancelled => {
                writeln!(w, "CANCELLED {}", display_name(&item.path))?;
            }
            BatchOutcome::Failed(message) => {
                if color.enabled() {
                    writeln!(w, "{} {}: {}", "FAILED".red(), display_name(&item.path), message)?;
                } else {
                    writeln!(w, "FAILED {}: {}", display_name(&item.path), message)?;
                }
            }
        }
    }
    writeln!(w)?;
    if color.enabled() {
        writeln!(
            w,
            "{} {}/{} documents",
            "Located in".bold(),
            located.to_string().green(),
            items.len()
        )?;
    } else {
        writeln!(w, "Located in {}/{} documents", located, items.len())?;
    }
    Ok(())
}

/// Print the per-page classification table of `classify`.
pub fn print_classification(
    w: &mut dyn Write,
    pdf_path: &Path,
    pages: &[PageClassification],
    color: ColorMode,
) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "{} {}\n", "CLASSIFY:".bold().cyan(), display_name(pdf_path).bold())?;
    } else {
        writeln!(w, "CLASSIFY: {}\n", display_name(pdf_path))?;
    }
    for page in pages {
        let kind = if page.is_reference { "reference" } else { "body" };
        let heading = page.heading.as_deref().unwrap_or("-");
        if color.enabled() && page.is_reference {
            writeln!(
                w,
                "  page {:>3}  {:<9}  numbered lines: {:>2}  heading: {}",
                page.page_number,
                kind.green(),
                page.numbered_lines,
                heading
            )?;
        } else {
            writeln!(
                w,
                "  page {:>3}  {:<9}  numbered lines: {:>2}  heading: {}",
                page.page_number, kind, page.numbered_lines, heading
            )?;
        }
    }
    Ok(())
}

pub fn print_document_doi(
    w: &mut dyn Write,
    pdf_path: &Path,
    doi: Option<&DocumentDoi>,
    color: ColorMode,
) -> std::io::Result<()> {
    match doi {
        Some(d) => writeln!(
            w,
            "{}: {} (page {}, {})",
            display_name(pdf_path),
            d.doi,
            d.page_number,
            d.source.as_str()
        ),
        None if color.enabled() => {
            writeln!(w, "{}: {}", display_name(pdf_path), "no DOI found".yellow())
        }
        None => writeln!(w, "{}: no DOI found", display_name(pdf_path)),
    }
}
