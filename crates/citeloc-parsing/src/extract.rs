use std::path::Path;

use citeloc_core::{ExtractedPage, Page, PageKind, PdfBackend, TargetDocument};

use crate::LocateError;
use crate::classifier::classify_page;
use crate::config::LocatorConfig;
use crate::text_processing::clean_page;

/// Extract every page of the PDF at `path` and classify reference pages.
///
/// Fails with [`LocateError::Read`] when the file is missing, unreadable, or
/// not a PDF.
pub fn load_document(
    path: &Path,
    backend: &dyn PdfBackend,
    config: &LocatorConfig,
) -> Result<TargetDocument, LocateError> {
    let extracted = backend.extract_pages(path)?;
    let doc = build_document(Some(path), extracted, config);
    tracing::debug!(
        path = %path.display(),
        pages = doc.len(),
        reference_pages = ?doc.reference_page_numbers(),
        "document loaded"
    );
    Ok(doc)
}

/// Build a classified document from already extracted pages.
pub fn build_document(
    path: Option<&Path>,
    extracted: Vec<ExtractedPage>,
    config: &LocatorConfig,
) -> TargetDocument {
    let pages = extracted
        .into_iter()
        .enumerate()
        .map(|(i, raw)| {
            let raw = clean_page(raw);
            let page = Page::new(i + 1, raw.text, raw.words);
            let classification = classify_page(&page, config);
            if classification.is_reference {
                tracing::trace!(
                    page = page.page_number,
                    heading = ?classification.heading,
                    numbered_lines = classification.numbered_lines,
                    "reference page"
                );
                page.with_kind(PageKind::Reference)
            } else {
                page
            }
        })
        .collect();
    TargetDocument::new(path.map(Path::to_path_buf), pages)
}
