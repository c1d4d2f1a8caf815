use std::path::Path;

use citeloc_core::{BackendError, CitationLocationResult, PdfBackend, SourcePublication};
use thiserror::Error;

pub mod bbox;
pub mod classifier;
pub mod config;
pub mod extract;
pub mod identifiers;
pub mod locator;
pub mod markers;
pub mod reference;
pub mod text_processing;

pub use bbox::{BoxTarget, PageContext, TokenRule, resolve_bbox};
pub use classifier::{PageClassification, classify_page, is_reference_page};
pub use config::{ListOverride, LocatorConfig, LocatorConfigBuilder};
pub use extract::load_document;
pub use identifiers::{DocumentDoi, DoiSource, extract_document_doi};
pub use locator::{CitationLocator, DocumentAnalysis};
pub use markers::{MarkerScan, scan_markers};
pub use reference::{ReferenceQuery, locate_reference};

#[derive(Error, Debug)]
pub enum LocateError {
    #[error("cannot read document: {0}")]
    Read(#[from] BackendError),
    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
    #[error("unknown match strategy: {0}")]
    UnknownStrategy(String),
}

/// Locate `publication` in the PDF at `path` with default settings.
///
/// Pipeline:
/// 1. Extract page text and word boxes via `backend`
/// 2. Classify reference pages
/// 3. Find the bibliography entry (DOI, then author+year, then proximity)
/// 4. Scan body pages for citation markers of that entry
/// 5. Resolve bounding boxes for the entry and each marker
pub fn locate_citation(
    publication: &SourcePublication,
    pdf_path: &Path,
    backend: Box<dyn PdfBackend>,
) -> CitationLocationResult {
    CitationLocator::new(backend).locate_citation(publication, pdf_path)
}
