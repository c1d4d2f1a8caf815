use std::path::Path;

use thiserror::Error;

use crate::document::ExtractedPage;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to open PDF: {0}")]
    OpenError(String),
    #[error("failed to extract text: {0}")]
    ExtractionError(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for PDF text extraction backends.
///
/// Implementors return, for every page in order, the plain text and the word
/// tokens with their boxes in a shared top-left-origin coordinate space. The
/// citation search pipeline lives in `citeloc_parsing::CitationLocator`.
///
/// Implementations must open, fully extract, and release the file within a
/// single call.
pub trait PdfBackend: Send + Sync {
    fn extract_pages(&self, path: &Path) -> Result<Vec<ExtractedPage>, BackendError>;
}
