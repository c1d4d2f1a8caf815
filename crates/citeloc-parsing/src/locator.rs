use std::borrow::Cow;
use std::path::Path;

use citeloc_core::{
    CitationLocationResult, DocumentLocator, LocatorEvent, PdfBackend, SourcePublication,
    TargetDocument,
};

use crate::LocateError;
use crate::bbox::{BoxTarget, PageContext, resolve_bbox};
use crate::config::LocatorConfig;
use crate::extract::load_document;
use crate::markers::scan_markers;
use crate::reference::{ReferenceQuery, locate_reference};

/// Result of analysing one document, plus the document as revised by the
/// analysis: the matched page re-classified as a reference page and every
/// page with a marker flagged as citing.
#[derive(Debug, Clone)]
pub struct DocumentAnalysis<'a> {
    pub result: CitationLocationResult,
    pub document: Cow<'a, TargetDocument>,
}

/// Runs extraction, classification, entry lookup, marker scanning and box
/// resolution for one (publication, document) pair.
pub struct CitationLocator {
    backend: Box<dyn PdfBackend>,
    config: LocatorConfig,
}

impl CitationLocator {
    pub fn new(backend: Box<dyn PdfBackend>) -> Self {
        Self {
            backend,
            config: LocatorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: LocatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    /// Extract and classify the PDF at `path`.
    pub fn load(&self, path: &Path) -> Result<TargetDocument, LocateError> {
        load_document(path, self.backend.as_ref(), &self.config)
    }

    pub fn locate_citation(
        &self,
        publication: &SourcePublication,
        path: &Path,
    ) -> CitationLocationResult {
        self.locate_citation_with_progress(publication, path, &|_| {})
    }

    /// Like [`locate_citation`](Self::locate_citation), reporting each step
    /// through `progress`.
    pub fn locate_citation_with_progress(
        &self,
        publication: &SourcePublication,
        path: &Path,
        progress: &dyn Fn(LocatorEvent),
    ) -> CitationLocationResult {
        let doc = match self.load(path) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot read document");
                let message = e.to_string();
                progress(LocatorEvent::ReadFailed {
                    message: message.clone(),
                });
                return CitationLocationResult::read_error(message);
            }
        };
        progress(LocatorEvent::DocumentLoaded {
            pages: doc.len(),
            reference_pages: doc.reference_page_numbers(),
        });
        self.analyze(publication, &doc, progress).result
    }

    /// Locate `publication` in an already loaded document.
    pub fn analyze<'a>(
        &self,
        publication: &SourcePublication,
        doc: &'a TargetDocument,
        progress: &dyn Fn(LocatorEvent),
    ) -> DocumentAnalysis<'a> {
        match self.try_analyze(publication, doc, progress) {
            Ok(analysis) => analysis,
            Err(e) => {
                tracing::error!(error = %e, "analysis failed");
                DocumentAnalysis {
                    result: CitationLocationResult::read_error(e.to_string()),
                    document: Cow::Borrowed(doc),
                }
            }
        }
    }

    fn try_analyze<'a>(
        &self,
        publication: &SourcePublication,
        doc: &'a TargetDocument,
        progress: &dyn Fn(LocatorEvent),
    ) -> Result<DocumentAnalysis<'a>, LocateError> {
        let query = ReferenceQuery::new(publication, &self.config)?;

        let Some(reference) = locate_reference(&query, doc, &self.config) else {
            tracing::info!(title = %publication.title, "reference entry not found");
            progress(LocatorEvent::ReferenceNotFound);
            return Ok(DocumentAnalysis {
                result: CitationLocationResult::reference_not_found(),
                document: Cow::Borrowed(doc),
            });
        };
        progress(LocatorEvent::ReferenceFound { reference });

        let reclassified = doc.with_reference_page(reference.page_number);
        if let Cow::Owned(_) = reclassified {
            tracing::debug!(page = reference.page_number, "page re-classified as reference");
            progress(LocatorEvent::PageReclassified {
                page_number: reference.page_number,
            });
        }

        let target = BoxTarget::new(Some(reference.entry_number), query.surname.as_deref());
        let reference_bbox = reclassified
            .page(reference.page_number)
            .and_then(|page| resolve_bbox(page, PageContext::ReferenceList, &target, &self.config));

        let scan = scan_markers(&reference, &reclassified, &target, &self.config, progress)?;
        match scan.grammar {
            Some(grammar) => {
                for occurrence in &scan.occurrences {
                    progress(LocatorEvent::MarkerFound {
                        page_number: occurrence.page_number,
                        grammar,
                    });
                }
            }
            None => {
                tracing::info!(page = reference.page_number, "no citation marker in body text");
                progress(LocatorEvent::SyntheticOccurrence {
                    page_number: reference.page_number,
                });
            }
        }

        let flagged = match reclassified.with_citation_pages(&scan.marker_pages()) {
            Cow::Owned(updated) => Some(updated),
            Cow::Borrowed(_) => None,
        };
        let document = match flagged {
            Some(updated) => Cow::Owned(updated),
            None => reclassified,
        };

        tracing::info!(
            entry = reference.entry_number,
            page = reference.page_number,
            strategy = %reference.strategy,
            occurrences = scan.occurrences.len(),
            "citation located"
        );
        Ok(DocumentAnalysis {
            result: CitationLocationResult::located(reference, reference_bbox, scan.occurrences),
            document,
        })
    }
}

impl DocumentLocator for CitationLocator {
    fn locate(
        &self,
        publication: &SourcePublication,
        path: &Path,
        progress: &dyn Fn(LocatorEvent),
    ) -> CitationLocationResult {
        self.locate_citation_with_progress(publication, path, progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citeloc_core::{BackendError, ExtractedPage, LocateStatus, Page, PageKind};
    use std::cell::RefCell;

    struct NoBackend;

    impl PdfBackend for NoBackend {
        fn extract_pages(&self, path: &Path) -> Result<Vec<ExtractedPage>, BackendError> {
            Err(BackendError::OpenError(format!("{} not found", path.display())))
        }
    }

    fn publication() -> SourcePublication {
        SourcePublication {
            title: "Mechanical analysis".into(),
            doi: None,
            authors: vec!["Gul, B.".into()],
            year: Some(2025),
        }
    }

    #[test]
    fn test_read_error_becomes_status() {
        let events = RefCell::new(vec![]);
        let result = CitationLocator::new(Box::new(NoBackend)).locate_citation_with_progress(
            &publication(),
            Path::new("gone.pdf"),
            &|e| events.borrow_mut().push(e),
        );
        assert_eq!(result.status, LocateStatus::ReadError);
        assert!(result.message.unwrap().contains("gone.pdf"));
        assert!(matches!(
            events.borrow().as_slice(),
            [LocatorEvent::ReadFailed { .. }]
        ));
    }

    #[test]
    fn test_analyze_reclassifies_fallback_page() {
        // No page classified: the trailing pages are searched and the hit is
        // re-classified.
        let doc = TargetDocument::new(
            None,
            vec![
                Page::new(1, "Intro cites [2] here.", vec![]),
                Page::new(2, "1. Smith J. Old. 2001.\n2. Gul B. Mechanical. 2025.", vec![]),
            ],
        );
        let locator = CitationLocator::new(Box::new(NoBackend));
        let analysis = locator.analyze(&publication(), &doc, &|_| {});

        assert_eq!(analysis.result.reference_number(), Some(2));
        assert_eq!(analysis.result.reference_page(), Some(2));
        assert_eq!(analysis.document.reference_page_numbers(), vec![2]);
        assert!(analysis.document.page(1).unwrap().has_citation);
        assert!(doc.reference_page_numbers().is_empty());
    }

    #[test]
    fn test_fallback_reported_before_synthetic_occurrence() {
        let doc = TargetDocument::new(
            None,
            vec![
                Page::new(1, "Intro without markers.", vec![]),
                Page::new(2, "References\n2. Gul B. Mechanical. 2025.", vec![])
                    .with_kind(PageKind::Reference),
            ],
        );
        let locator = CitationLocator::new(Box::new(NoBackend));
        let events = RefCell::new(vec![]);
        let analysis = locator.analyze(&publication(), &doc, &|e| events.borrow_mut().push(e));

        assert_eq!(analysis.result.occurrences[0].page_number, 2);
        let events = events.into_inner();
        assert!(matches!(events[0], LocatorEvent::ReferenceFound { .. }));
        assert_eq!(
            &events[1..],
            &[
                LocatorEvent::BracketFallback,
                LocatorEvent::SyntheticOccurrence { page_number: 2 },
            ]
        );
    }

    #[test]
    fn test_analyze_not_found_borrows_document() {
        let doc = TargetDocument::new(
            None,
            vec![Page::new(1, "References\n1. Smith J. 2001.", vec![]).with_kind(PageKind::Reference)],
        );
        let locator = CitationLocator::new(Box::new(NoBackend));
        let events = RefCell::new(vec![]);
        let analysis = locator.analyze(&publication(), &doc, &|e| events.borrow_mut().push(e));
        assert_eq!(analysis.result.status, LocateStatus::ReferenceNotFound);
        assert!(matches!(analysis.document, Cow::Borrowed(_)));
        assert_eq!(events.borrow().as_slice(), &[LocatorEvent::ReferenceNotFound]);
    }
}
