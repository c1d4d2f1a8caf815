use std::borrow::Cow;
use std::path::{Path, PathBuf};

use crate::BoundingBox;

/// A word as laid out on the page.
#[derive(Debug, Clone, PartialEq)]
pub struct WordToken {
    pub text: String,
    pub bbox: BoundingBox,
}

impl WordToken {
    pub fn new(text: impl Into<String>, bbox: BoundingBox) -> Self {
        Self {
            text: text.into(),
            bbox,
        }
    }
}

/// Raw backend output for one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedPage {
    pub text: String,
    pub words: Vec<WordToken>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageKind {
    #[default]
    Body,
    Reference,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// 1-based.
    pub page_number: usize,
    pub text: String,
    pub words: Vec<WordToken>,
    pub kind: PageKind,
    pub has_citation: bool,
}

impl Page {
    pub fn new(page_number: usize, text: impl Into<String>, words: Vec<WordToken>) -> Self {
        Self {
            page_number,
            text: text.into(),
            words,
            kind: PageKind::Body,
            has_citation: false,
        }
    }

    pub fn with_kind(mut self, kind: PageKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn is_reference(&self) -> bool {
        self.kind == PageKind::Reference
    }
}

/// All pages of one citing PDF.
///
/// Never mutated in place: revisions go through [`with_reference_page`] and
/// [`with_citation_pages`], which only copy when something changes.
///
/// [`with_reference_page`]: TargetDocument::with_reference_page
/// [`with_citation_pages`]: TargetDocument::with_citation_pages
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TargetDocument {
    path: Option<PathBuf>,
    pages: Vec<Page>,
}

impl TargetDocument {
    pub fn new(path: Option<PathBuf>, pages: Vec<Page>) -> Self {
        Self { path, pages }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page(&self, page_number: usize) -> Option<&Page> {
        page_number
            .checked_sub(1)
            .and_then(|i| self.pages.get(i))
            .filter(|p| p.page_number == page_number)
            .or_else(|| self.pages.iter().find(|p| p.page_number == page_number))
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn reference_pages(&self) -> impl Iterator<Item = &Page> {
        self.pages.iter().filter(|p| p.is_reference())
    }

    pub fn body_pages(&self) -> impl Iterator<Item = &Page> {
        self.pages.iter().filter(|p| !p.is_reference())
    }

    pub fn reference_page_numbers(&self) -> Vec<usize> {
        self.reference_pages().map(|p| p.page_number).collect()
    }

    /// Document with `page_number` classified as a reference page.
    pub fn with_reference_page(&self, page_number: usize) -> Cow<'_, TargetDocument> {
        match self.page(page_number) {
            Some(page) if !page.is_reference() => {
                let mut updated = self.clone();
                for page in updated.pages.iter_mut() {
                    if page.page_number == page_number {
                        page.kind = PageKind::Reference;
                    }
                }
                Cow::Owned(updated)
            }
            _ => Cow::Borrowed(self),
        }
    }

    /// Document with the citation flag set on every page in `page_numbers`.
    pub fn with_citation_pages(&self, page_numbers: &[usize]) -> Cow<'_, TargetDocument> {
        let needs_update = self
            .pages
            .iter()
            .any(|p| !p.has_citation && page_numbers.contains(&p.page_number));
        if !needs_update {
            return Cow::Borrowed(self);
        }
        let mut updated = self.clone();
        for page in updated.pages.iter_mut() {
            if page_numbers.contains(&page.page_number) {
                page.has_citation = true;
            }
        }
        Cow::Owned(updated)
    }
}
