use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

pub mod backend;
pub mod batch;
pub mod config_file;
pub mod document;
pub mod text;

// Re-export for convenience
pub use backend::{BackendError, PdfBackend};
pub use batch::{BatchConfig, BatchEvent, BatchItem, BatchOutcome, DocumentLocator, locate_batch};
pub use document::{ExtractedPage, Page, PageKind, TargetDocument, WordToken};

/// The publication whose citations are being located in a citing document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePublication {
    pub title: String,
    pub doi: Option<String>,
    pub authors: Vec<String>,
    pub year: Option<i32>,
}

impl SourcePublication {
    /// DOI with all whitespace removed and lowercased. `None` when absent or blank.
    pub fn normalized_doi(&self) -> Option<String> {
        self.doi
            .as_deref()
            .map(text::compact_lowercase)
            .filter(|d| !d.is_empty())
    }

    /// Surname of the first listed author, if any.
    pub fn first_author_surname(&self) -> Option<String> {
        self.authors.first().and_then(|a| text::surname(a))
    }
}

/// Rectangle locating a token on a page, top-left origin.
///
/// Serialized as `[x0, top, x1, bottom]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BoundingBox {
    pub x0: f32,
    pub top: f32,
    pub x1: f32,
    pub bottom: f32,
}

impl BoundingBox {
    pub fn new(x0: f32, top: f32, x1: f32, bottom: f32) -> Self {
        Self { x0, top, x1, bottom }
    }

    /// Smallest box covering both `self` and `other`.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            x0: self.x0.min(other.x0),
            top: self.top.min(other.top),
            x1: self.x1.max(other.x1),
            bottom: self.bottom.max(other.bottom),
        }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }
}

impl From<[f32; 4]> for BoundingBox {
    fn from([x0, top, x1, bottom]: [f32; 4]) -> Self {
        Self { x0, top, x1, bottom }
    }
}

impl From<BoundingBox> for [f32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x0, b.top, b.x1, b.bottom]
    }
}

/// Strategy that resolved a bibliography entry. Declaration order is the
/// default evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    Doi,
    AuthorYear,
    Proximity,
}

impl MatchStrategy {
    pub const DEFAULT_ORDER: [MatchStrategy; 3] = [
        MatchStrategy::Doi,
        MatchStrategy::AuthorYear,
        MatchStrategy::Proximity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStrategy::Doi => "doi",
            MatchStrategy::AuthorYear => "author_year",
            MatchStrategy::Proximity => "proximity",
        }
    }

    /// Parse a config/CLI name (`doi`, `author_year`, `proximity`).
    pub fn parse(name: &str) -> Option<MatchStrategy> {
        match name.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "doi" => Some(MatchStrategy::Doi),
            "author_year" => Some(MatchStrategy::AuthorYear),
            "proximity" => Some(MatchStrategy::Proximity),
            _ => None,
        }
    }
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// In-text citation marker grammar, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerGrammar {
    /// `[12]`, `[3,12]`, `[10-13]`, `[10–13]`.
    GroupedBracket,
    /// Bare or superscript number next to punctuation. Over-matches.
    BareNumber,
}

impl fmt::Display for MarkerGrammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkerGrammar::GroupedBracket => f.write_str("bracket"),
            MarkerGrammar::BareNumber => f.write_str("bare number"),
        }
    }
}

/// A resolved bibliography entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceMatch {
    pub entry_number: u32,
    pub page_number: usize,
    pub strategy: MatchStrategy,
}

/// A page on which the entry is cited.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CitationOccurrence {
    pub page_number: usize,
    pub bbox: Option<BoundingBox>,
}

/// Overall outcome of one locate run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocateStatus {
    Located,
    ReferenceNotFound,
    ReadError,
}

/// Complete answer for one (publication, document) pair.
///
/// Failures never escape as errors: a document that could not be read
/// carries [`LocateStatus::ReadError`] and a message.
#[derive(Debug, Clone, PartialEq)]
pub struct CitationLocationResult {
    pub status: LocateStatus,
    pub reference: Option<ReferenceMatch>,
    pub reference_bbox: Option<BoundingBox>,
    pub occurrences: Vec<CitationOccurrence>,
    pub message: Option<String>,
}

impl CitationLocationResult {
    pub fn located(
        reference: ReferenceMatch,
        reference_bbox: Option<BoundingBox>,
        occurrences: Vec<CitationOccurrence>,
    ) -> Self {
        Self {
            status: LocateStatus::Located,
            reference: Some(reference),
            reference_bbox,
            occurrences,
            message: None,
        }
    }

    pub fn reference_not_found() -> Self {
        Self {
            status: LocateStatus::ReferenceNotFound,
            reference: None,
            reference_bbox: None,
            occurrences: vec![],
            message: None,
        }
    }

    pub fn read_error(message: impl Into<String>) -> Self {
        Self {
            status: LocateStatus::ReadError,
            reference: None,
            reference_bbox: None,
            occurrences: vec![],
            message: Some(message.into()),
        }
    }

    pub fn reference_page(&self) -> Option<usize> {
        self.reference.map(|r| r.page_number)
    }

    pub fn reference_number(&self) -> Option<u32> {
        self.reference.map(|r| r.entry_number)
    }

    /// Pages a citation dossier needs: the title page, every citation page
    /// and the reference page, sorted and deduplicated.
    ///
    /// Empty when no reference entry was found.
    pub fn required_pages(&self) -> Vec<usize> {
        let Some(reference) = self.reference else {
            return vec![];
        };
        let mut pages = vec![1];
        pages.extend(self.occurrences.iter().map(|o| o.page_number));
        pages.push(reference.page_number);
        pages.sort_unstable();
        pages.dedup();
        pages
    }
}

/// Flat wire shape of [`CitationLocationResult`].
#[derive(Serialize)]
struct CitationReport<'a> {
    status: LocateStatus,
    reference_page: Option<usize>,
    reference_number: Option<u32>,
    reference_strategy: Option<MatchStrategy>,
    reference_bbox: Option<BoundingBox>,
    occurrences: Vec<OccurrenceReport>,
    required_pages: Vec<usize>,
    message: Option<&'a str>,
}

#[derive(Serialize)]
struct OccurrenceReport {
    page: usize,
    bbox: Option<BoundingBox>,
}

impl Serialize for CitationLocationResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        CitationReport {
            status: self.status,
            reference_page: self.reference_page(),
            reference_number: self.reference_number(),
            reference_strategy: self.reference.map(|r| r.strategy),
            reference_bbox: self.reference_bbox,
            occurrences: self
                .occurrences
                .iter()
                .map(|o| OccurrenceReport {
                    page: o.page_number,
                    bbox: o.bbox,
                })
                .collect(),
            required_pages: self.required_pages(),
            message: self.message.as_deref(),
        }
        .serialize(serializer)
    }
}

/// Progress events emitted while locating citations in one document.
#[derive(Debug, Clone, PartialEq)]
pub enum LocatorEvent {
    DocumentLoaded {
        pages: usize,
        reference_pages: Vec<usize>,
    },
    ReadFailed {
        message: String,
    },
    ReferenceFound {
        reference: ReferenceMatch,
    },
    ReferenceNotFound,
    /// A page outside the classified reference section held the entry.
    PageReclassified {
        page_number: usize,
    },
    MarkerFound {
        page_number: usize,
        grammar: MarkerGrammar,
    },
    /// No bracketed marker anywhere; trying bare numbers.
    BracketFallback,
    /// No marker at all; the reference page stands in as the citation page.
    SyntheticOccurrence {
        page_number: usize,
    },
}
