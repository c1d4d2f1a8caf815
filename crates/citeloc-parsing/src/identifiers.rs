//! DOI of the citing document itself, read from its first pages.

use citeloc_core::TargetDocument;
use once_cell::sync::Lazy;
use regex::Regex;

/// How many leading pages are searched.
pub const DOI_SEARCH_PAGES: usize = 3;

/// Which pattern produced a [`DocumentDoi`]. Declaration order is the
/// order patterns are tried on each page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoiSource {
    /// `doi: 10.xxxx/...`
    Prefixed,
    /// `https://doi.org/10.xxxx/...`
    DoiOrgUrl,
    /// `https://dx.doi.org/10.xxxx/...`
    DxDoiOrgUrl,
    /// `10.xxxx/...` on its own.
    Bare,
}

impl DoiSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DoiSource::Prefixed => "doi_prefix",
            DoiSource::DoiOrgUrl => "doi_org_url",
            DoiSource::DxDoiOrgUrl => "dx_doi_org_url",
            DoiSource::Bare => "bare",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentDoi {
    /// Lowercased, trailing punctuation removed.
    pub doi: String,
    pub page_number: usize,
    pub source: DoiSource,
}

static DOI_PATTERNS: Lazy<Vec<(DoiSource, Regex)>> = Lazy::new(|| {
    vec![
        (
            DoiSource::Prefixed,
            Regex::new(r"(?i)doi\s*[:.]?\s*(10\.\d{4,}/[^\s\]>)]+)").unwrap(),
        ),
        (
            DoiSource::DoiOrgUrl,
            Regex::new(r"(?i)https?://doi\.org/(10\.\d{4,}/[^\s\]>)]+)").unwrap(),
        ),
        (
            DoiSource::DxDoiOrgUrl,
            Regex::new(r"(?i)https?://dx\.doi\.org/(10\.\d{4,}/[^\s\]>)]+)").unwrap(),
        ),
        (
            DoiSource::Bare,
            Regex::new(r"(?i)\b(10\.\d{4,}/[^\s\]>),]+)").unwrap(),
        ),
    ]
});

/// Strip trailing sentence punctuation and lowercase.
pub fn clean_doi(doi: &str) -> String {
    doi.trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | ':') || c.is_whitespace())
        .to_lowercase()
}

/// First DOI found on the first pages of `doc`.
///
/// Pages are visited in order; on each page the patterns are tried in
/// [`DoiSource`] order and the longest match of the first pattern that hits
/// is kept.
pub fn extract_document_doi(doc: &TargetDocument) -> Option<DocumentDoi> {
    for page in doc.pages().iter().take(DOI_SEARCH_PAGES) {
        for (source, re) in DOI_PATTERNS.iter() {
            let longest = re
                .captures_iter(&page.text)
                .filter_map(|c| c.get(1))
                .map(|m| m.as_str())
                .max_by_key(|m| m.len());
            if let Some(raw) = longest {
                let doi = clean_doi(raw);
                tracing::debug!(page = page.page_number, source = source.as_str(), %doi, "document DOI");
                return Some(DocumentDoi {
                    doi,
                    page_number: page.page_number,
                    source: *source,
                });
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use citeloc_core::Page;

    fn doc(texts: &[&str]) -> TargetDocument {
        TargetDocument::new(
            None,
            texts
                .iter()
                .enumerate()
                .map(|(i, t)| Page::new(i + 1, *t, vec![]))
                .collect(),
        )
    }

    #[test]
    fn test_clean_doi() {
        assert_eq!(clean_doi("10.1186/S12903-024-05384-2."), "10.1186/s12903-024-05384-2");
        assert_eq!(clean_doi("10.1000/abc;,"), "10.1000/abc");
    }

    #[test]
    fn test_prefixed_doi() {
        let d = extract_document_doi(&doc(&["Title\nDOI: 10.1186/S12903-024-05384-2.\n"])).unwrap();
        assert_eq!(d.doi, "10.1186/s12903-024-05384-2");
        assert_eq!(d.source, DoiSource::Prefixed);
        assert_eq!(d.page_number, 1);
    }

    #[test]
    fn test_url_doi() {
        let d = extract_document_doi(&doc(&["see https://doi.org/10.1016/j.dental.2020.01.001 for"]))
            .unwrap();
        assert_eq!(d.doi, "10.1016/j.dental.2020.01.001");
        assert_eq!(d.source, DoiSource::DoiOrgUrl);
    }

    #[test]
    fn test_bare_doi_longest_wins() {
        let d = extract_document_doi(&doc(&["10.1000/ab and 10.1000/abcdef, end"])).unwrap();
        assert_eq!(d.doi, "10.1000/abcdef");
        assert_eq!(d.source, DoiSource::Bare);
    }

    #[test]
    fn test_only_first_three_pages() {
        let d = doc(&["a", "b", "c", "doi:10.1000/late"]);
        assert_eq!(extract_document_doi(&d), None);
        let d = doc(&["a", "b", "doi:10.1000/third"]);
        assert_eq!(extract_document_doi(&d).map(|d| d.page_number), Some(3));
    }
}
