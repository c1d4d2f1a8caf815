//! Bibliography entry lookup.
//!
//! Strategies run in the configured order; within a strategy, pages are
//! tried in document order. The first hit wins.

use citeloc_core::text::{ceil_char_boundary, compact_lowercase, floor_char_boundary, fold_diacritics};
use citeloc_core::{MatchStrategy, Page, ReferenceMatch, SourcePublication, TargetDocument};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::LocateError;
use crate::config::LocatorConfig;

/// `N.` at line start; the caller checks what follows the dot.
static DOTTED_START_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d+)\.").unwrap());

/// A line holding only a number, optionally followed by a dot.
static BARE_NUMBER_LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\d+)\.?\s*$").unwrap());

/// `[N]` at line start.
static BRACKET_START_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\[(\d+)\]").unwrap());

/// Line-initial `N.` inside a whole page.
static ENTRY_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*(\d+)[ \t]*\.").unwrap());

/// Start of the next numbered entry.
static NEXT_ENTRY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\d+[ \t]*\.\s").unwrap());

/// Trailing `N.` at the end of a look-back window.
static TRAILING_NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*\.\s*$").unwrap());

/// Normalized search inputs derived from a [`SourcePublication`].
#[derive(Debug, Clone)]
pub struct ReferenceQuery {
    /// Whitespace-free, lowercased DOI.
    pub doi: Option<String>,
    /// Folded first-author surname.
    pub surname: Option<String>,
    pub year: Option<i32>,
    year_re: Option<Regex>,
}

impl ReferenceQuery {
    pub fn new(publication: &SourcePublication, config: &LocatorConfig) -> Result<Self, LocateError> {
        let surname = publication
            .first_author_surname()
            .map(|s| fold_diacritics(&s))
            .filter(|s| !s.is_empty());
        let year_re = match publication.year {
            Some(year) => Some(year_regex(year, config.year_tolerance)?),
            None => None,
        };
        Ok(Self {
            doi: publication.normalized_doi(),
            surname,
            year: publication.year,
            year_re,
        })
    }

    fn year_end_in(&self, text: &str) -> Option<usize> {
        let re = self.year_re.as_ref()?;
        re.captures(text).and_then(|c| c.get(1)).map(|m| m.end())
    }

    fn has_year_in(&self, text: &str) -> bool {
        match &self.year_re {
            Some(re) => re.is_match(text),
            None => true,
        }
    }
}

/// `year`, then the neighbouring years out to `tolerance`, as a standalone
/// number (not part of a longer digit run).
fn year_regex(year: i32, tolerance: i32) -> Result<Regex, regex::Error> {
    let mut years = vec![year.to_string()];
    for d in 1..=tolerance.max(0) {
        years.push((year - d).to_string());
        years.push((year + d).to_string());
    }
    Regex::new(&format!(r"(?:^|\D)({})(?:\D|$)", years.join("|")))
}

/// Pages searched for the entry: classified reference pages, or the trailing
/// pages of the document when none were classified.
pub fn search_pages<'a>(doc: &'a TargetDocument, config: &LocatorConfig) -> Vec<&'a Page> {
    let reference: Vec<&Page> = doc.reference_pages().collect();
    if !reference.is_empty() {
        return reference;
    }
    let skip = doc.len().saturating_sub(config.fallback_page_count);
    doc.pages().iter().skip(skip).collect()
}

/// Find the bibliography entry for `query`. `None` when no strategy matches.
pub fn locate_reference(
    query: &ReferenceQuery,
    doc: &TargetDocument,
    config: &LocatorConfig,
) -> Option<ReferenceMatch> {
    let pages = search_pages(doc, config);
    tracing::debug!(
        pages = ?pages.iter().map(|p| p.page_number).collect::<Vec<_>>(),
        "searching for reference entry"
    );

    for &strategy in &config.strategies {
        if !strategy_applies(strategy, query) {
            tracing::trace!(%strategy, "strategy disabled for this query");
            continue;
        }
        for page in &pages {
            let found = match strategy {
                MatchStrategy::Doi => match_doi(query, page, config),
                MatchStrategy::AuthorYear => match_author_year(query, page, config),
                MatchStrategy::Proximity => match_proximity(query, page, config),
            };
            if let Some(entry_number) = found {
                tracing::debug!(%strategy, page = page.page_number, entry_number, "reference entry found");
                return Some(ReferenceMatch {
                    entry_number,
                    page_number: page.page_number,
                    strategy,
                });
            }
        }
    }
    None
}

fn strategy_applies(strategy: MatchStrategy, query: &ReferenceQuery) -> bool {
    match strategy {
        MatchStrategy::Doi => query.doi.is_some(),
        MatchStrategy::AuthorYear => query.surname.is_some() && query.year.is_some(),
        MatchStrategy::Proximity => query.surname.is_some(),
    }
}

// ── DOI ──

/// Find the DOI on the page, then walk back from its line to the number
/// that opens the entry.
///
/// The author line decides first: `N. Surname ...`, or a bare `N` line just
/// above it. Only without a usable author line does the first entry-start
/// line met walking back count, and then only lines at or above the author
/// line, so wrapped page ranges between author and DOI are never taken.
pub(crate) fn match_doi(query: &ReferenceQuery, page: &Page, config: &LocatorConfig) -> Option<u32> {
    let doi = query.doi.as_deref()?;
    let lines: Vec<&str> = page.text.split('\n').collect();

    // Compact text with the source line of every byte, so a DOI broken
    // across lines still maps back to where it starts.
    let mut compact = String::with_capacity(page.text.len());
    let mut line_of = Vec::with_capacity(page.text.len());
    for (i, line) in lines.iter().enumerate() {
        for c in compact_lowercase(line).chars() {
            compact.push(c);
            line_of.extend(std::iter::repeat_n(i, c.len_utf8()));
        }
    }

    let pos = compact.find(doi)?;
    let doi_line = line_of[pos];
    tracing::trace!(page = page.page_number, line = doi_line, "DOI found on page");

    let lookback = config.author_year_max_lines.max(1);
    let first = doi_line.saturating_sub(lookback - 1);

    let author_lines: Vec<usize> = match &query.surname {
        Some(surname) => (first..=doi_line)
            .rev()
            .filter(|&i| fold_diacritics(lines[i]).contains(surname.as_str()))
            .collect(),
        None => vec![],
    };
    for &i in &author_lines {
        if let Some(n) = author_line_number(&lines, i) {
            tracing::trace!(page = page.page_number, line = i, entry = n, "entry number from author line");
            return Some(n);
        }
    }

    let start = author_lines.first().copied().unwrap_or(doi_line);
    (first..=start).rev().find_map(|i| entry_start_number(lines[i]))
}

/// Rules for a line holding the surname: `N.` opening that line, else a
/// line above it that holds only a number.
fn author_line_number(lines: &[&str], i: usize) -> Option<u32> {
    dotted_entry_number(lines[i]).or_else(|| {
        i.checked_sub(1)
            .and_then(|prev| bare_number_line(lines[prev]))
    })
}

/// `N.` at line start where the next non-space character is not a digit.
fn dotted_entry_number(line: &str) -> Option<u32> {
    let caps = DOTTED_START_RE.captures(line)?;
    let end = caps.get(0)?.end();
    if line[end..].trim_start().starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    caps[1].parse().ok()
}

fn bare_number_line(line: &str) -> Option<u32> {
    BARE_NUMBER_LINE_RE.captures(line)?[1].parse().ok()
}

/// Number opening a bibliography entry: `N.`, `[N]`, or a number alone on its
/// line. Four-digit values are years, not entry numbers.
fn entry_start_number(line: &str) -> Option<u32> {
    let n = BRACKET_START_RE
        .captures(line)
        .and_then(|c| c[1].parse().ok())
        .or_else(|| dotted_entry_number(line))
        .or_else(|| bare_number_line(line))?;
    (n < 1000).then_some(n)
}

// ── Author + year ──

/// Line-initial `N.` followed, within the same entry, by the surname and
/// then by the year, all within `author_year_max_lines` lines.
pub(crate) fn match_author_year(
    query: &ReferenceQuery,
    page: &Page,
    config: &LocatorConfig,
) -> Option<u32> {
    let surname = query.surname.as_deref()?;
    let folded = fold_diacritics(&page.text);

    for caps in ENTRY_MARKER_RE.captures_iter(&folded) {
        let (Some(marker), Some(number)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let rest = &folded[marker.end()..];
        if rest.trim_start().starts_with(|c: char| c.is_ascii_digit()) {
            continue;
        }

        let boundary = NEXT_ENTRY_RE.find(rest).map_or(rest.len(), |m| m.start());
        let Some(surname_at) = rest.find(surname) else {
            continue;
        };
        if surname_at >= boundary {
            continue;
        }

        let after_surname = surname_at + surname.len();
        let Some(year_end) = query.year_end_in(&rest[after_surname..boundary]) else {
            continue;
        };
        let span = &folded[marker.start()..marker.end() + after_surname + year_end];
        if span.matches('\n').count() >= config.author_year_max_lines {
            tracing::trace!(page = page.page_number, "author+year span too long");
            continue;
        }
        if let Ok(n) = number.as_str().parse() {
            return Some(n);
        }
    }
    None
}

// ── Proximity ──

/// Every occurrence of the surname preceded, within a short window, by a
/// trailing `N.` and followed, within a longer window, by the year.
pub(crate) fn match_proximity(
    query: &ReferenceQuery,
    page: &Page,
    config: &LocatorConfig,
) -> Option<u32> {
    let surname = query.surname.as_deref()?;
    let folded = fold_diacritics(&page.text);

    for (start, _) in folded.match_indices(surname) {
        let window_start = floor_char_boundary(&folded, start.saturating_sub(config.proximity_lookback_chars));
        let before = folded[window_start..start].trim();
        let Some(caps) = TRAILING_NUMBER_RE.captures(before) else {
            continue;
        };
        let Ok(n) = caps[1].parse::<u32>() else {
            continue;
        };
        let window_end = ceil_char_boundary(&folded, start + config.proximity_lookahead_chars);
        if query.has_year_in(&folded[start..window_end]) {
            return Some(n);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LocatorConfigBuilder;
    use citeloc_core::PageKind;

    fn publication(year: Option<i32>) -> SourcePublication {
        SourcePublication {
            title: "Mechanical analysis of restorations".into(),
            doi: Some("10.1186/s12903-024-05384-2".into()),
            authors: vec!["Buse Cebi Gul".into()],
            year,
        }
    }

    fn query(year: Option<i32>) -> ReferenceQuery {
        ReferenceQuery::new(&publication(year), &LocatorConfig::default()).unwrap()
    }

    fn page(text: &str) -> Page {
        Page::new(9, text, vec![]).with_kind(PageKind::Reference)
    }

    #[test]
    fn test_query_preparation() {
        let q = query(Some(2025));
        assert_eq!(q.doi.as_deref(), Some("10.1186/s12903-024-05384-2"));
        assert_eq!(q.surname.as_deref(), Some("gul"));
        assert_eq!(q.year, Some(2025));
    }

    #[test]
    fn test_query_folds_turkish_surname() {
        let p = SourcePublication {
            authors: vec!["Işık, A.".into()],
            ..publication(Some(2020))
        };
        let q = ReferenceQuery::new(&p, &LocatorConfig::default()).unwrap();
        assert_eq!(q.surname.as_deref(), Some("isik"));
    }

    #[test]
    fn test_year_regex_tolerance() {
        let re = year_regex(2025, 1).unwrap();
        assert!(re.is_match("J Dent. 2024;12"));
        assert!(re.is_match("(2026)"));
        assert!(re.is_match("2025"));
        assert!(!re.is_match("2023"));
        assert!(!re.is_match("2027"));
        assert!(!re.is_match("120251"));
    }

    #[test]
    fn test_doi_number_on_previous_line() {
        let p = page(
            "6. Smith J. Other work. 2019.\n7.\nGul B, Cebi A. Mechanical analysis. BMC Oral Health. \
             2025;25:1. https://doi.org/10.1186/s12903-024-\n05384-2\n8. Doe J. Unrelated. 2021.",
        );
        assert_eq!(match_doi(&query(Some(2025)), &p, &LocatorConfig::default()), Some(7));
    }

    #[test]
    fn test_doi_number_on_author_line() {
        let p = page("12. Gul B. Mechanical analysis.\nBMC Oral Health. 2025.\ndoi:10.1186/S12903-024-05384-2");
        assert_eq!(match_doi(&query(None), &p, &LocatorConfig::default()), Some(12));
    }

    #[test]
    fn test_doi_wrapped_page_number_line_ignored() {
        let p = page(
            "7. Gul B, Cebi A. Mechanical analysis. BMC Oral Health. 2025;25:\n112.\n\
             https://doi.org/10.1186/s12903-024-05384-2",
        );
        assert_eq!(match_doi(&query(Some(2025)), &p, &LocatorConfig::default()), Some(7));
    }

    #[test]
    fn test_doi_line_opening_with_page_range_ignored() {
        let p = page(
            "7. Gul B, Cebi A. Mechanical analysis. BMC Oral Health. 2025;25:34-\n\
             45. https://doi.org/10.1186/s12903-024-05384-2",
        );
        assert_eq!(match_doi(&query(Some(2025)), &p, &LocatorConfig::default()), Some(7));
    }

    #[test]
    fn test_doi_number_directly_above_doi_line() {
        let p = page("6. Smith J. Other work. 2019.\n7.\n10.1186/s12903-024-05384-2");
        assert_eq!(match_doi(&query(Some(2025)), &p, &LocatorConfig::default()), Some(7));
    }

    #[test]
    fn test_doi_entry_start_not_below_author_line() {
        // Author line without a number: the entry start is looked for above it.
        let p = page("[7]\nGul B, Cebi A. Mechanical analysis.\n112.\n10.1186/s12903-024-05384-2");
        assert_eq!(match_doi(&query(Some(2025)), &p, &LocatorConfig::default()), Some(7));
    }

    #[test]
    fn test_doi_without_author_uses_entry_start() {
        let p = SourcePublication {
            authors: vec![],
            ..publication(None)
        };
        let q = ReferenceQuery::new(&p, &LocatorConfig::default()).unwrap();
        let pg = page("[4] Someone. Title.\n[5] Nobody. Title.\nhttps://doi.org/10.1186/s12903-024-05384-2");
        assert_eq!(match_doi(&q, &pg, &LocatorConfig::default()), Some(5));
    }

    #[test]
    fn test_doi_entry_start_ignores_year_lines() {
        let p = page("3. Gul B. Title.\n2025. doi: 10.1186/s12903-024-05384-2");
        assert_eq!(match_doi(&query(None), &p, &LocatorConfig::default()), Some(3));
    }

    #[test]
    fn test_doi_absent_from_page() {
        let p = page("1. Gul B. Something else. 2025.");
        assert_eq!(match_doi(&query(Some(2025)), &p, &LocatorConfig::default()), None);
    }

    #[test]
    fn test_author_year_match() {
        let p = page("5. Smith J. Title. 2019.\n6. Gül B, Cebi A. Mechanical analysis.\nBMC Oral Health. 2025;25:1.\n7. Doe J. 2020.");
        assert_eq!(
            match_author_year(&query(Some(2025)), &p, &LocatorConfig::default()),
            Some(6)
        );
    }

    #[test]
    fn test_author_year_tolerance() {
        let text = "6. Gul B. Mechanical analysis. BMC Oral Health. 2024.";
        let config = LocatorConfig::default();
        assert_eq!(match_author_year(&query(Some(2025)), &page(text), &config), Some(6));
        assert_eq!(match_author_year(&query(Some(2022)), &page(text), &config), None);
        assert_eq!(match_author_year(&query(Some(2026)), &page(text), &config), None);
    }

    #[test]
    fn test_author_year_does_not_cross_entries() {
        let p = page("5. Smith J. Title. 2025.\n6. Gul B. Mechanical analysis. 2025.");
        assert_eq!(
            match_author_year(&query(Some(2025)), &p, &LocatorConfig::default()),
            Some(6)
        );
    }

    #[test]
    fn test_author_year_year_must_be_in_same_entry() {
        let p = page("6. Gul B. Mechanical analysis. In press.\n7. Doe J. Other. 2025.");
        assert_eq!(
            match_author_year(&query(Some(2025)), &p, &LocatorConfig::default()),
            None
        );
    }

    #[test]
    fn test_author_year_skips_decimal_marker() {
        let p = page("21.5 Gul B. Mechanical analysis. 2025.");
        assert_eq!(
            match_author_year(&query(Some(2025)), &p, &LocatorConfig::default()),
            None
        );
    }

    #[test]
    fn test_author_year_line_limit() {
        let filler = "x\n".repeat(20);
        let p = page(&format!("6. Gul B. Mechanical analysis.\n{filler}2025."));
        assert_eq!(
            match_author_year(&query(Some(2025)), &p, &LocatorConfig::default()),
            None
        );
    }

    #[test]
    fn test_proximity_match() {
        let p = page("garbled 14 . Gul B Mechanical analysis BMC 2025 more");
        assert_eq!(
            match_proximity(&query(Some(2025)), &p, &LocatorConfig::default()),
            Some(14)
        );
    }

    #[test]
    fn test_proximity_without_year_skips_year_check() {
        let p = page("14. Gul B Mechanical analysis");
        assert_eq!(match_proximity(&query(None), &p, &LocatorConfig::default()), Some(14));
    }

    #[test]
    fn test_proximity_year_out_of_window() {
        let p = page(&format!("14. Gul B {} 2025", "x".repeat(400)));
        assert_eq!(match_proximity(&query(Some(2025)), &p, &LocatorConfig::default()), None);
    }

    #[test]
    fn test_search_space_falls_back_to_last_pages() {
        let pages = (1..=5).map(|i| Page::new(i, format!("page {i}"), vec![])).collect();
        let doc = TargetDocument::new(None, pages);
        let numbers: Vec<usize> = search_pages(&doc, &LocatorConfig::default())
            .iter()
            .map(|p| p.page_number)
            .collect();
        assert_eq!(numbers, vec![3, 4, 5]);
    }

    #[test]
    fn test_search_space_short_document() {
        let doc = TargetDocument::new(None, vec![Page::new(1, "only", vec![])]);
        assert_eq!(search_pages(&doc, &LocatorConfig::default()).len(), 1);
    }

    #[test]
    fn test_strategy_order_respected() {
        // DOI says entry 7, author+year says entry 3.
        let p = page("3. Gul B. Earlier paper. 2025.\n7.\nGul B. Mechanical. 10.1186/s12903-024-05384-2");
        let doc = TargetDocument::new(None, vec![p]);
        let q = query(Some(2025));

        let default = locate_reference(&q, &doc, &LocatorConfig::default()).unwrap();
        assert_eq!(default.entry_number, 7);
        assert_eq!(default.strategy, MatchStrategy::Doi);

        let config = LocatorConfigBuilder::new()
            .strategies(vec![MatchStrategy::AuthorYear])
            .build()
            .unwrap();
        let author_first = locate_reference(&q, &doc, &config).unwrap();
        assert_eq!(author_first.entry_number, 3);
        assert_eq!(author_first.strategy, MatchStrategy::AuthorYear);
    }

    #[test]
    fn test_not_found() {
        let doc = TargetDocument::new(None, vec![page("1. Smith J. Nothing here. 2010.")]);
        assert_eq!(locate_reference(&query(Some(2025)), &doc, &LocatorConfig::default()), None);
    }
}
