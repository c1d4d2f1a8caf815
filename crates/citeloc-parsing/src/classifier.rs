//! Reference-page classification.
//!
//! A page belongs to the bibliography when it carries a reference-section
//! heading, or when enough of its lines look like numbered list entries.

use citeloc_core::Page;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::{DEFAULT_HEADING_TERMS, LocatorConfig, heading_regex};

static DEFAULT_HEADING_RE: Lazy<Regex> = Lazy::new(|| {
    let terms: Vec<String> = DEFAULT_HEADING_TERMS.iter().map(|s| s.to_string()).collect();
    heading_regex(&terms).unwrap()
});

/// `[12] ...` or `12. Surname ...` at the start of a line.
static NUMBERED_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[ \t]*(?:\[\d+\]|\d+\.[ \t]+\p{Lu}\p{Ll}+)").unwrap());

/// Why a page was (or was not) classified as a reference page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageClassification {
    pub page_number: usize,
    /// The heading text that matched, as it appears on the page.
    pub heading: Option<String>,
    pub numbered_lines: usize,
    pub is_reference: bool,
}

/// Classify one page. Pure function of the page text.
pub fn classify_page(page: &Page, config: &LocatorConfig) -> PageClassification {
    let heading_re = config.heading_re.as_ref().unwrap_or(&*DEFAULT_HEADING_RE);
    let heading = heading_re.find(&page.text).map(|m| m.as_str().to_string());
    let numbered_lines = count_numbered_lines(&page.text);
    let is_reference = heading.is_some() || numbered_lines > config.numbered_line_threshold;
    PageClassification {
        page_number: page.page_number,
        heading,
        numbered_lines,
        is_reference,
    }
}

pub fn is_reference_page(page: &Page, config: &LocatorConfig) -> bool {
    classify_page(page, config).is_reference
}

pub(crate) fn count_numbered_lines(text: &str) -> usize {
    text.lines().filter(|l| NUMBERED_LINE_RE.is_match(l)).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LocatorConfigBuilder;

    fn page(text: &str) -> Page {
        Page::new(1, text, vec![])
    }

    fn numbered(n: usize) -> String {
        (1..=n)
            .map(|i| format!("{i}. Smith A. Some title {i}. Journal. 2020."))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_heading_detected_case_insensitive() {
        let config = LocatorConfig::default();
        assert!(is_reference_page(&page("Some text\nREFERENCES\n"), &config));
        assert!(is_reference_page(&page("Kaynakça"), &config));
        assert!(is_reference_page(&page("Literature   Cited"), &config));
        assert!(is_reference_page(&page("Literaturverzeichnis"), &config));
    }

    #[test]
    fn test_heading_requires_word_boundary() {
        let config = LocatorConfig::default();
        let c = classify_page(&page("Cross-referencesX are discussed"), &config);
        assert!(c.heading.is_none());
        assert!(!c.is_reference);
    }

    #[test]
    fn test_six_numbered_lines_is_reference() {
        let config = LocatorConfig::default();
        let c = classify_page(&page(&numbered(6)), &config);
        assert_eq!(c.numbered_lines, 6);
        assert!(c.is_reference);
    }

    #[test]
    fn test_four_numbered_lines_is_not_reference() {
        let config = LocatorConfig::default();
        let c = classify_page(&page(&numbered(4)), &config);
        assert_eq!(c.numbered_lines, 4);
        assert!(!c.is_reference);
    }

    #[test]
    fn test_bracketed_lines_counted() {
        let text = (1..=7)
            .map(|i| format!("  [{i}] whatever follows"))
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(count_numbered_lines(&text), 7);
    }

    #[test]
    fn test_numbers_mid_line_not_counted() {
        assert_eq!(count_numbered_lines("see 3. Results and 4. Discussion"), 0);
        assert_eq!(count_numbered_lines("3.5 Results"), 0);
    }

    #[test]
    fn test_threshold_configurable() {
        let config = LocatorConfigBuilder::new()
            .numbered_line_threshold(3)
            .build()
            .unwrap();
        assert!(is_reference_page(&page(&numbered(4)), &config));
    }

    #[test]
    fn test_custom_heading_term() {
        let config = LocatorConfigBuilder::new()
            .add_heading_term("Kaynak Listesi".into())
            .build()
            .unwrap();
        assert!(is_reference_page(&page("KAYNAK LISTESI"), &config));
    }
}
