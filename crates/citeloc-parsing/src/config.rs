use citeloc_core::MatchStrategy;
use citeloc_core::config_file::LocatorSection;
use regex::Regex;

use crate::LocateError;

/// Reference-section headings recognized out of the box (case-insensitive).
pub const DEFAULT_HEADING_TERMS: &[&str] = &[
    "References",
    "Bibliography",
    "Literature Cited",
    "Works Cited",
    "Kaynakça",
    "Kaynaklar",
    "Referencias",
    "Bibliografía",
    "Références",
    "Bibliographie",
    "Literaturverzeichnis",
    "Riferimenti",
    "Bibliografia",
    "Referências",
];

/// Controls how a list of patterns/values is overridden from its defaults.
#[derive(Debug, Clone, Default)]
pub enum ListOverride<T> {
    /// Use the built-in defaults.
    #[default]
    Default,
    /// Completely replace the defaults with these values.
    Replace(Vec<T>),
    /// Append these values to the defaults.
    Extend(Vec<T>),
}

impl<T: Clone> ListOverride<T> {
    /// Resolve this override against the given defaults.
    pub fn resolve(&self, defaults: &[T]) -> Vec<T> {
        match self {
            ListOverride::Default => defaults.to_vec(),
            ListOverride::Replace(v) => v.clone(),
            ListOverride::Extend(v) => {
                let mut result = defaults.to_vec();
                result.extend(v.iter().cloned());
                result
            }
        }
    }
}

/// Configuration for the citation location pipeline.
///
/// `heading_re` is `None` when the built-in heading set is used.
/// Use [`LocatorConfigBuilder`] to construct a customized config.
#[derive(Debug, Clone)]
pub struct LocatorConfig {
    // ── classifier.rs ──
    pub(crate) heading_re: Option<Regex>,
    /// A page is a reference page when more than this many lines look like
    /// numbered entries.
    pub(crate) numbered_line_threshold: usize,

    // ── reference.rs ──
    /// Trailing pages searched when no page is classified as reference.
    pub(crate) fallback_page_count: usize,
    pub(crate) author_year_max_lines: usize,
    pub(crate) proximity_lookback_chars: usize,
    pub(crate) proximity_lookahead_chars: usize,
    pub(crate) year_tolerance: i32,
    pub(crate) strategies: Vec<MatchStrategy>,

    // ── bbox.rs ──
    /// List markers sit left of this x coordinate on reference pages.
    pub(crate) reference_margin: f32,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            heading_re: None,
            numbered_line_threshold: 5,
            fallback_page_count: 3,
            author_year_max_lines: 15,
            proximity_lookback_chars: 50,
            proximity_lookahead_chars: 300,
            year_tolerance: 1,
            strategies: MatchStrategy::DEFAULT_ORDER.to_vec(),
            reference_margin: 150.0,
        }
    }
}

impl LocatorConfig {
    pub fn strategies(&self) -> &[MatchStrategy] {
        &self.strategies
    }

    pub fn reference_margin(&self) -> f32 {
        self.reference_margin
    }
}

/// Build a case-insensitive alternation of heading terms, with inner
/// whitespace matching any run of whitespace.
pub(crate) fn heading_regex(terms: &[String]) -> Result<Regex, regex::Error> {
    let alternation = terms
        .iter()
        .map(|t| {
            t.split_whitespace()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"\s+")
        })
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{alternation})\b"))
}

/// Builder for [`LocatorConfig`].
#[derive(Debug, Clone, Default)]
pub struct LocatorConfigBuilder {
    heading_terms: ListOverride<String>,
    numbered_line_threshold: Option<usize>,
    fallback_page_count: Option<usize>,
    author_year_max_lines: Option<usize>,
    proximity_lookback_chars: Option<usize>,
    proximity_lookahead_chars: Option<usize>,
    year_tolerance: Option<i32>,
    strategies: ListOverride<MatchStrategy>,
    reference_margin: Option<f32>,
}

impl LocatorConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Headings ──

    pub fn set_heading_terms(mut self, terms: Vec<String>) -> Self {
        self.heading_terms = ListOverride::Replace(terms);
        self
    }

    pub fn add_heading_term(mut self, term: String) -> Self {
        match &mut self.heading_terms {
            ListOverride::Extend(v) | ListOverride::Replace(v) => v.push(term),
            ListOverride::Default => self.heading_terms = ListOverride::Extend(vec![term]),
        }
        self
    }

    // ── Scalars ──

    pub fn numbered_line_threshold(mut self, n: usize) -> Self {
        self.numbered_line_threshold = Some(n);
        self
    }

    pub fn fallback_page_count(mut self, n: usize) -> Self {
        self.fallback_page_count = Some(n);
        self
    }

    pub fn author_year_max_lines(mut self, n: usize) -> Self {
        self.author_year_max_lines = Some(n);
        self
    }

    pub fn proximity_window(mut self, lookback: usize, lookahead: usize) -> Self {
        self.proximity_lookback_chars = Some(lookback);
        self.proximity_lookahead_chars = Some(lookahead);
        self
    }

    pub fn year_tolerance(mut self, years: i32) -> Self {
        self.year_tolerance = Some(years);
        self
    }

    pub fn reference_margin(mut self, x: f32) -> Self {
        self.reference_margin = Some(x);
        self
    }

    // ── Strategies ──

    /// Replace the strategy order. Strategies left out are disabled.
    pub fn strategies(mut self, strategies: Vec<MatchStrategy>) -> Self {
        self.strategies = ListOverride::Replace(strategies);
        self
    }

    /// Apply a `[locator]` section from a config file. Values already set on
    /// the builder are overwritten.
    pub fn apply_file(mut self, section: &LocatorSection) -> Result<Self, LocateError> {
        if let Some(terms) = &section.heading_terms {
            for term in terms {
                self = self.add_heading_term(term.clone());
            }
        }
        if let Some(names) = &section.strategies {
            let parsed = names
                .iter()
                .map(|n| MatchStrategy::parse(n).ok_or_else(|| LocateError::UnknownStrategy(n.clone())))
                .collect::<Result<Vec<_>, _>>()?;
            self = self.strategies(parsed);
        }
        self.numbered_line_threshold = section
            .numbered_line_threshold
            .or(self.numbered_line_threshold);
        self.fallback_page_count = section.fallback_page_count.or(self.fallback_page_count);
        self.author_year_max_lines = section.author_year_max_lines.or(self.author_year_max_lines);
        self.proximity_lookback_chars = section
            .proximity_lookback_chars
            .or(self.proximity_lookback_chars);
        self.proximity_lookahead_chars = section
            .proximity_lookahead_chars
            .or(self.proximity_lookahead_chars);
        self.year_tolerance = section.year_tolerance.or(self.year_tolerance);
        self.reference_margin = section.reference_margin.or(self.reference_margin);
        Ok(self)
    }

    /// Compile heading terms and produce a [`LocatorConfig`].
    pub fn build(self) -> Result<LocatorConfig, LocateError> {
        let defaults = LocatorConfig::default();

        let heading_re = match &self.heading_terms {
            ListOverride::Default => None,
            other => {
                let builtin: Vec<String> =
                    DEFAULT_HEADING_TERMS.iter().map(|s| s.to_string()).collect();
                Some(heading_regex(&other.resolve(&builtin))?)
            }
        };

        let mut strategies = Vec::new();
        for s in self.strategies.resolve(&MatchStrategy::DEFAULT_ORDER) {
            if !strategies.contains(&s) {
                strategies.push(s);
            }
        }

        Ok(LocatorConfig {
            heading_re,
            numbered_line_threshold: self
                .numbered_line_threshold
                .unwrap_or(defaults.numbered_line_threshold),
            fallback_page_count: self
                .fallback_page_count
                .unwrap_or(defaults.fallback_page_count),
            author_year_max_lines: self
                .author_year_max_lines
                .unwrap_or(defaults.author_year_max_lines),
            proximity_lookback_chars: self
                .proximity_lookback_chars
                .unwrap_or(defaults.proximity_lookback_chars),
            proximity_lookahead_chars: self
                .proximity_lookahead_chars
                .unwrap_or(defaults.proximity_lookahead_chars),
            year_tolerance: self.year_tolerance.unwrap_or(defaults.year_tolerance).max(0),
            strategies,
            reference_margin: self.reference_margin.unwrap_or(defaults.reference_margin),
        })
    }
}
