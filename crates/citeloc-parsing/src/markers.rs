//! In-text citation marker scanning on body pages.

use citeloc_core::{CitationOccurrence, LocatorEvent, MarkerGrammar, ReferenceMatch, TargetDocument};
use regex::Regex;

use crate::LocateError;
use crate::bbox::{BoxTarget, PageContext, resolve_bbox};
use crate::config::LocatorConfig;

/// Grammars in priority order. A later grammar only runs when no earlier
/// one matched on any body page.
pub const GRAMMAR_ORDER: [MarkerGrammar; 2] =
    [MarkerGrammar::GroupedBracket, MarkerGrammar::BareNumber];

/// Pattern for citation number `n` under `grammar`.
///
/// Ranges are matched literally: `[10–13]` cites 10 and 13, not 11.
pub fn marker_regex(grammar: MarkerGrammar, n: u32) -> Result<Regex, regex::Error> {
    let pattern = match grammar {
        MarkerGrammar::GroupedBracket => {
            format!(r"\[(?:[^\]]*[,\s–-])?{n}(?:[,\s–-][^\]]*|\s*)?\]")
        }
        MarkerGrammar::BareNumber => format!(r"[.,;:)\s]{n}(?:[\s.,;:\[]|$)"),
    };
    Regex::new(&pattern)
}

/// Outcome of a marker scan.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerScan {
    /// Grammar that produced the occurrences; `None` when synthetic.
    pub grammar: Option<MarkerGrammar>,
    /// Ascending page order, one per page.
    pub occurrences: Vec<CitationOccurrence>,
}

impl MarkerScan {
    pub fn is_synthetic(&self) -> bool {
        self.grammar.is_none()
    }

    /// Pages where a real marker was found.
    pub fn marker_pages(&self) -> Vec<usize> {
        if self.is_synthetic() {
            return vec![];
        }
        self.occurrences.iter().map(|o| o.page_number).collect()
    }
}

/// Scan every non-reference page of `doc` for markers citing `reference`.
///
/// Falls back to a single box-less occurrence on the reference page when no
/// grammar matches anywhere. `progress` hears
/// [`LocatorEvent::BracketFallback`] as the bare-number grammar starts.
pub fn scan_markers(
    reference: &ReferenceMatch,
    doc: &TargetDocument,
    target: &BoxTarget,
    config: &LocatorConfig,
    progress: &dyn Fn(LocatorEvent),
) -> Result<MarkerScan, LocateError> {
    for grammar in GRAMMAR_ORDER {
        if grammar == MarkerGrammar::BareNumber {
            progress(LocatorEvent::BracketFallback);
        }
        let re = marker_regex(grammar, reference.entry_number)?;
        let occurrences: Vec<CitationOccurrence> = doc
            .body_pages()
            .filter(|page| re.is_match(&page.text))
            .map(|page| CitationOccurrence {
                page_number: page.page_number,
                bbox: resolve_bbox(page, PageContext::Body, target, config),
            })
            .collect();

        if !occurrences.is_empty() {
            tracing::debug!(
                %grammar,
                pages = ?occurrences.iter().map(|o| o.page_number).collect::<Vec<_>>(),
                "citation markers found"
            );
            return Ok(MarkerScan {
                grammar: Some(grammar),
                occurrences,
            });
        }
        tracing::debug!(%grammar, entry = reference.entry_number, "no markers");
    }

    Ok(MarkerScan {
        grammar: None,
        occurrences: vec![CitationOccurrence {
            page_number: reference.page_number,
            bbox: None,
        }],
    })
}
