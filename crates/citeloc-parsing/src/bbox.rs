//! Word-level bounding boxes for entry numbers and citation markers.

use citeloc_core::text::fold_diacritics;
use citeloc_core::{BoundingBox, Page, WordToken};

use crate::config::LocatorConfig;

/// Where on the document a token is being looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageContext {
    /// In-text citation markers; every token is eligible.
    Body,
    /// A numbered bibliography: entry numbers sit at the left margin.
    ReferenceList,
}

/// What to look for: a number (entry or citation), a surname, or both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoxTarget {
    pub number: Option<u32>,
    /// Folded surname.
    pub surname: Option<String>,
}

impl BoxTarget {
    pub fn new(number: Option<u32>, surname: Option<&str>) -> Self {
        Self {
            number,
            surname: surname.map(fold_diacritics).filter(|s| !s.is_empty()),
        }
    }
}

/// Token-matching rules, tried in declaration order. Each rule scans every
/// eligible token before the next rule runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRule {
    /// `[N]` anywhere in the token.
    Bracketed,
    /// `N` once `[`, `]` and `,` are trimmed off (`[3,`, `12,`, `19]`).
    StrippedNumber,
    /// `N.` not part of a decimal (`12.`, `12.Gul`, but not `12.5`).
    DottedNumber,
    /// `N` followed by a separate `.` token.
    SplitDot,
    /// Token containing the surname.
    Surname,
}

impl TokenRule {
    pub const ORDER: [TokenRule; 5] = [
        TokenRule::Bracketed,
        TokenRule::StrippedNumber,
        TokenRule::DottedNumber,
        TokenRule::SplitDot,
        TokenRule::Surname,
    ];

    fn uses_margin(self) -> bool {
        self != TokenRule::Surname
    }

    /// Does `words[i]` satisfy this rule?
    fn matches(self, words: &[WordToken], i: usize, target: &BoxTarget) -> bool {
        let text = words[i].text.as_str();
        let next = words.get(i + 1).map(|w| w.text.as_str());
        match self {
            TokenRule::Surname => target
                .surname
                .as_deref()
                .is_some_and(|s| fold_diacritics(text).contains(s)),
            _ => {
                let Some(n) = target.number else {
                    return false;
                };
                let n = n.to_string();
                match self {
                    TokenRule::Bracketed => text.contains(&format!("[{n}]")),
                    TokenRule::StrippedNumber => text.trim_matches(['[', ']', ',']) == n,
                    TokenRule::DottedNumber => has_dotted_number(text, &n, next),
                    TokenRule::SplitDot => text == n && next.is_some_and(is_dot_token),
                    TokenRule::Surname => false,
                }
            }
        }
    }
}

fn starts_with_digit(s: &str) -> bool {
    s.starts_with(|c: char| c.is_ascii_digit())
}

fn has_dotted_number(text: &str, n: &str, next: Option<&str>) -> bool {
    let needle = format!("{n}.");
    text.match_indices(&needle).any(|(at, _)| {
        if text[..at].ends_with(|c: char| c.is_ascii_digit()) {
            return false;
        }
        let after = &text[at + needle.len()..];
        if after.is_empty() {
            !next.is_some_and(starts_with_digit)
        } else {
            !starts_with_digit(after)
        }
    })
}

/// `.` alone, or `.` followed by something other than a digit.
fn is_dot_token(text: &str) -> bool {
    match text.strip_prefix('.') {
        Some(rest) => !starts_with_digit(rest),
        None => false,
    }
}

/// Box of the first token matching `target`, trying [`TokenRule::ORDER`].
///
/// In [`PageContext::ReferenceList`], the number rules only consider tokens
/// whose left edge is inside the reference margin.
pub fn resolve_bbox(
    page: &Page,
    context: PageContext,
    target: &BoxTarget,
    config: &LocatorConfig,
) -> Option<BoundingBox> {
    let words = &page.words;
    for rule in TokenRule::ORDER {
        let restrict = context == PageContext::ReferenceList && rule.uses_margin();
        let hit = (0..words.len()).find(|&i| {
            if restrict && words[i].bbox.x0 >= config.reference_margin {
                return false;
            }
            rule.matches(words, i, target)
        });
        if let Some(i) = hit {
            tracing::trace!(page = page.page_number, ?rule, ?context, token = %words[i].text, "bbox resolved");
            return Some(words[i].bbox);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, x0: f32) -> WordToken {
        WordToken::new(text, BoundingBox::new(x0, 100.0, x0 + 10.0, 110.0))
    }

    fn page(words: Vec<WordToken>) -> Page {
        Page::new(1, "", words)
    }

    fn number(n: u32) -> BoxTarget {
        BoxTarget::new(Some(n), None)
    }

    #[test]
    fn test_bracketed_token() {
        let p = page(vec![word("see", 10.0), word("[12].", 40.0)]);
        let b = resolve_bbox(&p, PageContext::Body, &number(12), &LocatorConfig::default());
        assert_eq!(b.map(|b| b.x0), Some(40.0));
    }

    #[test]
    fn test_grouped_list_token() {
        let p = page(vec![word("[3,", 10.0), word("12,", 30.0), word("19]", 50.0)]);
        let config = LocatorConfig::default();
        assert_eq!(
            resolve_bbox(&p, PageContext::Body, &number(12), &config).map(|b| b.x0),
            Some(30.0)
        );
        assert_eq!(resolve_bbox(&p, PageContext::Body, &number(13), &config), None);
    }

    #[test]
    fn test_decimal_rejected_dotted_number_accepted() {
        let p = page(vec![word("21.5", 10.0), word("mm", 30.0), word("21.", 60.0), word("Gul", 80.0)]);
        let b = resolve_bbox(&p, PageContext::Body, &number(21), &LocatorConfig::default());
        assert_eq!(b.map(|b| b.x0), Some(60.0));
    }

    #[test]
    fn test_dot_ending_token_followed_by_digit_rejected() {
        let p = page(vec![word("21.", 10.0), word("5", 30.0)]);
        assert_eq!(
            resolve_bbox(&p, PageContext::Body, &number(21), &LocatorConfig::default()),
            None
        );
    }

    #[test]
    fn test_dotted_number_not_preceded_by_digit() {
        assert!(!has_dotted_number("121.", "21", None));
        assert!(has_dotted_number("21.Gul", "21", None));
        assert!(has_dotted_number("(21.", "21", Some("Gul")));
    }

    #[test]
    fn test_split_dot_token() {
        let p = page(vec![word("7", 10.0), word(".", 18.0), word("Gul", 30.0)]);
        let b = resolve_bbox(&p, PageContext::ReferenceList, &number(7), &LocatorConfig::default());
        assert_eq!(b.map(|b| b.x0), Some(10.0));

        let split = vec![word("7", 10.0), word(".", 18.0)];
        assert!(TokenRule::SplitDot.matches(&split, 0, &number(7)));
        let trailing = vec![word("7", 10.0), word(".,", 18.0)];
        assert!(TokenRule::SplitDot.matches(&trailing, 0, &number(7)));
        let decimal = vec![word("7", 10.0), word(".25", 18.0)];
        assert!(!TokenRule::SplitDot.matches(&decimal, 0, &number(7)));
    }

    #[test]
    fn test_reference_margin_restricts_number_rules() {
        let p = page(vec![word("7.", 300.0), word("Gül", 320.0)]);
        let config = LocatorConfig::default();
        let target = BoxTarget::new(Some(7), Some("Gul"));

        // Number too far right: surname fallback wins.
        let b = resolve_bbox(&p, PageContext::ReferenceList, &target, &config);
        assert_eq!(b.map(|b| b.x0), Some(320.0));

        // Body context has no margin.
        let b = resolve_bbox(&p, PageContext::Body, &target, &config);
        assert_eq!(b.map(|b| b.x0), Some(300.0));
    }

    #[test]
    fn test_no_match() {
        let p = page(vec![word("nothing", 10.0)]);
        let target = BoxTarget::new(Some(4), Some("Gul"));
        assert_eq!(
            resolve_bbox(&p, PageContext::Body, &target, &LocatorConfig::default()),
            None
        );
        assert_eq!(
            resolve_bbox(&page(vec![]), PageContext::Body, &target, &LocatorConfig::default()),
            None
        );
    }
}
