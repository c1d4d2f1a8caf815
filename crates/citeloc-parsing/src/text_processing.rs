use citeloc_core::{ExtractedPage, WordToken};

/// Expand common typographic ligatures found in PDFs.
pub fn expand_ligatures(text: &str) -> String {
    if !text.chars().any(is_ligature) {
        return text.to_string();
    }
    text.replace('\u{FB00}', "ff")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl")
        .replace(['\u{FB05}', '\u{FB06}'], "st")
}

fn is_ligature(c: char) -> bool {
    ('\u{FB00}'..='\u{FB06}').contains(&c)
}

/// Replace no-break spaces with plain spaces and drop soft hyphens, so that
/// line-anchored patterns see the same whitespace a reader does.
pub fn normalize_spaces(text: &str) -> String {
    text.chars()
        .filter(|&c| c != '\u{00AD}')
        .map(|c| match c {
            '\u{00A0}' | '\u{2007}' | '\u{202F}' => ' ',
            other => other,
        })
        .collect()
}

/// Apply the text clean-up to a freshly extracted page, text and tokens alike.
pub(crate) fn clean_page(page: ExtractedPage) -> ExtractedPage {
    let words = page
        .words
        .into_iter()
        .filter_map(|w| {
            let text = normalize_spaces(&expand_ligatures(&w.text));
            let text = text.trim();
            if text.is_empty() {
                None
            } else {
                Some(WordToken::new(text, w.bbox))
            }
        })
        .collect();
    ExtractedPage {
        text: normalize_spaces(&expand_ligatures(&page.text)),
        words,
    }
}
