use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Lowercase `text` and fold diacritics to plain letters.
///
/// `"Gül"` → `"gul"`, `"Işık"` → `"isik"`, `"Straße"` → `"strasse"`.
/// Characters without a Latin base (dashes, CJK) pass through lowercased.
pub fn fold_diacritics(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii() {
            out.push(c.to_ascii_lowercase());
            continue;
        }
        match c {
            'ı' => out.push('i'),
            'ß' => out.push_str("ss"),
            'ø' | 'Ø' => out.push('o'),
            'ł' | 'Ł' => out.push('l'),
            'đ' | 'Đ' => out.push('d'),
            'æ' | 'Æ' => out.push_str("ae"),
            'œ' | 'Œ' => out.push_str("oe"),
            _ => {
                for d in std::iter::once(c).nfkd().filter(|d| !is_combining_mark(*d)) {
                    out.extend(d.to_lowercase());
                }
            }
        }
    }
    out
}

/// Remove all whitespace and lowercase. Used for DOI comparison, where PDF
/// line breaks routinely split identifiers.
pub fn compact_lowercase(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Surname of a single author string.
///
/// `"Gul, B."` → `"Gul"`; `"Buse Cebi Gul"` → `"Gul"`.
pub fn surname(author: &str) -> Option<String> {
    let author = author.trim();
    let candidate = match author.split_once(',') {
        Some((before, _)) if !before.trim().is_empty() => before.trim(),
        _ => author.split_whitespace().last()?,
    };
    let cleaned = candidate.trim_matches(|c: char| c.is_ascii_punctuation());
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// Largest char boundary `<= index`.
pub fn floor_char_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    let mut i = index;
    while !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Smallest char boundary `>= index`.
pub fn ceil_char_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    let mut i = index;
    while !text.is_char_boundary(i) {
        i += 1;
    }
    i
}
