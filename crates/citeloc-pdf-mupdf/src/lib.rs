use std::path::Path;

use mupdf::{Document, Quad, TextPageFlags};

use citeloc_core::{BackendError, BoundingBox, ExtractedPage, PdfBackend, WordToken};

/// MuPDF-based implementation of [`PdfBackend`].
///
/// This crate is the sole AGPL island. It isolates the mupdf dependency
/// (which is AGPL-3.0) so that the rest of the workspace does not
/// transitively depend on it.
///
/// Header and footer exclusion are off by default. The title page DOI often
/// sits in the header band.
#[derive(Debug, Clone, Default)]
pub struct MupdfBackend {
    /// Fraction of page height from bottom to exclude as footer (0.0–1.0).
    footer_exclusion_ratio: Option<f32>,
    /// Fraction of page height from top to exclude as header (0.0–1.0).
    header_exclusion_ratio: Option<f32>,
}

impl MupdfBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the footer exclusion ratio. Pass `0.0` to disable.
    pub fn with_footer_exclusion(mut self, ratio: f32) -> Self {
        self.footer_exclusion_ratio = if ratio > 0.0 { Some(ratio) } else { None };
        self
    }

    /// Set the header exclusion ratio. Pass `0.0` to disable.
    pub fn with_header_exclusion(mut self, ratio: f32) -> Self {
        self.header_exclusion_ratio = if ratio > 0.0 { Some(ratio) } else { None };
        self
    }
}

fn quad_bbox(q: &Quad) -> BoundingBox {
    BoundingBox::new(
        q.ul.x.min(q.ll.x),
        q.ul.y.min(q.ur.y),
        q.ur.x.max(q.lr.x),
        q.ll.y.max(q.lr.y),
    )
}

/// Group a line's characters into whitespace-separated words. Each word's
/// box is the union of its character boxes.
fn words_from_chars(chars: impl IntoIterator<Item = (char, BoundingBox)>) -> Vec<WordToken> {
    let mut words = Vec::new();
    let mut current: Option<(String, BoundingBox)> = None;
    for (c, bbox) in chars {
        if c.is_whitespace() {
            if let Some((text, bbox)) = current.take() {
                words.push(WordToken::new(text, bbox));
            }
            continue;
        }
        match &mut current {
            Some((text, word_box)) => {
                text.push(c);
                *word_box = word_box.union(&bbox);
            }
            None => current = Some((c.to_string(), bbox)),
        }
    }
    if let Some((text, bbox)) = current {
        words.push(WordToken::new(text, bbox));
    }
    words
}

impl PdfBackend for MupdfBackend {
    fn extract_pages(&self, path: &Path) -> Result<Vec<ExtractedPage>, BackendError> {
        if !path.exists() {
            return Err(BackendError::OpenError(format!(
                "{}: no such file",
                path.display()
            )));
        }
        let path_str = path
            .to_str()
            .ok_or_else(|| BackendError::OpenError("invalid path encoding".into()))?;

        let document =
            Document::open(path_str).map_err(|e| BackendError::OpenError(e.to_string()))?;

        let mut pages = Vec::new();

        for page_result in document
            .pages()
            .map_err(|e| BackendError::ExtractionError(e.to_string()))?
        {
            let page = page_result.map_err(|e| BackendError::ExtractionError(e.to_string()))?;
            let text_page = page
                .to_text_page(TextPageFlags::empty())
                .map_err(|e| BackendError::ExtractionError(e.to_string()))?;

            let page_bounds = page
                .bounds()
                .map_err(|e| BackendError::ExtractionError(e.to_string()))?;
            let page_height = page_bounds.y1 - page_bounds.y0;

            let header_threshold = self
                .header_exclusion_ratio
                .map(|r| page_bounds.y0 + page_height * r);
            let footer_threshold = self
                .footer_exclusion_ratio
                .map(|r| page_bounds.y1 - page_height * r);

            let mut text = String::new();
            let mut words = Vec::new();
            for block in text_page.blocks() {
                for line in block.lines() {
                    let line_bounds = line.bounds();
                    if header_threshold.is_some_and(|t| line_bounds.y1 <= t) {
                        continue;
                    }
                    if footer_threshold.is_some_and(|t| line_bounds.y0 >= t) {
                        continue;
                    }

                    let chars: Vec<(char, BoundingBox)> = line
                        .chars()
                        .map(|c| (c.char().unwrap_or('\u{FFFD}'), quad_bbox(&c.quad())))
                        .collect();
                    text.extend(chars.iter().map(|(c, _)| *c));
                    text.push('\n');
                    words.extend(words_from_chars(chars));
                }
            }
            tracing::trace!(
                page = pages.len() + 1,
                chars = text.len(),
                words = words.len(),
                "page extracted"
            );
            pages.push(ExtractedPage { text, words });
        }

        tracing::debug!(path = %path.display(), pages = pages.len(), "extracted PDF");
        Ok(pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glyphs(text: &str) -> Vec<(char, BoundingBox)> {
        text.chars()
            .enumerate()
            .map(|(i, c)| {
                let x = 10.0 + 5.0 * i as f32;
                (c, BoundingBox::new(x, 100.0, x + 5.0, 110.0))
            })
            .collect()
    }

    #[test]
    fn test_words_split_on_whitespace() {
        let words = words_from_chars(glyphs("see  [7]. now"));
        let texts: Vec<&str> = words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["see", "[7].", "now"]);
        assert_eq!(words[1].bbox, BoundingBox::new(35.0, 100.0, 55.0, 110.0));
    }

    #[test]
    fn test_words_empty_line() {
        assert!(words_from_chars(glyphs("   ")).is_empty());
        assert!(words_from_chars(Vec::new()).is_empty());
    }

    #[test]
    fn test_missing_file_is_open_error() {
        let err = MupdfBackend::new()
            .extract_pages(Path::new("/definitely/not/here.pdf"))
            .unwrap_err();
        assert!(matches!(err, BackendError::OpenError(_)));
    }

    #[test]
    fn test_non_pdf_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.pdf");
        std::fs::write(&path, "this is not a PDF").unwrap();
        assert!(MupdfBackend::new().extract_pages(&path).is_err());
    }

    #[test]
    fn test_exclusion_builders() {
        let b = MupdfBackend::new()
            .with_header_exclusion(0.04)
            .with_footer_exclusion(0.0);
        assert_eq!(b.header_exclusion_ratio, Some(0.04));
        assert_eq!(b.footer_exclusion_ratio, None);
    }
}
