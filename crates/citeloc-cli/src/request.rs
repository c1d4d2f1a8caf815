//! JSON request mode: a single `{pdf_path, article_data}` object given
//! either inline or as the path of a file holding it.

use std::path::{Path, PathBuf};

use citeloc_core::SourcePublication;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct LocateRequest {
    pub pdf_path: PathBuf,
    pub article_data: ArticleData,
}

#[derive(Debug, Default, Deserialize)]
pub struct ArticleData {
    #[serde(default)]
    pub source_title: String,
    #[serde(default)]
    pub source_doi: Option<String>,
    #[serde(default)]
    pub source_authors: Vec<String>,
    #[serde(default)]
    pub source_year: Option<i32>,
}

impl ArticleData {
    /// A year of 0 and a blank DOI both mean "unknown".
    pub fn into_publication(self) -> SourcePublication {
        SourcePublication {
            title: self.source_title,
            doi: self.source_doi.filter(|d| !d.trim().is_empty()),
            authors: self.source_authors,
            year: self.source_year.filter(|&y| y != 0),
        }
    }
}

/// Parse `arg` as a request. An existing file is read; anything else is
/// treated as inline JSON.
pub fn parse_request(arg: &str) -> anyhow::Result<LocateRequest> {
    let path = Path::new(arg);
    let content = if path.is_file() {
        std::fs::read_to_string(path)?
    } else {
        arg.to_string()
    };
    let request: LocateRequest = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("invalid request: {}", e))?;
    Ok(request)
}
