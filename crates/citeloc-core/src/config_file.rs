use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub locator: Option<LocatorSection>,
    pub extraction: Option<ExtractionSection>,
    pub batch: Option<BatchSection>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocatorSection {
    /// Extra reference-section headings, appended to the built-in set.
    pub heading_terms: Option<Vec<String>>,
    pub numbered_line_threshold: Option<usize>,
    pub fallback_page_count: Option<usize>,
    pub author_year_max_lines: Option<usize>,
    pub proximity_lookback_chars: Option<usize>,
    pub proximity_lookahead_chars: Option<usize>,
    pub year_tolerance: Option<i32>,
    pub reference_margin: Option<f32>,
    /// Strategy names in evaluation order; replaces the default order.
    pub strategies: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionSection {
    pub header_exclusion: Option<f32>,
    pub footer_exclusion: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSection {
    pub num_workers: Option<usize>,
    pub timeout_secs: Option<u64>,
}

/// Platform config directory path: `<config_dir>/citeloc/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("citeloc").join("config.toml"))
}

/// Load config by cascading CWD `.citeloc.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".citeloc.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => {
            tracing::debug!(path = %path.display(), "loaded config file");
            Some(config)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparsable config file");
            None
        }
    }
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    let bl = base.locator.unwrap_or_default();
    let ol = overlay.locator.unwrap_or_default();
    let be = base.extraction.unwrap_or_default();
    let oe = overlay.extraction.unwrap_or_default();
    let bb = base.batch.unwrap_or_default();
    let ob = overlay.batch.unwrap_or_default();

    ConfigFile {
        locator: Some(LocatorSection {
            heading_terms: ol.heading_terms.or(bl.heading_terms),
            numbered_line_threshold: ol.numbered_line_threshold.or(bl.numbered_line_threshold),
            fallback_page_count: ol.fallback_page_count.or(bl.fallback_page_count),
            author_year_max_lines: ol.author_year_max_lines.or(bl.author_year_max_lines),
            proximity_lookback_chars: ol
                .proximity_lookback_chars
                .or(bl.proximity_lookback_chars),
            proximity_lookahead_chars: ol
                .proximity_lookahead_chars
                .or(bl.proximity_lookahead_chars),
            year_tolerance: ol.year_tolerance.or(bl.year_tolerance),
            reference_margin: ol.reference_margin.or(bl.reference_margin),
            strategies: ol.strategies.or(bl.strategies),
        }),
        extraction: Some(ExtractionSection {
            header_exclusion: oe.header_exclusion.or(be.header_exclusion),
            footer_exclusion: oe.footer_exclusion.or(be.footer_exclusion),
        }),
        batch: Some(BatchSection {
            num_workers: ob.num_workers.or(bb.num_workers),
            timeout_secs: ob.timeout_secs.or(bb.timeout_secs),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_parses() {
        let config: ConfigFile = toml::from_str(
            r#"
            [locator]
            numbered_line_threshold = 8
            strategies = ["author_year", "doi"]

            [batch]
            timeout_secs = 30
            "#,
        )
        .unwrap();
        let locator = config.locator.unwrap();
        assert_eq!(locator.numbered_line_threshold, Some(8));
        assert_eq!(
            locator.strategies,
            Some(vec!["author_year".to_string(), "doi".to_string()])
        );
        assert!(locator.fallback_page_count.is_none());
        assert!(config.extraction.is_none());
        assert_eq!(config.batch.unwrap().timeout_secs, Some(30));
    }

    #[test]
    fn test_overlay_wins_field_by_field() {
        let base = ConfigFile {
            locator: Some(LocatorSection {
                numbered_line_threshold: Some(7),
                reference_margin: Some(120.0),
                ..Default::default()
            }),
            batch: Some(BatchSection {
                num_workers: Some(2),
                timeout_secs: Some(60),
            }),
            ..Default::default()
        };
        let overlay = ConfigFile {
            locator: Some(LocatorSection {
                numbered_line_threshold: Some(9),
                ..Default::default()
            }),
            batch: Some(BatchSection {
                num_workers: None,
                timeout_secs: Some(10),
            }),
            ..Default::default()
        };

        let merged = merge(base, overlay);
        let locator = merged.locator.unwrap();
        assert_eq!(locator.numbered_line_threshold, Some(9));
        assert_eq!(locator.reference_margin, Some(120.0));
        let batch = merged.batch.unwrap();
        assert_eq!(batch.num_workers, Some(2));
        assert_eq!(batch.timeout_secs, Some(10));
    }

    #[test]
    fn test_missing_file_is_none() {
        assert!(load_from_path(Path::new("/definitely/not/here/.citeloc.toml")).is_none());
    }

    #[test]
    fn test_loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[extraction]\nfooter_exclusion = 0.05\n").unwrap();
        let config = load_from_path(&path).unwrap();
        assert_eq!(config.extraction.unwrap().footer_exclusion, Some(0.05));
    }

    #[test]
    fn test_invalid_toml_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[locator\nbroken").unwrap();
        assert!(load_from_path(&path).is_none());
    }
}
