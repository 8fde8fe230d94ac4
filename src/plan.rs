//! URL planning: which pages to fetch, and what to call the artifacts.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;
use url::Url;

/// Longest slug kept from a URL when deriving a file name.
const MAX_NAME_LEN: usize = 150;

static UNSAFE_RUNS: OnceLock<Regex> = OnceLock::new();

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("invalid base URL {url:?}: {source}")]
    InvalidBaseUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("--step must be at least 1")]
    ZeroStep,

    #[error("failed to read URL file {path}: {source}")]
    UrlsFile {
        path: String,
        source: std::io::Error,
    },
}

/// Expand a base URL across an inclusive `start=` range.
///
/// Each planned URL carries one offset from `[from, to]` in its `start`
/// query parameter; an existing `start` parameter is replaced, everything
/// else is preserved.
pub fn from_range(base_url: &str, from: u64, to: u64, step: u64) -> Result<Vec<String>, PlanError> {
    if step == 0 {
        return Err(PlanError::ZeroStep);
    }

    let base = Url::parse(base_url).map_err(|source| PlanError::InvalidBaseUrl {
        url: base_url.to_string(),
        source,
    })?;

    let mut urls = Vec::new();
    let mut offset = from;
    while offset <= to {
        urls.push(with_start_param(&base, offset));
        offset = match offset.checked_add(step) {
            Some(next) => next,
            None => break,
        };
    }
    Ok(urls)
}

/// Read URLs from a text file, one per line, skipping blanks.
pub fn from_file(path: &Path) -> Result<Vec<String>, PlanError> {
    let text = fs::read_to_string(path).map_err(|source| PlanError::UrlsFile {
        path: path.display().to_string(),
        source,
    })?;

    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

fn with_start_param(base: &Url, offset: u64) -> String {
    let kept: Vec<(String, String)> = base
        .query_pairs()
        .filter(|(key, _)| key != "start")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut url = base.clone();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .append_pair("start", &offset.to_string());
    url.to_string()
}

/// Derive a filesystem-safe slug from a URL.
///
/// Strips the scheme, truncates, and collapses every run of characters
/// outside `[a-zA-Z0-9._-]` to a single underscore.
pub fn safe_name(url: &str) -> String {
    let re = UNSAFE_RUNS.get_or_init(|| {
        Regex::new(r"[^a-zA-Z0-9._-]+").unwrap_or_else(|e| panic!("invalid slug pattern: {e}"))
    });

    let base = url.trim();
    let base = base.rsplit("://").next().unwrap_or(base);
    let base: String = base.chars().take(MAX_NAME_LEN).collect();

    let cleaned = re.replace_all(&base, "_");
    if cleaned.is_empty() {
        "page".to_string()
    } else {
        cleaned.into_owned()
    }
}

/// File name for the page captured at 1-based `index`, ordered by fetch order.
pub fn page_file_name(index: usize, url: &str) -> String {
    format!("{index:03}_{}.pdf", safe_name(url))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use proptest::prelude::*;

    use super::*;

    #[test]
    fn range_replaces_existing_start_param() {
        let urls = from_range(
            "https://scholar.google.com/scholar?q=attention&start=50",
            0,
            10,
            10,
        )
        .unwrap();

        assert_eq!(urls.len(), 2);
        assert!(urls[0].contains("start=0"));
        assert!(urls[1].contains("start=10"));
        for url in &urls {
            assert!(url.contains("q=attention"));
            assert!(!url.contains("start=50"));
        }
    }

    #[test]
    fn range_injects_start_param_when_absent() {
        let urls = from_range("https://example.com/search?q=rust", 20, 20, 10).unwrap();
        assert_eq!(urls, vec!["https://example.com/search?q=rust&start=20"]);
    }

    #[test]
    fn range_is_empty_when_bounds_are_inverted() {
        let urls = from_range("https://example.com/", 30, 0, 10).unwrap();
        assert!(urls.is_empty());
    }

    #[test]
    fn zero_step_is_rejected() {
        let err = from_range("https://example.com/", 0, 10, 0).unwrap_err();
        assert!(matches!(err, PlanError::ZeroStep));
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let err = from_range("not a url", 0, 0, 10).unwrap_err();
        assert!(matches!(err, PlanError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn file_skips_blank_lines_and_trims() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "https://example.com/a").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "  https://example.com/b  ").unwrap();
        writeln!(file, "   ").unwrap();

        let urls = from_file(file.path()).unwrap();
        assert_eq!(urls, vec!["https://example.com/a", "https://example.com/b"]);
    }

    #[test]
    fn missing_file_reports_its_path() {
        let err = from_file(Path::new("/no/such/urls.txt")).unwrap_err();
        assert!(err.to_string().contains("/no/such/urls.txt"));
    }

    #[test]
    fn safe_name_strips_scheme_and_collapses_runs() {
        assert_eq!(
            safe_name("https://scholar.google.com/scholar?q=a b"),
            "scholar.google.com_scholar_q_a_b"
        );
    }

    #[test]
    fn safe_name_truncates_long_urls() {
        let url = format!("https://{}", "a".repeat(400));
        assert_eq!(safe_name(&url).len(), MAX_NAME_LEN);
    }

    #[test]
    fn safe_name_falls_back_for_empty_input() {
        assert_eq!(safe_name(""), "page");
        assert_eq!(safe_name("   "), "page");
    }

    #[test]
    fn page_file_names_are_zero_padded() {
        assert_eq!(page_file_name(3, "https://x.test/a"), "003_x.test_a.pdf");
        assert_eq!(page_file_name(42, "https://x.test/a"), "042_x.test_a.pdf");
    }

    proptest! {
        #[test]
        fn safe_name_output_is_always_safe(input in "\\PC*") {
            let name = safe_name(&input);
            prop_assert!(!name.is_empty());
            prop_assert!(name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')));
        }

        #[test]
        fn range_count_matches_formula(from in 0u64..1000, span in 0u64..1000, step in 1u64..50) {
            let to = from + span;
            let urls = from_range("https://example.com/search?q=x", from, to, step).unwrap();
            prop_assert_eq!(urls.len() as u64, span / step + 1);
        }
    }
}
