use anyhow::{Context, Result};
use colored::*;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// `cb=<digits>` wherever it appears in the page. Query strings are the
/// usual spot (`app.js?cb=1712345678901`) but the marker is positional,
/// not HTML-aware.
const MARKER: &str = r"cb=\d+";

/// Token source for the stamp step. Wall clock in milliseconds, clamped
/// so two runs in the same process can never hand out the same value
/// even when they land inside one tick.
#[derive(Debug, Default)]
pub struct CacheToken {
    last: u64,
}

impl CacheToken {
    pub fn new() -> Self {
        Self { last: 0 }
    }

    pub fn next(&mut self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        self.last = now.max(self.last + 1);
        self.last
    }
}

/// Rewrites every marker in `page` to one fresh token. Returns the token
/// and how many markers it replaced. A missing page or a page with no
/// markers is a successful no-op, and crucially the file is not rewritten
/// in that case, so the watcher never sees a phantom change.
pub fn stamp(page: &Path, token: &mut CacheToken) -> Result<(Option<u64>, usize)> {
    if !page.exists() {
        println!(
            "{} {} not found - skipping cache-bust",
            "!".yellow(),
            page.display()
        );
        return Ok((None, 0));
    }

    let html = fs::read_to_string(page)
        .with_context(|| format!("Failed to read {}", page.display()))?;

    let marker = Regex::new(MARKER).unwrap();
    let count = marker.find_iter(&html).count();
    if count == 0 {
        return Ok((None, 0));
    }

    let value = token.next();
    let replacement = format!("cb={value}");
    let stamped = marker.replace_all(&html, replacement.as_str());
    fs::write(page, stamped.as_bytes())
        .with_context(|| format!("Failed to write {}", page.display()))?;

    Ok((Some(value), count))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_strictly_increase() {
        let mut token = CacheToken::new();
        let mut prev = 0;
        for _ in 0..1000 {
            let next = token.next();
            assert!(next > prev);
            prev = next;
        }
    }

    #[test]
    fn test_stamp_rewrites_every_marker_with_one_token() {
        let dir = tempfile::tempdir().unwrap();
        let page = dir.path().join("index.html");
        fs::write(
            &page,
            "<link href=\"dist/style.css?cb=0\">\n<script src=\"dist/main.js?cb=17\"></script>\n",
        )
        .unwrap();

        let mut token = CacheToken::new();
        let (value, count) = stamp(&page, &mut token).unwrap();
        let value = value.unwrap();
        assert_eq!(count, 2);

        let html = fs::read_to_string(&page).unwrap();
        let marker = Regex::new(MARKER).unwrap();
        let seen: Vec<&str> = marker.find_iter(&html).map(|m| m.as_str()).collect();
        assert_eq!(seen.len(), 2);
        for m in seen {
            assert_eq!(m, format!("cb={value}"));
        }
    }

    #[test]
    fn test_stamp_leaves_surrounding_content_alone() {
        let dir = tempfile::tempdir().unwrap();
        let page = dir.path().join("index.html");
        let original = "<p>cb=9 in prose</p><a href=\"x?cb=12&v=2\">link</a>";
        fs::write(&page, original).unwrap();

        let mut token = CacheToken::new();
        let (value, count) = stamp(&page, &mut token).unwrap();
        let value = value.unwrap();
        assert_eq!(count, 2);

        let html = fs::read_to_string(&page).unwrap();
        let expected = format!("<p>cb={value} in prose</p><a href=\"x?cb={value}&v=2\">link</a>");
        assert_eq!(html, expected);
    }

    #[test]
    fn test_stamp_without_markers_does_not_touch_file() {
        let dir = tempfile::tempdir().unwrap();
        let page = dir.path().join("index.html");
        fs::write(&page, "<html><body>plain</body></html>").unwrap();
        let before = fs::metadata(&page).unwrap().modified().unwrap();

        let mut token = CacheToken::new();
        let (value, count) = stamp(&page, &mut token).unwrap();
        assert_eq!(value, None);
        assert_eq!(count, 0);
        assert_eq!(fs::metadata(&page).unwrap().modified().unwrap(), before);
    }

    #[test]
    fn test_stamp_missing_page_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut token = CacheToken::new();
        let (value, count) = stamp(&dir.path().join("nope.html"), &mut token).unwrap();
        assert_eq!(value, None);
        assert_eq!(count, 0);
    }

    #[test]
    fn test_second_stamp_strictly_newer() {
        let dir = tempfile::tempdir().unwrap();
        let page = dir.path().join("index.html");
        fs::write(&page, "src=\"a.js?cb=1\"").unwrap();

        let mut token = CacheToken::new();
        let (first, _) = stamp(&page, &mut token).unwrap();
        let (second, _) = stamp(&page, &mut token).unwrap();
        assert!(second.unwrap() > first.unwrap());
    }
}
