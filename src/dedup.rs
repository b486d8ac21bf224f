//! Per-crawl deduplication: URLs, content fingerprints, crawler traps.
//!
//! All three sets grow monotonically for the life of one crawl and are
//! dropped with it. The filter is shared across workers, so each set is
//! mutex-guarded; the critical sections are a hash insert each.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use sha2::{Digest, Sha256};
use url::Url;

/// A path segment repeated this many times is treated as a trap
/// (`/a/b/a/b/a/...` style self-referencing links).
const MAX_SEGMENT_REPEATS: usize = 3;

/// Visits to one host+path beyond this count are treated as a parameter
/// loop (calendars, sort toggles) even though each URL is unique.
const MAX_PATH_VISITS: u32 = 15;

/// Deduplication filter for a single crawl.
pub struct DedupFilter {
    seen_urls: Mutex<HashSet<String>>,
    seen_content: Mutex<HashSet<[u8; 32]>>,
    path_visits: Mutex<HashMap<String, u32>>,
}

impl DedupFilter {
    pub fn new() -> Self {
        DedupFilter {
            seen_urls: Mutex::new(HashSet::new()),
            seen_content: Mutex::new(HashSet::new()),
            path_visits: Mutex::new(HashMap::new()),
        }
    }

    /// Returns true exactly once per request identity.
    pub fn unique_url(&self, identity: &str) -> bool {
        let mut seen = self.seen_urls.lock().unwrap_or_else(|e| e.into_inner());
        seen.insert(identity.to_string())
    }

    /// Returns true the first time this body content is seen.
    ///
    /// Content is fingerprinted by SHA-256 over the whitespace-trimmed
    /// bytes, so trailing-newline variants of one document collapse.
    pub fn unique_content(&self, body: &[u8]) -> bool {
        let digest = fingerprint(body);
        let mut seen = self.seen_content.lock().unwrap_or_else(|e| e.into_inner());
        seen.insert(digest)
    }

    /// Heuristic trap detection for URLs that pass `unique_url`.
    ///
    /// Catches two shapes the URL set cannot: paths whose segments repeat
    /// (`/a/b/a/b/a/b`), and one path revisited under ever-changing query
    /// parameters. Each call counts as a visit.
    pub fn is_cycle(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };

        if let Some(segments) = parsed.path_segments() {
            let mut counts: HashMap<&str, usize> = HashMap::new();
            for segment in segments.filter(|s| !s.is_empty()) {
                let count = counts.entry(segment).or_insert(0);
                *count += 1;
                if *count > MAX_SEGMENT_REPEATS {
                    return true;
                }
            }
        }

        let key = format!(
            "{}{}",
            parsed.host_str().unwrap_or_default(),
            parsed.path()
        );
        let mut visits = self.path_visits.lock().unwrap_or_else(|e| e.into_inner());
        let count = visits.entry(key).or_insert(0);
        *count += 1;
        *count > MAX_PATH_VISITS
    }
}

impl Default for DedupFilter {
    fn default() -> Self {
        Self::new()
    }
}

fn fingerprint(body: &[u8]) -> [u8; 32] {
    let trimmed = trim_ascii(body);
    let mut hasher = Sha256::new();
    hasher.update(trimmed);
    hasher.finalize().into()
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map(|i| i + 1)
        .unwrap_or(start);
    &bytes[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_url_true_exactly_once() {
        let filter = DedupFilter::new();
        assert!(filter.unique_url("http://example.com/a"));
        assert!(!filter.unique_url("http://example.com/a"));
        assert!(filter.unique_url("http://example.com/b"));
    }

    #[test]
    fn test_unique_url_distinguishes_post_bodies() {
        let filter = DedupFilter::new();
        assert!(filter.unique_url("http://example.com/form:a=1"));
        assert!(filter.unique_url("http://example.com/form:a=2"));
        assert!(!filter.unique_url("http://example.com/form:a=1"));
    }

    #[test]
    fn test_unique_content_collapses_whitespace_variants() {
        let filter = DedupFilter::new();
        assert!(filter.unique_content(b"<html>x</html>"));
        assert!(!filter.unique_content(b"  <html>x</html>\n\n"));
        assert!(filter.unique_content(b"<html>y</html>"));
    }

    #[test]
    fn test_is_cycle_repeated_segments() {
        let filter = DedupFilter::new();
        assert!(!filter.is_cycle("http://example.com/a/b/a/b"));
        assert!(filter.is_cycle("http://example.com/a/b/a/b/a/b/a/b"));
    }

    #[test]
    fn test_is_cycle_parameter_loop() {
        let filter = DedupFilter::new();
        for i in 0..MAX_PATH_VISITS {
            assert!(
                !filter.is_cycle(&format!("http://example.com/cal?day={}", i)),
                "visit {} flagged too early",
                i
            );
        }
        assert!(filter.is_cycle("http://example.com/cal?day=999"));
    }

    #[test]
    fn test_is_cycle_distinct_paths_unaffected() {
        let filter = DedupFilter::new();
        for i in 0..50 {
            assert!(!filter.is_cycle(&format!("http://example.com/page{}", i)));
        }
    }
}
