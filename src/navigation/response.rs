use url::Url;

/// A fetched page, normalized across backends.
///
/// The plain backend fills this from an HTTP exchange; the browser backend
/// fills it from a rendered DOM snapshot or an intercepted network event.
/// `depth` is already the parent request's depth + 1, so candidates
/// extracted from this response inherit it directly.
#[derive(Debug, Clone)]
pub struct Response {
    /// Final URL after redirects; base for resolving extracted values.
    pub url: Url,
    /// HTTP status code. 0 when unknown (rendered DOM snapshots).
    pub status: u16,
    /// Response headers as received, order preserved.
    pub headers: Vec<(String, String)>,
    /// Raw body bytes.
    pub body: Vec<u8>,
    /// Depth candidates extracted from this response carry.
    pub depth: usize,
    /// Hostname of the crawl's seed.
    pub root_hostname: String,
    /// Technologies fingerprinted from this response, if a detector ran.
    pub technologies: Vec<String>,
}

impl Response {
    /// Resolves an extracted attribute value against this response's URL.
    ///
    /// Returns `None` for non-navigable values: empty strings and
    /// fragment-only references (`#...`, which address a location within
    /// the current document). Fragments on otherwise navigable URLs are
    /// stripped, so `/page#top` and `/page#bottom` resolve identically.
    /// Scheme-relative values (`//host/path`) adopt this response's scheme.
    pub fn absolute_url(&self, value: &str) -> Option<Url> {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return None;
        }
        let mut resolved = self.url.join(trimmed).ok()?;
        resolved.set_fragment(None);
        Some(resolved)
    }

    /// Returns the body decoded as UTF-8, replacing invalid sequences.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Looks up a header value, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_at(url: &str) -> Response {
        Response {
            url: Url::parse(url).unwrap(),
            status: 200,
            headers: vec![("Content-Type".to_string(), "text/html".to_string())],
            body: b"<html></html>".to_vec(),
            depth: 1,
            root_hostname: "example.com".to_string(),
            technologies: Vec::new(),
        }
    }

    #[test]
    fn test_absolute_url_joins_relative() {
        let resp = response_at("https://example.com/a/b.html");
        let url = resp.absolute_url("c.html").unwrap();
        assert_eq!(url.as_str(), "https://example.com/a/c.html");
    }

    #[test]
    fn test_absolute_url_absolute_passthrough() {
        let resp = response_at("https://example.com/");
        let url = resp.absolute_url("http://other.test/x").unwrap();
        assert_eq!(url.as_str(), "http://other.test/x");
    }

    #[test]
    fn test_absolute_url_fragment_only_rejected() {
        let resp = response_at("https://example.com/page");
        assert!(resp.absolute_url("#anchor").is_none());
        assert!(resp.absolute_url("").is_none());
        assert!(resp.absolute_url("   ").is_none());
    }

    #[test]
    fn test_absolute_url_strips_fragment() {
        let resp = response_at("https://example.com/");
        let url = resp.absolute_url("/page#section-2").unwrap();
        assert_eq!(url.as_str(), "https://example.com/page");
    }

    #[test]
    fn test_absolute_url_scheme_relative_inherits_scheme() {
        let resp = response_at("https://example.com/");
        let url = resp.absolute_url("//static.example.com/app.js").unwrap();
        assert_eq!(url.as_str(), "https://static.example.com/app.js");
    }

    #[test]
    fn test_header_lookup_case_insensitive() {
        let resp = response_at("https://example.com/");
        assert_eq!(resp.header("content-type"), Some("text/html"));
        assert_eq!(resp.header("X-Missing"), None);
    }
}
