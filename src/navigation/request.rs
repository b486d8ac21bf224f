use std::collections::HashMap;

use super::response::Response;

/// A navigation request: one frontier entry together with the provenance
/// of its discovery.
///
/// Requests are cheap to clone and cross worker-task boundaries, so every
/// field is owned data.
#[derive(Debug, Clone, Default)]
pub struct Request {
    /// HTTP method, uppercase ("GET", "POST").
    pub method: String,
    /// Absolute URL to fetch.
    pub url: String,
    /// Request body, for non-idempotent requests discovered from forms.
    pub body: Option<String>,
    /// Discovery depth: 0 for the seed, parent depth + 1 for candidates.
    pub depth: usize,
    /// Extra headers to send with this request.
    pub headers: HashMap<String, String>,
    /// Element tag the URL was extracted from ("a", "script", "file", ...).
    pub tag: String,
    /// Attribute the URL was extracted from ("href", "src", "location", ...).
    pub attribute: String,
    /// URL of the page this request was discovered on. Empty for seeds.
    pub source: String,
    /// Hostname of the crawl's seed, carried for scope evaluation.
    pub root_hostname: String,
    /// Technologies fingerprinted on the source page, if a detector ran.
    pub source_technologies: Vec<String>,
    /// Named pattern matches captured from the source page body.
    pub custom_fields: HashMap<String, Vec<String>>,
}

impl Request {
    /// Creates the seed request for a crawl, at depth 0.
    pub fn seed(url: &str, root_hostname: &str) -> Self {
        Request {
            method: "GET".to_string(),
            url: url.to_string(),
            root_hostname: root_hostname.to_string(),
            ..Default::default()
        }
    }

    /// The deduplication identity of this request.
    ///
    /// GET requests are identified by URL alone; requests carrying a body
    /// append it so that two forms posting different payloads to one
    /// endpoint stay distinct.
    pub fn request_url(&self) -> String {
        match &self.body {
            Some(body) if !body.is_empty() => format!("{}:{}", self.url, body),
            _ => self.url.clone(),
        }
    }

    /// Builds a candidate request from a raw extracted value, resolved
    /// against the page it was found on.
    ///
    /// Returns `None` for non-navigable values (fragment-only references,
    /// unresolvable paths). The candidate inherits the response's depth
    /// (already parent + 1), root hostname, and detected technologies.
    pub fn from_response(
        value: &str,
        tag: &str,
        attribute: &str,
        response: &Response,
    ) -> Option<Self> {
        let resolved = response.absolute_url(value)?;
        Some(Request {
            method: "GET".to_string(),
            url: resolved.to_string(),
            body: None,
            depth: response.depth,
            headers: HashMap::new(),
            tag: tag.to_string(),
            attribute: attribute.to_string(),
            source: response.url.to_string(),
            root_hostname: response.root_hostname.clone(),
            source_technologies: response.technologies.clone(),
            custom_fields: HashMap::new(),
        })
    }
}
