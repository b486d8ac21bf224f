//! The extraction pipeline: one pass over a response body, emitting
//! navigation candidates through a sink.
//!
//! Extraction is synchronous and stateless; every per-crawl decision
//! (dedup, scope, enqueueing) lives behind the [`CandidateSink`]. The
//! tag/attribute table below is the extraction grammar: adding a rule
//! here is the only change needed to mine a new element kind.

use std::collections::HashMap;

use regex::Regex;
use scraper::{Html, Selector};

use crate::navigation::{Request, Response};

/// Receiver for extracted candidates. Implemented by the crawler's
/// per-crawl context; tests use a collecting sink.
pub trait CandidateSink: Send + Sync {
    fn emit(&self, request: Request);
}

/// A named pattern mined from response bodies, compiled once per crawl.
pub struct CustomField {
    pub name: String,
    pub pattern: Regex,
}

/// Element/attribute pairs that carry navigable URLs.
const EXTRACTION_RULES: &[(&str, &str)] = &[
    ("a", "href"),
    ("link", "href"),
    ("area", "href"),
    ("base", "href"),
    ("blockquote", "cite"),
    ("script", "src"),
    ("img", "src"),
    ("iframe", "src"),
    ("frame", "src"),
    ("embed", "src"),
    ("audio", "src"),
    ("video", "src"),
    ("source", "src"),
    ("track", "src"),
    ("input", "src"),
    ("object", "data"),
    ("form", "action"),
    ("button", "formaction"),
];

/// Attribute values that can never become navigation requests.
const SKIP_PREFIXES: &[&str] = &["javascript:", "mailto:", "tel:", "data:"];

/// Walks the response document and emits one candidate per extracted URL.
///
/// Candidates carry the response's depth (already parent + 1) and the
/// tag/attribute they were mined from. Custom-field matches against the
/// body attach to every candidate emitted from this response.
pub fn parse_response(
    response: &Response,
    sink: &dyn CandidateSink,
    custom_fields: &[CustomField],
) {
    let body = response.body_text();
    let matches = match_custom_fields(&body, custom_fields);
    let document = Html::parse_document(&body);

    for (tag, attribute) in EXTRACTION_RULES {
        let selector = match Selector::parse(&format!("{}[{}]", tag, attribute)) {
            Ok(selector) => selector,
            Err(_) => continue,
        };
        for element in document.select(&selector) {
            let Some(value) = element.value().attr(attribute) else {
                continue;
            };
            if skip_value(value) {
                continue;
            }
            if let Some(mut request) = Request::from_response(value, tag, attribute, response)
            {
                request.custom_fields = matches.clone();
                sink.emit(request);
            }
        }
    }
}

fn skip_value(value: &str) -> bool {
    let lowered = value.trim_start().to_ascii_lowercase();
    SKIP_PREFIXES.iter().any(|p| lowered.starts_with(p))
}

fn match_custom_fields(
    body: &str,
    custom_fields: &[CustomField],
) -> HashMap<String, Vec<String>> {
    let mut matches: HashMap<String, Vec<String>> = HashMap::new();
    for field in custom_fields {
        let mut values: Vec<String> = field
            .pattern
            .find_iter(body)
            .map(|m| m.as_str().to_string())
            .collect();
        if !values.is_empty() {
            values.sort();
            values.dedup();
            matches.insert(field.name.clone(), values);
        }
    }
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use url::Url;

    struct CollectSink {
        requests: Mutex<Vec<Request>>,
    }

    impl CollectSink {
        fn new() -> Self {
            CollectSink {
                requests: Mutex::new(Vec::new()),
            }
        }

        fn urls(&self) -> Vec<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.url.clone())
                .collect()
        }
    }

    impl CandidateSink for CollectSink {
        fn emit(&self, request: Request) {
            self.requests.lock().unwrap().push(request);
        }
    }

    fn response_with(body: &str) -> Response {
        Response {
            url: Url::parse("http://example.com/").unwrap(),
            status: 200,
            headers: Vec::new(),
            body: body.as_bytes().to_vec(),
            depth: 1,
            root_hostname: "example.com".to_string(),
            technologies: Vec::new(),
        }
    }

    #[test]
    fn test_extracts_anchors_and_scripts() {
        let resp = response_with(
            r#"<html><body>
                <a href="/about">About</a>
                <script src="/app.js"></script>
            </body></html>"#,
        );
        let sink = CollectSink::new();
        parse_response(&resp, &sink, &[]);

        let urls = sink.urls();
        assert!(urls.contains(&"http://example.com/about".to_string()));
        assert!(urls.contains(&"http://example.com/app.js".to_string()));
    }

    #[test]
    fn test_provenance_recorded() {
        let resp = response_with(r#"<img src="/logo.png">"#);
        let sink = CollectSink::new();
        parse_response(&resp, &sink, &[]);

        let requests = sink.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].tag, "img");
        assert_eq!(requests[0].attribute, "src");
        assert_eq!(requests[0].depth, 1);
        assert_eq!(requests[0].source, "http://example.com/");
    }

    #[test]
    fn test_skips_pseudo_schemes_and_fragments() {
        let resp = response_with(
            r##"<a href="javascript:void(0)">x</a>
               <a href="mailto:a@b.c">y</a>
               <a href="#top">z</a>
               <a href="tel:+15551234">w</a>"##,
        );
        let sink = CollectSink::new();
        parse_response(&resp, &sink, &[]);
        assert!(sink.urls().is_empty());
    }

    #[test]
    fn test_form_action_extracted() {
        let resp = response_with(r#"<form action="/search"><input name="q"></form>"#);
        let sink = CollectSink::new();
        parse_response(&resp, &sink, &[]);
        assert_eq!(sink.urls(), vec!["http://example.com/search".to_string()]);
    }

    #[test]
    fn test_custom_fields_attach_to_candidates() {
        let resp = response_with(
            r#"<body>contact: admin@example.com <a href="/next">n</a></body>"#,
        );
        let sink = CollectSink::new();
        let fields = vec![CustomField {
            name: "email".to_string(),
            pattern: Regex::new(r"[\w.]+@[\w.]+").unwrap(),
        }];
        parse_response(&resp, &sink, &fields);

        let requests = sink.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let values = requests[0].custom_fields.get("email").unwrap();
        assert_eq!(values, &vec!["admin@example.com".to_string()]);
    }

    #[test]
    fn test_duplicate_links_emitted_each_time() {
        // Dedup is the sink's concern, not the parser's.
        let resp = response_with(r#"<a href="/a">1</a><a href="/a">2</a>"#);
        let sink = CollectSink::new();
        parse_response(&resp, &sink, &[]);
        assert_eq!(sink.urls().len(), 2);
    }
}
