//! Navigation primitives shared by both fetch backends.
//!
//! A [`Request`] is a frontier entry: a URL plus the provenance of its
//! discovery. A [`Response`] is what a backend hands to the extraction
//! pipeline, regardless of whether it came from a plain HTTP exchange or
//! an intercepted browser network event.

mod request;
mod response;

pub use request::Request;
pub use response::Response;

/// Checks that a string parses as an absolute http(s) URL.
///
/// Candidates that fail this check are dropped silently by the crawler;
/// they are expected noise (javascript:, mailto:, malformed fragments),
/// not errors worth reporting.
pub fn is_web_url(candidate: &str) -> bool {
    match url::Url::parse(candidate) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https"),
        Err(_) => false,
    }
}
