//! Known-file probing: mine well-known metadata files for candidates.
//!
//! robots.txt is a map of what the operator considers interesting enough
//! to allow or sensitive enough to disallow. Both directives are URLs
//! worth knowing about, so every path becomes a candidate; the file is
//! mined, not enforced.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use url::Url;

use crate::config::Options;
use crate::crawler::CrawlContext;
use crate::navigation::Request;

pub struct RobotsProbe {
    client: Client,
}

impl RobotsProbe {
    pub fn new(options: &Options) -> reqwest::Result<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(Duration::from_secs(options.timeout))
            .build()?;
        Ok(RobotsProbe { client })
    }

    /// Fetches `{root}/robots.txt` and feeds every directive path into the
    /// crawl as a candidate. Probe failures are silent; absence of a
    /// robots.txt is the common case, not an error.
    pub async fn probe(&self, root: &Url, crawl: &Arc<CrawlContext>) {
        let Ok(robots_url) = root.join("/robots.txt") else {
            return;
        };
        let body = match self.client.get(robots_url.clone()).send().await {
            Ok(response) if response.status().is_success() => {
                match response.text().await {
                    Ok(text) => text,
                    Err(_) => return,
                }
            }
            _ => return,
        };

        for path in directive_paths(&body) {
            let Ok(mut resolved) = root.join(&path) else {
                continue;
            };
            resolved.set_fragment(None);
            crawl.accept(Request {
                method: "GET".to_string(),
                url: resolved.to_string(),
                depth: 1,
                tag: "file".to_string(),
                attribute: "robotstxt".to_string(),
                source: robots_url.to_string(),
                root_hostname: crawl.root_hostname().to_string(),
                ..Default::default()
            });
        }
    }
}

/// Extracts the path values of Allow/Disallow directives.
fn directive_paths(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|line| {
            let line = line.trim();
            let (directive, value) = line.split_once(':')?;
            let directive = directive.trim().to_ascii_lowercase();
            if directive != "allow" && directive != "disallow" {
                return None;
            }
            let value = value.trim();
            if value.is_empty() || value == "/" {
                return None;
            }
            Some(value.to_string())
        })
        .collect()
}
