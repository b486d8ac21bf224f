//! Plain HTTP fetch backend.
//!
//! Redirects are followed manually so every hop can be reported as a
//! discovery in its own right; the client itself never redirects. Retries
//! apply only to transient transport failures (timeouts, connection
//! resets). HTTP error statuses are responses, not failures: a 404 still
//! has a body worth mining.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::redirect::Policy;
use reqwest::Client;
use url::Url;

use crate::config::Options;
use crate::crawler::CrawlContext;
use crate::navigation::{Request, Response};
use crate::{FetchError, FetchResult};

/// Redirect hops followed within a single fetch before giving up.
const MAX_REDIRECTS: u32 = 10;

/// Responses are truncated to this many bytes before extraction.
const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

const DEFAULT_USER_AGENT: &str = concat!("spinneret/", env!("CARGO_PKG_VERSION"));

pub struct PlainBackend {
    client: Client,
    retries: u32,
    headers: HashMap<String, String>,
}

impl PlainBackend {
    pub fn new(options: &Options) -> crate::Result<Self> {
        Ok(PlainBackend {
            client: build_client(options)?,
            retries: options.retries,
            headers: options.headers.clone(),
        })
    }

    /// Fetches one request, following redirects up to [`MAX_REDIRECTS`].
    ///
    /// Each hop's target is reported through the crawl context at the
    /// candidate's depth but not re-enqueued: the chain is already being
    /// followed here, and fetching intermediate hops again would only
    /// repeat it.
    pub async fn fetch(
        &self,
        request: &Request,
        crawl: &Arc<CrawlContext>,
    ) -> FetchResult<Response> {
        let mut current =
            Url::parse(&request.url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
        let mut hops = 0u32;
        let mut first = true;

        loop {
            let response = self.send_with_retries(&current, request, first).await?;
            first = false;

            if response.status().is_redirection() {
                hops += 1;
                if hops > MAX_REDIRECTS {
                    return Err(FetchError::TooManyRedirects {
                        url: request.url.clone(),
                    });
                }
                let location = response
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| FetchError::Http {
                        url: current.to_string(),
                        message: "redirect without Location header".to_string(),
                    })?;
                let mut next = current
                    .join(location)
                    .map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
                next.set_fragment(None);

                crawl.record_hop(Request {
                    method: "GET".to_string(),
                    url: next.to_string(),
                    depth: request.depth + 1,
                    tag: "http".to_string(),
                    attribute: "location".to_string(),
                    source: current.to_string(),
                    root_hostname: request.root_hostname.clone(),
                    ..Default::default()
                });

                tracing::debug!("Following redirect {} -> {}", current, next);
                current = next;
                continue;
            }

            let status = response.status().as_u16();
            let headers: Vec<(String, String)> = response
                .headers()
                .iter()
                .filter_map(|(k, v)| {
                    v.to_str()
                        .ok()
                        .map(|v| (k.as_str().to_string(), v.to_string()))
                })
                .collect();
            let mut body = response
                .bytes()
                .await
                .map_err(|e| FetchError::Http {
                    url: current.to_string(),
                    message: e.to_string(),
                })?
                .to_vec();
            body.truncate(MAX_BODY_BYTES);

            let technologies = crawl.fingerprint(&headers, &body);

            return Ok(Response {
                url: current,
                status,
                headers,
                body,
                depth: request.depth + 1,
                root_hostname: request.root_hostname.clone(),
                technologies,
            });
        }
    }

    async fn send_with_retries(
        &self,
        url: &Url,
        request: &Request,
        first: bool,
    ) -> FetchResult<reqwest::Response> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;

            // Only the original request carries the discovered method and
            // body; hops degrade to GET.
            let mut builder = if first && request.method == "POST" {
                self.client
                    .post(url.clone())
                    .body(request.body.clone().unwrap_or_default())
            } else {
                self.client.get(url.clone())
            };
            for (name, value) in self.headers.iter().chain(&request.headers) {
                builder = builder.header(name, value);
            }

            match builder.send().await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_timeout() || e.is_connect() => {
                    if attempt > self.retries {
                        return Err(FetchError::Transient {
                            url: url.to_string(),
                            attempts: attempt,
                            message: e.to_string(),
                        });
                    }
                    let backoff = Duration::from_millis(500 * attempt as u64);
                    tracing::debug!(
                        "Attempt {} for {} failed ({}), retrying in {:?}",
                        attempt,
                        url,
                        e,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    return Err(FetchError::Http {
                        url: url.to_string(),
                        message: e.to_string(),
                    })
                }
            }
        }
    }
}

fn build_client(options: &Options) -> reqwest::Result<Client> {
    let mut builder = Client::builder()
        .redirect(Policy::none())
        .danger_accept_invalid_certs(true)
        .timeout(Duration::from_secs(options.timeout))
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(options.concurrency)
        .user_agent(
            options
                .user_agent
                .clone()
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        )
        .gzip(true)
        .brotli(true);
    if let Some(proxy) = &options.proxy {
        builder = builder.proxy(reqwest::Proxy::all(proxy)?);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_client_defaults() {
        let options = Options::default();
        assert!(build_client(&options).is_ok());
    }

    #[test]
    fn test_build_client_bad_proxy_rejected() {
        let options = Options {
            proxy: Some("::not a proxy::".to_string()),
            ..Default::default()
        };
        assert!(build_client(&options).is_err());
    }
}
