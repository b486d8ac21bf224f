//! Headless-browser fetch backend, driven over CDP.
//!
//! One browser process lives for the backend's whole lifetime; each crawl
//! gets an isolated incognito context and each navigation gets a fresh
//! page that is closed on every exit path. Network responses are
//! intercepted at the Response stage, mined for candidates, and then
//! continued unmodified, so the page loads exactly what it would have
//! loaded anyway.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chromiumoxide::browser::{Browser, BrowserConfig, HeadlessMode};
use chromiumoxide::cdp::browser_protocol::dom::GetDocumentParams;
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, GetResponseBodyParams,
    RequestPattern, RequestStage,
};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use url::Url;

use super::dom;
use crate::config::Options;
use crate::crawler::CrawlContext;
use crate::navigation::{Request, Response};
use crate::{FetchError, FetchResult, SpinneretError};

pub struct BrowserBackend {
    browser: Mutex<Browser>,
    handler_task: JoinHandle<()>,
    profile_dir: PathBuf,
    navigation_timeout: Duration,
    incognito: bool,
}

impl BrowserBackend {
    /// Launches the browser process. Failure here aborts the run; there is
    /// no point starting a browser-mode crawl without a browser.
    pub async fn launch(options: &Options) -> crate::Result<Self> {
        let profile_dir =
            std::env::temp_dir().join(format!("spinneret-profile-{}", std::process::id()));
        std::fs::create_dir_all(&profile_dir)?;

        let mut builder = BrowserConfig::builder()
            .request_timeout(Duration::from_secs(30))
            .window_size(1920, 1080)
            .user_data_dir(&profile_dir)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-notifications")
            .arg("--disable-background-networking")
            .arg("--disable-popup-blocking")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--ignore-certificate-errors")
            .arg("--mute-audio");

        if options.headless.show_browser {
            builder = builder.with_head();
        } else {
            builder = builder.headless_mode(HeadlessMode::default());
        }
        if options.headless.no_sandbox {
            builder = builder.arg("--no-sandbox").arg("--disable-setuid-sandbox");
        }
        if let Some(path) = &options.headless.system_chrome_path {
            builder = builder.chrome_executable(path);
        }
        if let Some(proxy) = &options.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }

        let config = builder
            .build()
            .map_err(SpinneretError::BrowserLaunch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| SpinneretError::BrowserLaunch(e.to_string()))?;

        // The handler drives the CDP websocket; without this task nothing
        // ever resolves. Chrome occasionally sends events chromiumoxide
        // cannot deserialize; those are noise, not failures.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    let message = e.to_string();
                    let benign = message
                        .contains("data did not match any variant of untagged enum Message")
                        || message.contains("Failed to deserialize WS response");
                    if benign {
                        tracing::trace!("Suppressed CDP serialization error: {}", message);
                    } else {
                        tracing::error!("Browser handler error: {}", message);
                    }
                }
            }
            tracing::debug!("Browser handler task finished");
        });

        Ok(BrowserBackend {
            browser: Mutex::new(browser),
            handler_task,
            profile_dir,
            navigation_timeout: Duration::from_secs(options.timeout),
            incognito: !options.headless.no_incognito,
        })
    }

    /// Opens an isolated browsing context so crawls never share cookies
    /// or storage. Isolation failures degrade to the default context.
    pub async fn begin_crawl(&self) {
        if !self.incognito {
            return;
        }
        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.start_incognito_context().await {
            tracing::warn!("Failed to open incognito context: {}", e);
        }
    }

    pub async fn end_crawl(&self) {
        if !self.incognito {
            return;
        }
        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.quit_incognito_context().await {
            tracing::debug!("Failed to close incognito context: {}", e);
        }
    }

    /// Navigates one request in a fresh page and extracts candidates from
    /// both the pierced DOM snapshot and the outer HTML.
    ///
    /// Returns `Ok(None)` when the rendered document's content was
    /// already seen in this crawl; there is nothing new to extract.
    pub async fn fetch(
        &self,
        request: &Request,
        crawl: &Arc<CrawlContext>,
    ) -> FetchResult<Option<Response>> {
        let page = {
            let browser = self.browser.lock().await;
            browser
                .new_page("about:blank")
                .await
                .map_err(|e| FetchError::BrowserSession(e.to_string()))?
        };

        let interceptor = arm_interception(&page, request, crawl).await;
        let result = self.navigate(&page, request, crawl).await;

        if let Ok(task) = interceptor {
            task.abort();
        }
        if let Err(e) = page.close().await {
            tracing::debug!("Failed to close page for {}: {}", request.url, e);
        }
        result
    }

    async fn navigate(
        &self,
        page: &Page,
        request: &Request,
        crawl: &Arc<CrawlContext>,
    ) -> FetchResult<Option<Response>> {
        match tokio::time::timeout(self.navigation_timeout, page.goto(request.url.clone())).await
        {
            Err(_) => {
                return Err(FetchError::NavigationTimeout {
                    url: request.url.clone(),
                })
            }
            Ok(Err(e)) => return Err(FetchError::BrowserSession(e.to_string())),
            Ok(Ok(_)) => {}
        }

        // A page that never settles can still have a DOM worth mining.
        match tokio::time::timeout(self.navigation_timeout, page.wait_for_navigation()).await {
            Err(_) => tracing::debug!(
                "Load wait timed out for {}, extracting current document state",
                request.url
            ),
            Ok(Err(e)) => tracing::debug!("Load wait failed for {}: {}", request.url, e),
            Ok(Ok(_)) => {}
        }

        let final_url = match page.url().await {
            Ok(Some(current)) => Url::parse(&current).ok(),
            _ => None,
        };
        let final_url = match final_url {
            Some(url) => url,
            None => Url::parse(&request.url)
                .map_err(|e| FetchError::InvalidUrl(e.to_string()))?,
        };

        let document = page
            .execute(GetDocumentParams::builder().depth(-1).pierce(true).build())
            .await
            .map_err(|e| FetchError::Dom(e.to_string()))?;
        let flattened = dom::flatten(&document.result.root);

        let template = Response {
            url: final_url,
            status: 200,
            headers: Vec::new(),
            body: Vec::new(),
            depth: request.depth + 1,
            root_hostname: request.root_hostname.clone(),
            technologies: Vec::new(),
        };

        // First pass: the flattened snapshot, which reaches shadow DOM and
        // frame content the outer HTML never shows.
        if crawl.unique_content(flattened.as_bytes()) {
            let mut snapshot = template.clone();
            snapshot.body = flattened.into_bytes();
            crawl.process_response(&snapshot);
        }

        // Second pass: the outer HTML, handed back to the orchestrator.
        let html = page
            .content()
            .await
            .map_err(|e| FetchError::Dom(e.to_string()))?;
        if !crawl.unique_content(html.as_bytes()) {
            return Ok(None);
        }

        let mut response = template;
        response.body = html.into_bytes();
        response.technologies = crawl.fingerprint(&response.headers, &response.body);
        Ok(Some(response))
    }

    /// Shuts the browser down and removes the temp profile. Ordering
    /// matters: close the process, reap it, stop the handler, then delete
    /// the profile directory it was writing to.
    pub async fn close(&self) {
        {
            let mut browser = self.browser.lock().await;
            if let Err(e) = browser.close().await {
                tracing::warn!("Failed to close browser: {}", e);
            }
            if let Err(e) = browser.wait().await {
                tracing::debug!("Failed to reap browser process: {}", e);
            }
        }
        self.handler_task.abort();
        if let Err(e) = std::fs::remove_dir_all(&self.profile_dir) {
            tracing::debug!(
                "Failed to remove profile dir {}: {}",
                self.profile_dir.display(),
                e
            );
        }
    }
}

/// Enables Fetch-domain interception at the Response stage and spawns the
/// task that mines every intercepted response. Requests are always
/// continued, even when body retrieval fails; stalling the page would
/// lose more than a missed body does.
async fn arm_interception(
    page: &Page,
    request: &Request,
    crawl: &Arc<CrawlContext>,
) -> FetchResult<JoinHandle<()>> {
    let pattern = RequestPattern::builder()
        .url_pattern("*")
        .request_stage(RequestStage::Response)
        .build();
    page.execute(EnableParams::builder().patterns(vec![pattern]).build())
        .await
        .map_err(|e| FetchError::BrowserSession(e.to_string()))?;

    let mut events = page
        .event_listener::<EventRequestPaused>()
        .await
        .map_err(|e| FetchError::BrowserSession(e.to_string()))?;

    let page = page.clone();
    let crawl = Arc::clone(crawl);
    let depth = request.depth + 1;
    let root_hostname = request.root_hostname.clone();

    Ok(tokio::spawn(async move {
        while let Some(event) = events.next().await {
            handle_intercepted(&page, &event, depth, &root_hostname, &crawl).await;
        }
    }))
}

async fn handle_intercepted(
    page: &Page,
    event: &EventRequestPaused,
    depth: usize,
    root_hostname: &str,
    crawl: &Arc<CrawlContext>,
) {
    let body = match page
        .execute(GetResponseBodyParams::new(event.request_id.clone()))
        .await
    {
        Ok(response) => {
            if response.result.base64_encoded {
                BASE64
                    .decode(response.result.body.as_bytes())
                    .unwrap_or_default()
            } else {
                response.result.body.clone().into_bytes()
            }
        }
        Err(e) => {
            tracing::trace!("No body for intercepted {}: {}", event.request.url, e);
            Vec::new()
        }
    };

    if let Err(e) = page
        .execute(ContinueRequestParams::new(event.request_id.clone()))
        .await
    {
        tracing::trace!("Failed to continue {}: {}", event.request.url, e);
    }

    if body.is_empty() || !crawl.unique_content(&body) {
        return;
    }
    let Ok(url) = Url::parse(&event.request.url) else {
        return;
    };

    let headers: Vec<(String, String)> = event
        .response_headers
        .clone()
        .unwrap_or_default()
        .into_iter()
        .map(|h| (h.name, h.value))
        .collect();
    let technologies = crawl.fingerprint(&headers, &body);

    let response = Response {
        url,
        status: event.response_status_code.unwrap_or(0) as u16,
        headers,
        body,
        depth,
        root_hostname: root_hostname.to_string(),
        technologies,
    };
    crawl.process_response(&response);
}
