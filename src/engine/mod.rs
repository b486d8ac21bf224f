//! Fetch backends.
//!
//! A backend turns a frontier [`Request`](crate::navigation::Request) into
//! a [`Response`](crate::navigation::Response). The crawler selects one at
//! construction time and holds it for its whole lifetime; call sites never
//! branch on the configured mode.

pub mod browser;
mod dom;
pub mod known_files;
pub mod plain;

use std::sync::Arc;

use crate::crawler::CrawlContext;
use crate::navigation::{Request, Response};
use crate::FetchResult;

pub use browser::BrowserBackend;
pub use known_files::RobotsProbe;
pub use plain::PlainBackend;

/// The selected fetch backend for a crawler instance.
pub enum Backend {
    Plain(PlainBackend),
    Browser(BrowserBackend),
}

impl Backend {
    /// Fetches one request. `Ok(None)` means the fetch succeeded but
    /// produced nothing new to extract (the browser backend returns this
    /// when the rendered document's content was already seen).
    pub async fn fetch(
        &self,
        request: &Request,
        crawl: &Arc<CrawlContext>,
    ) -> FetchResult<Option<Response>> {
        match self {
            Backend::Plain(plain) => plain.fetch(request, crawl).await.map(Some),
            Backend::Browser(browser) => browser.fetch(request, crawl).await,
        }
    }

    /// Called at the start of each crawl; the browser backend opens an
    /// isolated browsing context so crawls never share cookies or storage.
    pub async fn begin_crawl(&self) {
        if let Backend::Browser(browser) = self {
            browser.begin_crawl().await;
        }
    }

    /// Counterpart to [`Backend::begin_crawl`].
    pub async fn end_crawl(&self) {
        if let Backend::Browser(browser) = self {
            browser.end_crawl().await;
        }
    }

    /// Releases backend resources. Idempotent; called once at shutdown.
    pub async fn close(&self) {
        if let Backend::Browser(browser) = self {
            browser.close().await;
        }
    }
}
