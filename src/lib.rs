//! Spinneret: a concurrent web crawling engine
//!
//! This crate implements a web crawler built around a per-crawl frontier queue,
//! a scope and deduplication filter, and two interchangeable fetch backends:
//! a plain HTTP client and a headless-browser backend driven over CDP.

pub mod config;
pub mod crawler;
pub mod dedup;
pub mod engine;
pub mod frontier;
pub mod navigation;
pub mod output;
pub mod parser;
pub mod scope;

use thiserror::Error;

/// Main error type for crawl-aborting failures.
///
/// Per-request failures never surface here; they are reported as
/// [`output::ErrorRecord`]s and the crawl continues. Everything in this
/// enum terminates a crawl (or the whole run).
#[derive(Debug, Error)]
pub enum SpinneretError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("No seed URLs provided")]
    NoSeeds,

    #[error("Invalid seed URL {url}: {message}")]
    InvalidSeed { url: String, message: String },

    #[error("Failed to launch browser: {0}")]
    BrowserLaunch(String),

    #[error("Crawl cancelled: time budget exhausted")]
    CrawlCancelled,

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid scope pattern {pattern}: {message}")]
    InvalidPattern { pattern: String, message: String },
}

/// Per-request fetch failures.
///
/// These are swallowed at the worker boundary: the crawler converts them
/// into error records and moves on to the next frontier entry.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Too many redirects from {url}")]
    TooManyRedirects { url: String },

    #[error("Request to {url} failed after {attempts} attempts: {message}")]
    Transient {
        url: String,
        attempts: u32,
        message: String,
    },

    #[error("HTTP error for {url}: {message}")]
    Http { url: String, message: String },

    #[error("Navigation timed out for {url}")]
    NavigationTimeout { url: String },

    #[error("Browser session error: {0}")]
    BrowserSession(String),

    #[error("DOM retrieval error: {0}")]
    Dom(String),
}

/// Result type alias for crawl-level operations
pub type Result<T> = std::result::Result<T, SpinneretError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for fetch operations
pub type FetchResult<T> = std::result::Result<T, FetchError>;

// Re-export commonly used types
pub use config::Options;
pub use crawler::Crawler;
pub use frontier::Strategy;
pub use navigation::{Request, Response};
pub use scope::FieldScope;
