//! Output sinks for crawl results and per-request errors.
//!
//! The crawler only knows the [`Writer`] trait. [`StandardWriter`] is the
//! stock implementation: screen output (plain URLs or JSON lines) plus
//! optional JSONL files for results and errors. Writes are serialized by
//! a mutex per destination, so workers can report concurrently.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write as IoWrite};
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::navigation::Request;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Output IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type OutputResult<T> = std::result::Result<T, OutputError>;

/// How many body bytes a result record carries.
const BODY_EXCERPT_LIMIT: usize = 512;

/// One reported crawl finding.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlResult {
    pub timestamp: DateTime<Utc>,
    pub url: String,
    pub method: String,
    pub depth: usize,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tag: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub attribute: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub technologies: Vec<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub custom_fields: HashMap<String, Vec<String>>,
}

impl CrawlResult {
    pub fn from_request(request: &Request) -> Self {
        let body = request.body.as_ref().map(|b| {
            let mut end = b.len().min(BODY_EXCERPT_LIMIT);
            // Slicing mid-character would panic on multi-byte bodies.
            while !b.is_char_boundary(end) {
                end -= 1;
            }
            b[..end].to_string()
        });
        CrawlResult {
            timestamp: Utc::now(),
            url: request.url.clone(),
            method: request.method.clone(),
            depth: request.depth,
            source: request.source.clone(),
            tag: request.tag.clone(),
            attribute: request.attribute.clone(),
            headers: request.headers.clone(),
            body,
            technologies: request.source_technologies.clone(),
            custom_fields: request.custom_fields.clone(),
        }
    }
}

/// One per-request failure, reported without aborting the crawl.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub timestamp: DateTime<Utc>,
    pub endpoint: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source: String,
    pub error: String,
}

/// Sink for crawl findings and per-request errors.
///
/// Implementations must tolerate concurrent calls from worker tasks.
pub trait Writer: Send + Sync {
    fn write(&self, result: &CrawlResult) -> OutputResult<()>;
    fn write_err(&self, record: &ErrorRecord) -> OutputResult<()>;
    fn close(&self) -> OutputResult<()>;
}

/// Screen and file output.
pub struct StandardWriter {
    json: bool,
    silent: bool,
    file: Option<Mutex<BufWriter<File>>>,
    error_file: Option<Mutex<BufWriter<File>>>,
}

impl StandardWriter {
    pub fn new(
        json: bool,
        silent: bool,
        output_path: Option<&Path>,
        error_log_path: Option<&Path>,
    ) -> OutputResult<Self> {
        Ok(StandardWriter {
            json,
            silent,
            file: output_path.map(open_append).transpose()?,
            error_file: error_log_path.map(open_append).transpose()?,
        })
    }

    fn format(&self, result: &CrawlResult) -> OutputResult<String> {
        if self.json {
            Ok(serde_json::to_string(result)?)
        } else {
            Ok(result.url.clone())
        }
    }
}

fn open_append(path: &Path) -> OutputResult<Mutex<BufWriter<File>>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(Mutex::new(BufWriter::new(file)))
}

impl Writer for StandardWriter {
    fn write(&self, result: &CrawlResult) -> OutputResult<()> {
        let line = self.format(result)?;
        if !self.silent {
            println!("{}", line);
        }
        if let Some(file) = &self.file {
            let mut file = file.lock().unwrap_or_else(|e| e.into_inner());
            writeln!(file, "{}", line)?;
        }
        Ok(())
    }

    fn write_err(&self, record: &ErrorRecord) -> OutputResult<()> {
        tracing::warn!("Request to {} failed: {}", record.endpoint, record.error);
        if let Some(file) = &self.error_file {
            let line = serde_json::to_string(record)?;
            let mut file = file.lock().unwrap_or_else(|e| e.into_inner());
            writeln!(file, "{}", line)?;
        }
        Ok(())
    }

    fn close(&self) -> OutputResult<()> {
        if let Some(file) = &self.file {
            file.lock().unwrap_or_else(|e| e.into_inner()).flush()?;
        }
        if let Some(file) = &self.error_file {
            file.lock().unwrap_or_else(|e| e.into_inner()).flush()?;
        }
        Ok(())
    }
}

/// In-memory sink, used by tests and embedders that post-process results.
#[derive(Default)]
pub struct MemoryWriter {
    results: Mutex<Vec<CrawlResult>>,
    errors: Mutex<Vec<ErrorRecord>>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> Vec<CrawlResult> {
        self.results
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn errors(&self) -> Vec<ErrorRecord> {
        self.errors
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Writer for MemoryWriter {
    fn write(&self, result: &CrawlResult) -> OutputResult<()> {
        self.results
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(result.clone());
        Ok(())
    }

    fn write_err(&self, record: &ErrorRecord) -> OutputResult<()> {
        self.errors
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        Ok(())
    }

    fn close(&self) -> OutputResult<()> {
        Ok(())
    }
}
