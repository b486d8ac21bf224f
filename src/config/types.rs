//! Configuration types, deserialized from TOML with kebab-case keys.
//!
//! Every field has a default so a config file only needs to name what it
//! changes. CLI flags override the loaded values in `main`.

use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::parser::CustomField;
use crate::scope::FieldScope;
use crate::{ConfigError, Strategy};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Options {
    /// Maximum discovery depth. 0 means unbounded; validation then
    /// requires a crawl duration instead.
    pub max_depth: usize,
    /// Wall-clock budget per crawl, in seconds. 0 means unbounded.
    pub crawl_duration: u64,
    /// Worker pool size per crawl.
    pub concurrency: usize,
    /// Fixed delay before each request, in seconds.
    pub delay: u64,
    /// Requests per second across the pool. 0 disables.
    pub rate_limit: u32,
    /// Requests per minute across the pool. 0 disables.
    pub rate_limit_minute: u32,
    /// Retries for transient network failures.
    pub retries: u32,
    /// Per-request timeout, in seconds.
    pub timeout: u64,
    pub proxy: Option<String>,
    pub user_agent: Option<String>,
    pub strategy: Strategy,
    pub field_scope: FieldScope,
    /// In-scope regex patterns over the full URL. Empty means field
    /// scope decides.
    pub scope: Vec<String>,
    /// Out-of-scope regex patterns; these beat everything else.
    pub out_of_scope: Vec<String>,
    /// Disable scope checks entirely.
    pub no_scope: bool,
    /// Report out-of-scope discoveries instead of dropping them.
    pub display_out_scope: bool,
    /// Probe robots.txt for extra candidates before crawling.
    pub known_files: bool,
    /// Extra headers sent with every plain-backend request.
    pub headers: HashMap<String, String>,
    pub headless: HeadlessConfig,
    pub custom_fields: Vec<CustomFieldConfig>,
    pub output: OutputConfig,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            max_depth: 3,
            crawl_duration: 0,
            concurrency: 10,
            delay: 0,
            rate_limit: 0,
            rate_limit_minute: 0,
            retries: 1,
            timeout: 10,
            proxy: None,
            user_agent: None,
            strategy: Strategy::default(),
            field_scope: FieldScope::default(),
            scope: Vec::new(),
            out_of_scope: Vec::new(),
            no_scope: false,
            display_out_scope: false,
            known_files: false,
            headers: HashMap::new(),
            headless: HeadlessConfig::default(),
            custom_fields: Vec::new(),
            output: OutputConfig::default(),
        }
    }
}

impl Options {
    /// Compiles the configured custom-field patterns, once per crawl.
    pub fn compiled_custom_fields(&self) -> Result<Vec<CustomField>, ConfigError> {
        self.custom_fields
            .iter()
            .map(|field| {
                let pattern =
                    Regex::new(&field.pattern).map_err(|e| ConfigError::InvalidPattern {
                        pattern: field.pattern.clone(),
                        message: e.to_string(),
                    })?;
                Ok(CustomField {
                    name: field.name.clone(),
                    pattern,
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HeadlessConfig {
    /// Use the browser backend instead of the plain HTTP client.
    pub enabled: bool,
    /// Run the browser with a visible window.
    pub show_browser: bool,
    /// Pass --no-sandbox to the browser (containers, root).
    pub no_sandbox: bool,
    /// Share one browsing context across crawls instead of isolating.
    pub no_incognito: bool,
    /// Use this Chrome/Chromium binary instead of autodetection.
    pub system_chrome_path: Option<String>,
}

impl HeadlessConfig {
    /// True when any sub-option is set; they only mean something with
    /// the browser backend enabled.
    pub fn any_suboption_set(&self) -> bool {
        self.show_browser
            || self.no_sandbox
            || self.no_incognito
            || self.system_chrome_path.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Results file (JSONL or plain URLs, per `json`).
    pub file: Option<String>,
    /// Error records file (always JSONL).
    pub error_log: Option<String>,
    /// Emit JSON lines instead of bare URLs.
    pub json: bool,
    /// Suppress screen output.
    pub silent: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CustomFieldConfig {
    pub name: String,
    pub pattern: String,
}
