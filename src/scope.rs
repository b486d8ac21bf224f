//! Scope evaluation: which discovered URLs belong to the crawl.
//!
//! Scope combines three layers. Exclusion patterns always win. Inclusion
//! patterns, when present, act as an allowlist over the full URL string.
//! With no patterns, the field scope decides by comparing the candidate's
//! hostname against the crawl's root hostname.

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::ConfigError;

/// Hostname comparison mode for pattern-free scope decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FieldScope {
    /// Exact hostname match only.
    Host,
    /// Root hostname and any of its subdomains.
    #[default]
    Subdomain,
    /// Any host sharing the root's registered domain.
    RootDomain,
}

impl std::str::FromStr for FieldScope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "host" | "fqdn" => Ok(FieldScope::Host),
            "subdomain" | "dn" => Ok(FieldScope::Subdomain),
            "root-domain" | "rdn" => Ok(FieldScope::RootDomain),
            other => Err(format!("unknown field scope: {}", other)),
        }
    }
}

/// Per-crawl scope filter.
pub struct ScopeManager {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
    field_scope: FieldScope,
    no_scope: bool,
}

impl ScopeManager {
    /// Compiles the scope patterns. Invalid regexes are configuration
    /// errors, surfaced before the crawl starts.
    pub fn new(
        include: &[String],
        exclude: &[String],
        field_scope: FieldScope,
        no_scope: bool,
    ) -> Result<Self, ConfigError> {
        Ok(ScopeManager {
            include: compile_patterns(include)?,
            exclude: compile_patterns(exclude)?,
            field_scope,
            no_scope,
        })
    }

    /// Decides whether `url` is in scope for a crawl rooted at
    /// `root_hostname`.
    pub fn validate(&self, url: &Url, root_hostname: &str) -> bool {
        if self.no_scope {
            return true;
        }
        let text = url.as_str();
        if self.exclude.iter().any(|re| re.is_match(text)) {
            return false;
        }
        if !self.include.is_empty() {
            return self.include.iter().any(|re| re.is_match(text));
        }
        let Some(host) = url.host_str() else {
            return false;
        };
        self.host_in_scope(host, root_hostname)
    }

    fn host_in_scope(&self, host: &str, root: &str) -> bool {
        let host = host.to_ascii_lowercase();
        let root = root.to_ascii_lowercase();
        match self.field_scope {
            FieldScope::Host => host == root,
            FieldScope::Subdomain => {
                host == root || host.ends_with(&format!(".{}", root))
            }
            FieldScope::RootDomain => {
                let registered = root_domain(&root);
                host == registered || host.ends_with(&format!(".{}", registered))
            }
        }
    }
}

/// Extracts the registered domain: the last two labels of the hostname.
///
/// A public-suffix list would be more precise; two labels is the behavior
/// callers can reason about without shipping one.
fn root_domain(hostname: &str) -> String {
    let labels: Vec<&str> = hostname.split('.').collect();
    if labels.len() <= 2 {
        hostname.to_string()
    } else {
        labels[labels.len() - 2..].join(".")
    }
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|e| ConfigError::InvalidPattern {
                pattern: p.clone(),
                message: e.to_string(),
            })
        })
        .collect()
}
