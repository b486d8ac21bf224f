//! Option validation, run before any crawl starts.
//!
//! Everything here fails fast: a bad regex or an impossible combination
//! is caught at startup, never mid-crawl.

use regex::Regex;

use crate::{ConfigError, ConfigResult};

use super::types::Options;

pub fn validate(options: &Options) -> ConfigResult<()> {
    if options.max_depth == 0 && options.crawl_duration == 0 {
        return Err(ConfigError::Validation(
            "either max-depth or crawl-duration must be set".to_string(),
        ));
    }
    if options.concurrency == 0 {
        return Err(ConfigError::Validation(
            "concurrency must be at least 1".to_string(),
        ));
    }
    if options.timeout == 0 {
        return Err(ConfigError::Validation(
            "timeout must be at least 1 second".to_string(),
        ));
    }
    if options.rate_limit > 0 && options.rate_limit_minute > 0 {
        return Err(ConfigError::Validation(
            "rate-limit and rate-limit-minute are mutually exclusive".to_string(),
        ));
    }
    if !options.headless.enabled && options.headless.any_suboption_set() {
        return Err(ConfigError::Validation(
            "headless sub-options require headless.enabled".to_string(),
        ));
    }
    if let Some(proxy) = &options.proxy {
        url::Url::parse(proxy).map_err(|e| {
            ConfigError::Validation(format!("invalid proxy URL {}: {}", proxy, e))
        })?;
    }

    compile_all(&options.scope)?;
    compile_all(&options.out_of_scope)?;
    for field in &options.custom_fields {
        if field.name.is_empty() {
            return Err(ConfigError::Validation(
                "custom field with empty name".to_string(),
            ));
        }
        compile(&field.pattern)?;
    }
    Ok(())
}

fn compile_all(patterns: &[String]) -> ConfigResult<()> {
    patterns.iter().try_for_each(|p| compile(p))
}

fn compile(pattern: &str) -> ConfigResult<()> {
    Regex::new(pattern)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
}
