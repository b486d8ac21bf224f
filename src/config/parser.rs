//! TOML configuration loading.

use std::path::Path;

use crate::ConfigResult;

use super::types::Options;

/// Loads and validates options from a TOML file.
pub fn load_options(path: &Path) -> ConfigResult<Options> {
    let contents = std::fs::read_to_string(path)?;
    parse_options(&contents)
}

/// Parses options from TOML text and validates them.
pub fn parse_options(contents: &str) -> ConfigResult<Options> {
    let options: Options = toml::from_str(contents)?;
    super::validate(&options)?;
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FieldScope, Strategy};

    #[test]
    fn test_parse_minimal_config() {
        let options = parse_options("max-depth = 2\n").unwrap();
        assert_eq!(options.max_depth, 2);
        assert_eq!(options.concurrency, 10);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            max-depth = 4
            concurrency = 5
            rate-limit = 20
            timeout = 15
            strategy = "depth-first"
            field-scope = "root-domain"
            out-of-scope = ["/logout"]
            known-files = true

            [headless]
            enabled = true
            no-sandbox = true

            [[custom-fields]]
            name = "email"
            pattern = '[\w.]+@[\w.]+'

            [output]
            file = "results.jsonl"
            json = true
        "#;
        let options = parse_options(toml).unwrap();
        assert_eq!(options.max_depth, 4);
        assert_eq!(options.strategy, Strategy::DepthFirst);
        assert_eq!(options.field_scope, FieldScope::RootDomain);
        assert!(options.headless.enabled);
        assert!(options.headless.no_sandbox);
        assert_eq!(options.custom_fields.len(), 1);
        assert_eq!(options.output.file.as_deref(), Some("results.jsonl"));
        assert!(options.output.json);
    }

    #[test]
    fn test_parse_rejects_invalid_toml() {
        assert!(parse_options("max-depth = [").is_err());
    }

    #[test]
    fn test_parse_rejects_invalid_values() {
        // Validation runs as part of parsing.
        assert!(parse_options("concurrency = 0\n").is_err());
    }

    #[test]
    fn test_load_options_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "max-depth = 1\n").unwrap();
        let options = load_options(&path).unwrap();
        assert_eq!(options.max_depth, 1);
    }

    #[test]
    fn test_load_options_missing_file() {
        assert!(load_options(Path::new("/nonexistent/config.toml")).is_err());
    }
}
