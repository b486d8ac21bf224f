//! Crawler configuration: TOML file plus CLI overrides.

mod parser;
mod types;
mod validation;

pub use parser::{load_options, parse_options};
pub use types::{CustomFieldConfig, HeadlessConfig, Options, OutputConfig};
pub use validation::validate;
