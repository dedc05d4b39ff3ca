//! Output options
//!
//! Flags recognised by the cquery proto output formatters.

use crate::error::OutputError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Serialization used for the final result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Protobuf wire format
    Binary,
    /// Protobuf text format
    Text,
    /// Protobuf JSON mapping
    Json,
}

impl OutputFormat {
    /// Name of the format as given to `--output`
    pub fn format_name(self) -> &'static str {
        match self {
            OutputFormat::Binary => "proto",
            OutputFormat::Text => "textproto",
            OutputFormat::Json => "jsonproto",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.format_name())
    }
}

impl FromStr for OutputFormat {
    type Err = OutputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "proto" | "binary" => Ok(OutputFormat::Binary),
            "textproto" | "text" => Ok(OutputFormat::Text),
            "jsonproto" | "json" => Ok(OutputFormat::Json),
            _ => Err(OutputError::UnknownFormat(s.to_string())),
        }
    }
}

/// Attribute name list entry meaning "every attribute".
pub const ALL_ATTRIBUTES: &str = "all";

/// Options controlling record contents and encoding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputOptions {
    /// Output serialization
    pub format: OutputFormat,
    /// Keep the configuration checksum of every target
    pub include_configurations: bool,
    /// Emit attributes that were not explicitly set in the BUILD file
    pub include_default_values: bool,
    /// Attribute names to emit (`all` for every attribute)
    pub output_rule_attrs: Vec<String>,
    /// Emit `rule_input` and `rule_output` label lists
    pub include_rule_inputs_and_outputs: bool,
    /// Sort targets by label and configuration before encoding
    pub stable_order: bool,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::Binary,
            include_configurations: true,
            include_default_values: true,
            output_rule_attrs: vec![ALL_ATTRIBUTES.to_string()],
            include_rule_inputs_and_outputs: true,
            stable_order: false,
        }
    }
}

impl OutputOptions {
    /// Default options with the given format
    pub fn with_format(format: OutputFormat) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }

    /// Whether the attribute name passes the `output_rule_attrs` filter
    pub fn wants_attribute(&self, name: &str) -> bool {
        self.output_rule_attrs
            .iter()
            .any(|a| a == ALL_ATTRIBUTES || a == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parsing() {
        assert_eq!(OutputFormat::from_str("proto").unwrap(), OutputFormat::Binary);
        assert_eq!(OutputFormat::from_str("textproto").unwrap(), OutputFormat::Text);
        assert_eq!(OutputFormat::from_str("jsonproto").unwrap(), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str("JSON").unwrap(), OutputFormat::Json);
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        let err = OutputFormat::from_str("graph").unwrap_err();
        assert!(matches!(err, OutputError::UnknownFormat(ref f) if f == "graph"));
        assert_eq!(err.to_string(), "Unknown output format: graph");
    }

    #[test]
    fn test_format_name_round_trips() {
        for format in [OutputFormat::Binary, OutputFormat::Text, OutputFormat::Json] {
            assert_eq!(OutputFormat::from_str(format.format_name()).unwrap(), format);
        }
    }

    #[test]
    fn test_attribute_filter() {
        let mut options = OutputOptions::default();
        assert!(options.wants_attribute("deps"));

        options.output_rule_attrs = vec!["srcs".to_string(), "deps".to_string()];
        assert!(options.wants_attribute("deps"));
        assert!(!options.wants_attribute("copts"));
    }
}
