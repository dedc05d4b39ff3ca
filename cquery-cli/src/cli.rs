//! Command-line flags

use crate::CliResult;
use clap::{ArgAction, Parser};
use convenient_cquery::{OutputFormat, OutputOptions};
use std::path::PathBuf;

/// cquery-fmt - format streamed cquery results
#[derive(Parser, Debug, Clone)]
#[command(name = "cquery-fmt")]
#[command(about = "Formats configured query results as proto, textproto or jsonproto")]
#[command(version)]
pub struct Cli {
    /// Output format: proto, textproto or jsonproto
    #[arg(short, long, default_value = "jsonproto", env = "CQUERY_OUTPUT_FORMAT")]
    pub format: String,

    /// Emit configured targets with their configuration checksum
    #[arg(long, default_value_t = true, action = ArgAction::Set, env = "CQUERY_INCLUDE_CONFIGURATIONS")]
    pub include_configurations: bool,

    /// Emit attributes that were not set explicitly
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub include_default_values: bool,

    /// Comma separated attribute names to emit, or "all"
    #[arg(long, value_delimiter = ',', default_value = "all")]
    pub output_rule_attrs: Vec<String>,

    /// Emit rule inputs and outputs
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub include_rule_inputs_and_outputs: bool,

    /// Sort results by label and configuration
    #[arg(long, env = "CQUERY_STABLE_ORDER")]
    pub stable_order: bool,

    /// Worker threads used to build records (defaults to one per CPU)
    #[arg(short, long, env = "CQUERY_JOBS")]
    pub jobs: Option<usize>,

    /// JSON Lines input, one batch per line (defaults to stdin)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl Cli {
    /// Output options selected by the flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the format name is unknown.
    pub fn output_options(&self) -> CliResult<OutputOptions> {
        let format: OutputFormat = self.format.parse()?;
        Ok(OutputOptions {
            format,
            include_configurations: self.include_configurations,
            include_default_values: self.include_default_values,
            output_rule_attrs: self.output_rule_attrs.clone(),
            include_rule_inputs_and_outputs: self.include_rule_inputs_and_outputs,
            stable_order: self.stable_order,
        })
    }
}
