//! Streaming output callback driven by the query engine
//!
//! The engine calls [`start`](CqueryOutputCallback::start) once, feeds partial
//! results through [`process_output`](CqueryOutputCallback::process_output)
//! from any number of threads, then calls
//! [`close`](CqueryOutputCallback::close) exactly once.

use crate::aggregator::ResultAggregator;
use crate::encoder::OutputEncoder;
use crate::error::OutputResult;
use crate::options::OutputOptions;
use crate::record::{QueriedTarget, TargetRecord, TargetRecordBuilder};
use crate::resolver::{AttributeResolver, ConfiguredAttributeResolver};
use std::io::Write;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Proto-family output formatter for configured query results
#[derive(Debug)]
pub struct CqueryOutputCallback<W, R = ConfiguredAttributeResolver> {
    builder: TargetRecordBuilder<R>,
    aggregator: ResultAggregator,
    encoder: OutputEncoder,
    sink: Mutex<W>,
}

impl<W: Write + Send> CqueryOutputCallback<W, ConfiguredAttributeResolver> {
    /// Callback with standard `select()` resolution
    pub fn new(options: OutputOptions, sink: W) -> Self {
        Self::with_resolver(ConfiguredAttributeResolver::new(), options, sink)
    }
}

impl<W: Write + Send, R: AttributeResolver> CqueryOutputCallback<W, R> {
    /// Callback with a custom attribute resolver
    pub fn with_resolver(resolver: R, options: OutputOptions, sink: W) -> Self {
        let encoder = OutputEncoder::from_options(&options);
        Self {
            builder: TargetRecordBuilder::with_resolver(resolver, options),
            aggregator: ResultAggregator::new(),
            encoder,
            sink: Mutex::new(sink),
        }
    }

    /// Output format name (`proto`, `textproto` or `jsonproto`)
    pub fn name(&self) -> &'static str {
        self.encoder.format().format_name()
    }

    /// Begin collecting results.
    ///
    /// # Errors
    ///
    /// Returns `OutputError::AggregationAlreadyStarted` if called twice.
    pub fn start(&self) -> OutputResult<()> {
        debug!("Starting {} output", self.name());
        self.aggregator.start()
    }

    /// Convert one batch of configured targets and collect the records.
    ///
    /// Safe to call concurrently; each batch lands contiguously.
    ///
    /// # Errors
    ///
    /// Propagates record building and aggregation errors.
    pub fn process_output(&self, partial_result: &[QueriedTarget]) -> OutputResult<()> {
        let records = self.build_records(partial_result)?;
        self.append_records(records)
    }

    /// Convert one batch without collecting it.
    ///
    /// Lets a caller build batches in parallel and collect them afterwards in
    /// a fixed order.
    ///
    /// # Errors
    ///
    /// Propagates record building errors.
    pub fn build_records(&self, partial_result: &[QueriedTarget]) -> OutputResult<Vec<TargetRecord>> {
        self.builder.build_batch(partial_result)
    }

    /// Collect records built by [`build_records`](Self::build_records).
    ///
    /// # Errors
    ///
    /// Returns an aggregation error if the stream is not collecting.
    pub fn append_records(&self, records: Vec<TargetRecord>) -> OutputResult<()> {
        self.aggregator.append(records)
    }

    /// Finish the stream and write the encoded result.
    ///
    /// With `fail_fast` set the query failed upstream: nothing is encoded and
    /// the sink is returned untouched.
    ///
    /// # Errors
    ///
    /// Propagates finalization, rendering and I/O errors; on error nothing
    /// was written.
    pub fn close(self, fail_fast: bool) -> OutputResult<W> {
        let mut sink = self
            .sink
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if fail_fast {
            warn!("Query failed; discarding {} collected targets", self.aggregator.len());
            return Ok(sink);
        }

        let result_set = self.aggregator.finalize()?;
        self.encoder.encode(result_set, &mut sink)?;
        Ok(sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{AttributeDef, AttributeType, RuleDefinition};
    use crate::condition::{ConfigConditions, ConfigurationToken};
    use crate::error::OutputError;
    use crate::options::OutputFormat;

    fn target(label: &str) -> QueriedTarget {
        QueriedTarget::rule(
            RuleDefinition::new(label, "sh_binary")
                .with_attribute(AttributeDef::literal("srcs", AttributeType::LabelList, vec![format!("{label}.sh")])),
            ConfigurationToken::new("cfg1"),
            ConfigConditions::new(),
        )
    }

    #[test]
    fn test_name_follows_format() {
        let callback = CqueryOutputCallback::new(OutputOptions::with_format(OutputFormat::Text), Vec::new());
        assert_eq!(callback.name(), "textproto");
    }

    #[test]
    fn test_close_writes_once() {
        let callback = CqueryOutputCallback::new(OutputOptions::with_format(OutputFormat::Json), Vec::new());
        callback.start().unwrap();
        callback.process_output(&[target("//tools:a")]).unwrap();
        callback.process_output(&[target("//tools:b")]).unwrap();

        let out = String::from_utf8(callback.close(false).unwrap()).unwrap();
        assert!(out.contains("//tools:a"));
        assert!(out.contains("//tools:b"));
        assert!(out.ends_with('\n'));
    }

    #[test]
    fn test_fail_fast_writes_nothing() {
        let callback = CqueryOutputCallback::new(OutputOptions::with_format(OutputFormat::Json), Vec::new());
        callback.start().unwrap();
        callback.process_output(&[target("//tools:a")]).unwrap();
        assert!(callback.close(true).unwrap().is_empty());
    }

    #[test]
    fn test_records_appended_in_caller_order() {
        let callback = CqueryOutputCallback::new(OutputOptions::with_format(OutputFormat::Json), Vec::new());
        callback.start().unwrap();
        let late = callback.build_records(&[target("//tools:b")]).unwrap();
        let early = callback.build_records(&[target("//tools:a")]).unwrap();
        callback.append_records(early).unwrap();
        callback.append_records(late).unwrap();

        let out = String::from_utf8(callback.close(false).unwrap()).unwrap();
        assert!(out.find("//tools:a").unwrap() < out.find("//tools:b").unwrap());
    }

    #[test]
    fn test_process_before_start_fails() {
        let callback = CqueryOutputCallback::new(OutputOptions::default(), Vec::new());
        let err = callback.process_output(&[target("//tools:a")]).unwrap_err();
        assert!(matches!(err, OutputError::AggregationNotStarted));
    }
}
