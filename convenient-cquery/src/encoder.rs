//! Final encoding of an aggregated result set
//!
//! With configurations included the result is a `CqueryResult`; otherwise the
//! records are narrowed to a plain `QueryResult`. Either message is then
//! rendered as protobuf binary, text format or JSON. Rendering happens fully
//! in memory so a failure never leaves partial output in the sink.

use crate::aggregator::ResultSet;
use crate::attribute::{AttributeType, AttributeValue};
use crate::error::OutputResult;
use crate::options::{OutputFormat, OutputOptions};
use crate::proto::{
    self, AttributeDiscriminator, ConfiguredTarget, CqueryResult, QueryResult, TargetType,
    TristateValue,
};
use crate::record::{ResolvedAttribute, TargetKind, TargetRecord};
use crate::textproto::TextMessage;
use prost::Message;
use std::io::Write;
use tracing::{debug, info};

/// Rendered output ready to be written to a sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedOutput {
    format: OutputFormat,
    payload: Vec<u8>,
}

impl EncodedOutput {
    /// Format the payload is in
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Encoded bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.payload
    }

    /// Take the encoded bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.payload
    }

    /// Write the payload in one call and flush the sink.
    ///
    /// # Errors
    ///
    /// Returns `OutputError::Io` if the sink fails.
    pub fn write_to<W: Write + ?Sized>(&self, sink: &mut W) -> OutputResult<()> {
        sink.write_all(&self.payload)?;
        sink.flush()?;
        Ok(())
    }
}

/// Schema-level view of a result set
#[derive(Debug, Clone, PartialEq)]
pub enum OutputMessage {
    /// Targets with configuration checksums
    Configured(CqueryResult),
    /// Targets only
    Narrowed(QueryResult),
}

impl OutputMessage {
    fn encode_binary(&self) -> OutputResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        match self {
            OutputMessage::Configured(m) => m.encode(&mut buf)?,
            OutputMessage::Narrowed(m) => m.encode(&mut buf)?,
        }
        Ok(buf)
    }

    fn encoded_len(&self) -> usize {
        match self {
            OutputMessage::Configured(m) => m.encoded_len(),
            OutputMessage::Narrowed(m) => m.encoded_len(),
        }
    }

    fn encode_text(&self) -> String {
        match self {
            OutputMessage::Configured(m) => m.to_text(),
            OutputMessage::Narrowed(m) => m.to_text(),
        }
    }

    fn encode_json(&self) -> OutputResult<Vec<u8>> {
        let mut buf = match self {
            OutputMessage::Configured(m) => serde_json::to_vec(m)?,
            OutputMessage::Narrowed(m) => serde_json::to_vec(m)?,
        };
        buf.push(b'\n');
        Ok(buf)
    }
}

/// Encodes a finalized result set in one output format
#[derive(Debug, Clone)]
pub struct OutputEncoder {
    format: OutputFormat,
    include_configurations: bool,
    stable_order: bool,
}

impl OutputEncoder {
    /// Encoder for the given format
    pub fn new(format: OutputFormat, include_configurations: bool) -> Self {
        Self {
            format,
            include_configurations,
            stable_order: false,
        }
    }

    /// Encoder configured from output options
    pub fn from_options(options: &OutputOptions) -> Self {
        Self {
            format: options.format,
            include_configurations: options.include_configurations,
            stable_order: options.stable_order,
        }
    }

    /// Sort targets by label and configuration before encoding
    pub fn with_stable_order(mut self, stable_order: bool) -> Self {
        self.stable_order = stable_order;
        self
    }

    /// Output format
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Build the full or narrowed message without touching the result set
    pub fn to_message(&self, result_set: &ResultSet) -> OutputMessage {
        let records: Vec<&TargetRecord> = if self.stable_order {
            result_set.sorted_records()
        } else {
            result_set.iter().collect()
        };

        if self.include_configurations {
            OutputMessage::Configured(CqueryResult {
                results: records.into_iter().map(configured_target).collect(),
            })
        } else {
            OutputMessage::Narrowed(QueryResult {
                target: records.into_iter().map(target_proto).collect(),
            })
        }
    }

    /// Render the result set in memory.
    ///
    /// # Errors
    ///
    /// Returns `OutputError::ProtoEncode` or `OutputError::Json` if
    /// serialization fails.
    pub fn render(&self, result_set: &ResultSet) -> OutputResult<EncodedOutput> {
        let message = self.to_message(result_set);
        let payload = match self.format {
            OutputFormat::Binary => message.encode_binary()?,
            OutputFormat::Text => message.encode_text().into_bytes(),
            OutputFormat::Json => message.encode_json()?,
        };
        debug!(
            "Rendered {} targets as {} ({} bytes)",
            result_set.len(),
            self.format,
            payload.len()
        );
        Ok(EncodedOutput {
            format: self.format,
            payload,
        })
    }

    /// Consume the result set and write it to the sink.
    ///
    /// Nothing reaches the sink unless rendering succeeded; the sink then
    /// sees a single write followed by a flush.
    ///
    /// # Errors
    ///
    /// Propagates rendering and I/O errors.
    pub fn encode<W: Write + ?Sized>(&self, result_set: ResultSet, sink: &mut W) -> OutputResult<()> {
        let output = self.render(&result_set)?;
        output.write_to(sink)?;
        info!(
            "Wrote {} targets as {}",
            result_set.len(),
            self.format.format_name()
        );
        Ok(())
    }
}

fn configured_target(record: &TargetRecord) -> ConfiguredTarget {
    ConfiguredTarget {
        target: Some(target_proto(record)),
        configuration: record.configuration.as_ref().map(|token| proto::Configuration {
            checksum: token.as_str().to_string(),
        }),
    }
}

/// Project a record onto the plain target schema
pub fn target_proto(record: &TargetRecord) -> proto::Target {
    let descriptor = &record.target;
    let name = descriptor.label.clone();
    let location = descriptor.location.clone();

    match &descriptor.kind {
        TargetKind::Rule => proto::Target {
            r#type: TargetType::Rule.into(),
            rule: Some(proto::Rule {
                name,
                rule_class: record.rule_class.clone().unwrap_or_default(),
                location,
                attribute: record.attributes.iter().map(attribute_proto).collect(),
                rule_input: record.rule_inputs.clone(),
                rule_output: record.rule_outputs.clone(),
            }),
            ..proto::Target::default()
        },
        TargetKind::SourceFile => proto::Target {
            r#type: TargetType::SourceFile.into(),
            source_file: Some(proto::SourceFile { name, location }),
            ..proto::Target::default()
        },
        TargetKind::GeneratedFile { generating_rule } => proto::Target {
            r#type: TargetType::GeneratedFile.into(),
            generated_file: Some(proto::GeneratedFile {
                name,
                generating_rule: generating_rule.clone(),
                location,
            }),
            ..proto::Target::default()
        },
        TargetKind::PackageGroup { contained_packages } => proto::Target {
            r#type: TargetType::PackageGroup.into(),
            package_group: Some(proto::PackageGroup {
                name,
                contained_package: contained_packages.clone(),
            }),
            ..proto::Target::default()
        },
    }
}

fn discriminator(attr_type: AttributeType) -> AttributeDiscriminator {
    match attr_type {
        AttributeType::Integer => AttributeDiscriminator::Integer,
        AttributeType::String => AttributeDiscriminator::String,
        AttributeType::Label => AttributeDiscriminator::Label,
        AttributeType::Output => AttributeDiscriminator::Output,
        AttributeType::StringList => AttributeDiscriminator::StringList,
        AttributeType::LabelList => AttributeDiscriminator::LabelList,
        AttributeType::OutputList => AttributeDiscriminator::OutputList,
        AttributeType::IntegerList => AttributeDiscriminator::IntegerList,
        AttributeType::Boolean => AttributeDiscriminator::Boolean,
        AttributeType::Tristate => AttributeDiscriminator::Tristate,
        AttributeType::StringDict => AttributeDiscriminator::StringDict,
    }
}

/// Serialize one resolved attribute.
///
/// Booleans and tristates also carry integer and string forms.
pub fn attribute_proto(attr: &ResolvedAttribute) -> proto::Attribute {
    let mut out = proto::Attribute {
        name: attr.name.clone(),
        r#type: discriminator(attr.attr_type).into(),
        explicitly_specified: Some(attr.explicitly_specified),
        ..proto::Attribute::default()
    };

    match &attr.value {
        AttributeValue::Int(v) => out.int_value = Some(*v),
        AttributeValue::String(v) => out.string_value = Some(v.clone()),
        AttributeValue::StringList(v) => out.string_list_value = v.clone(),
        AttributeValue::IntList(v) => out.int_list_value = v.clone(),
        AttributeValue::Bool(v) => {
            out.boolean_value = Some(*v);
            out.int_value = Some(i32::from(*v));
            out.string_value = Some(v.to_string());
        }
        AttributeValue::Tristate(v) => {
            let value = match v {
                crate::attribute::Tristate::Yes => TristateValue::Yes,
                crate::attribute::Tristate::No => TristateValue::No,
                crate::attribute::Tristate::Auto => TristateValue::Auto,
            };
            out.tristate_value = Some(value.into());
            out.int_value = Some(v.as_int());
            out.string_value = Some(v.as_str().to_string());
        }
        AttributeValue::StringDict(v) => {
            out.string_dict_value = v
                .iter()
                .map(|(key, value)| proto::StringDictEntry {
                    key: key.clone(),
                    value: value.clone(),
                })
                .collect();
        }
    }

    out
}
