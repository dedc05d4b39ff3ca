//! Per-target output records
//!
//! A [`TargetRecordBuilder`] turns one configured target delivered by the
//! query engine into a [`TargetRecord`]: the target descriptor, its resolved
//! attributes in name order and, optionally, its configuration checksum.

use crate::attribute::{AttributeType, AttributeValue, RuleDefinition};
use crate::condition::{ConfigConditions, ConfigurationToken};
use crate::error::{OutputError, OutputResult};
use crate::options::OutputOptions;
use crate::resolver::{AttributeResolver, ConfiguredAttributeResolver, Resolution};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::trace;

/// Kind of a queried target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum TargetKind {
    /// Rule instance; carries attributes
    Rule,
    /// Checked-in source file
    SourceFile,
    /// File produced by a rule
    GeneratedFile {
        /// Label of the producing rule
        generating_rule: String,
    },
    /// `package_group` target
    PackageGroup {
        /// Package specifications in the group
        #[serde(default)]
        contained_packages: Vec<String>,
    },
}

/// Base description of a queried target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDescriptor {
    /// Target label
    pub label: String,
    /// Target kind
    #[serde(flatten)]
    pub kind: TargetKind,
    /// BUILD file location, e.g. `/ws/pkg/BUILD:3:11`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl TargetDescriptor {
    /// Rule target
    pub fn rule(label: &str) -> Self {
        Self {
            label: label.to_string(),
            kind: TargetKind::Rule,
            location: None,
        }
    }

    /// Source file target
    pub fn source_file(label: &str) -> Self {
        Self {
            label: label.to_string(),
            kind: TargetKind::SourceFile,
            location: None,
        }
    }

    /// Generated file target
    pub fn generated_file(label: &str, generating_rule: &str) -> Self {
        Self {
            label: label.to_string(),
            kind: TargetKind::GeneratedFile {
                generating_rule: generating_rule.to_string(),
            },
            location: None,
        }
    }

    /// Set the location
    pub fn at(mut self, location: &str) -> Self {
        self.location = Some(location.to_string());
        self
    }

    /// Whether this target is a rule
    pub fn is_rule(&self) -> bool {
        matches!(self.kind, TargetKind::Rule)
    }
}

/// One configured target as delivered by the query engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueriedTarget {
    /// Target descriptor
    pub target: TargetDescriptor,
    /// Rule definition, present exactly when the target is a rule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<RuleDefinition>,
    /// Configuration the target was analyzed in
    pub configuration: ConfigurationToken,
    /// Config conditions visible to the target and whether they match
    #[serde(default)]
    pub config_conditions: ConfigConditions,
}

impl QueriedTarget {
    /// Rule target with its definition
    pub fn rule(
        rule: RuleDefinition,
        configuration: ConfigurationToken,
        config_conditions: ConfigConditions,
    ) -> Self {
        Self {
            target: TargetDescriptor::rule(&rule.label),
            rule: Some(rule),
            configuration,
            config_conditions,
        }
    }

    /// Non-rule target
    pub fn file(target: TargetDescriptor, configuration: ConfigurationToken) -> Self {
        Self {
            target,
            rule: None,
            configuration,
            config_conditions: ConfigConditions::new(),
        }
    }
}

/// Attribute value resolved for one configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAttribute {
    /// Attribute name
    pub name: String,
    /// Declared type
    pub attr_type: AttributeType,
    /// Selected value
    pub value: AttributeValue,
    /// Whether the BUILD file set this attribute explicitly
    pub explicitly_specified: bool,
}

/// Output record for one configured target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRecord {
    /// Target descriptor
    pub target: TargetDescriptor,
    /// Rule class for rule targets
    pub rule_class: Option<String>,
    /// Resolved attributes sorted by name
    pub attributes: Vec<ResolvedAttribute>,
    /// Labels referenced by label-typed attributes, sorted
    pub rule_inputs: Vec<String>,
    /// Labels of declared outputs, sorted
    pub rule_outputs: Vec<String>,
    /// Configuration checksum, when configuration output is requested
    pub configuration: Option<ConfigurationToken>,
}

impl TargetRecord {
    /// Target label
    pub fn label(&self) -> &str {
        &self.target.label
    }
}

/// Builds [`TargetRecord`]s using a pluggable attribute resolver
#[derive(Debug, Clone)]
pub struct TargetRecordBuilder<R = ConfiguredAttributeResolver> {
    resolver: R,
    options: OutputOptions,
}

impl TargetRecordBuilder<ConfiguredAttributeResolver> {
    /// Builder using standard `select()` resolution
    pub fn new(options: OutputOptions) -> Self {
        Self::with_resolver(ConfiguredAttributeResolver::new(), options)
    }
}

impl<R: AttributeResolver> TargetRecordBuilder<R> {
    /// Builder using a custom resolver
    pub fn with_resolver(resolver: R, options: OutputOptions) -> Self {
        Self { resolver, options }
    }

    /// Options the builder was created with
    pub fn options(&self) -> &OutputOptions {
        &self.options
    }

    /// Build the record for one configured target.
    ///
    /// Attributes that resolve to nothing in this configuration are left out.
    ///
    /// # Errors
    ///
    /// Returns `OutputError::MissingRuleDefinition` for a rule target without
    /// a definition, and propagates resolution errors.
    pub fn build(&self, queried: &QueriedTarget) -> OutputResult<TargetRecord> {
        let configuration = self
            .options
            .include_configurations
            .then(|| queried.configuration.clone());

        let rule = match (&queried.target.kind, &queried.rule) {
            (TargetKind::Rule, Some(rule)) => rule,
            (TargetKind::Rule, None) => {
                return Err(OutputError::MissingRuleDefinition(queried.target.label.clone()));
            }
            _ => {
                return Ok(TargetRecord {
                    target: queried.target.clone(),
                    rule_class: None,
                    attributes: Vec::new(),
                    rule_inputs: Vec::new(),
                    rule_outputs: Vec::new(),
                    configuration,
                });
            }
        };

        let mut attributes = Vec::new();
        let mut inputs = BTreeSet::new();
        let mut outputs = BTreeSet::new();

        for attr in rule.sorted_attributes() {
            if !self.should_include(attr.explicitly_specified, &attr.name) {
                continue;
            }

            let resolution = self.resolver.resolve(
                rule,
                &attr.name,
                &queried.config_conditions,
                &queried.configuration,
            )?;
            let value = match resolution {
                Resolution::Value(value) => value,
                Resolution::Unresolvable => {
                    trace!("Omitting unresolved attribute {}.{}", rule.label, attr.name);
                    continue;
                }
            };

            if self.options.include_rule_inputs_and_outputs {
                if attr.attr_type.is_label() {
                    inputs.extend(value.labels().into_iter().map(str::to_string));
                } else if attr.attr_type.is_output() {
                    outputs.extend(value.labels().into_iter().map(str::to_string));
                }
            }

            attributes.push(ResolvedAttribute {
                name: attr.name.clone(),
                attr_type: attr.attr_type,
                value,
                explicitly_specified: attr.explicitly_specified,
            });
        }

        Ok(TargetRecord {
            target: queried.target.clone(),
            rule_class: Some(rule.rule_class.clone()),
            attributes,
            rule_inputs: inputs.into_iter().collect(),
            rule_outputs: outputs.into_iter().collect(),
            configuration,
        })
    }

    /// Build records for one streamed batch, preserving its order.
    ///
    /// # Errors
    ///
    /// Fails on the first target that fails to build.
    pub fn build_batch(&self, batch: &[QueriedTarget]) -> OutputResult<Vec<TargetRecord>> {
        batch.iter().map(|queried| self.build(queried)).collect()
    }

    fn should_include(&self, explicitly_specified: bool, name: &str) -> bool {
        (self.options.include_default_values || explicitly_specified)
            && self.options.wants_attribute(name)
    }
}
