//! Configured attribute resolution
//!
//! Evaluates literal and `select()` attribute values against the config
//! conditions of one configured target. Resolution is a pluggable capability
//! ([`AttributeResolver`]) so the record builder can be composed with a
//! different resolution policy.

use crate::attribute::{AttributeDef, AttributeValue, DeclaredValue, RuleDefinition, Selector};
use crate::condition::{ConfigConditions, ConfigurationToken};
use crate::error::{OutputError, OutputResult};
use std::collections::BTreeMap;
use tracing::trace;

/// Outcome of resolving one attribute in one configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The single value selected for this configuration
    Value(AttributeValue),
    /// No branch matched and the selector has no default
    Unresolvable,
}

impl Resolution {
    /// Resolved value, if any
    pub fn value(&self) -> Option<&AttributeValue> {
        match self {
            Resolution::Value(v) => Some(v),
            Resolution::Unresolvable => None,
        }
    }

    /// Consume into the resolved value, if any
    pub fn into_value(self) -> Option<AttributeValue> {
        match self {
            Resolution::Value(v) => Some(v),
            Resolution::Unresolvable => None,
        }
    }
}

/// Resolves attribute values of a rule under a configuration
pub trait AttributeResolver: Send + Sync {
    /// Resolve `attribute` of `rule` given the active config conditions.
    ///
    /// # Errors
    ///
    /// Returns `OutputError::UnknownAttribute` if the rule does not declare the
    /// attribute and `OutputError::ConfigurationAmbiguity` if more than one
    /// condition of a `select()` matches.
    fn resolve(
        &self,
        rule: &RuleDefinition,
        attribute: &str,
        conditions: &ConfigConditions,
        configuration: &ConfigurationToken,
    ) -> OutputResult<Resolution>;
}

/// Standard `select()` semantics: at most one distinct condition may match,
/// otherwise the default branch applies.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfiguredAttributeResolver;

impl ConfiguredAttributeResolver {
    /// Create the resolver
    pub fn new() -> Self {
        Self
    }

    fn resolve_declared(
        rule: &RuleDefinition,
        attr: &AttributeDef,
        conditions: &ConfigConditions,
    ) -> OutputResult<Resolution> {
        let selector = match &attr.value {
            DeclaredValue::Literal(value) => return Ok(Resolution::Value(value.clone())),
            DeclaredValue::Select(selector) => selector,
        };

        // literals pass through as declared; only branch picks are checked
        let resolution = Self::evaluate(rule, attr, selector, conditions)?;
        if let Resolution::Value(value) = &resolution
            && !attr.attr_type.accepts(value)
        {
            return Err(OutputError::AttributeTypeMismatch {
                attribute: attr.name.clone(),
                expected: attr.attr_type.to_string(),
            });
        }

        Ok(resolution)
    }

    fn evaluate(
        rule: &RuleDefinition,
        attr: &AttributeDef,
        selector: &Selector,
        conditions: &ConfigConditions,
    ) -> OutputResult<Resolution> {
        let mut matched: Vec<&str> = Vec::new();
        let mut selected = None;

        for branch in &selector.branches {
            if !conditions.matches(&branch.condition) || matched.contains(&branch.condition.as_str()) {
                continue;
            }
            matched.push(&branch.condition);
            if selected.is_none() {
                selected = Some(&branch.value);
            }
        }

        if matched.len() > 1 {
            matched.sort_unstable();
            return Err(OutputError::ConfigurationAmbiguity {
                rule: rule.label.clone(),
                attribute: attr.name.clone(),
                conditions: matched.into_iter().map(str::to_string).collect(),
            });
        }

        match selected.or(selector.default.as_ref()) {
            Some(value) => Ok(Resolution::Value(value.clone())),
            None => {
                trace!(
                    "No branch of {}.{} matches and no default is declared",
                    rule.label, attr.name
                );
                Ok(Resolution::Unresolvable)
            }
        }
    }
}

impl AttributeResolver for ConfiguredAttributeResolver {
    fn resolve(
        &self,
        rule: &RuleDefinition,
        attribute: &str,
        conditions: &ConfigConditions,
        _configuration: &ConfigurationToken,
    ) -> OutputResult<Resolution> {
        let attr = rule
            .attribute(attribute)
            .ok_or_else(|| OutputError::UnknownAttribute {
                rule: rule.label.clone(),
                attribute: attribute.to_string(),
            })?;
        Self::resolve_declared(rule, attr, conditions)
    }
}

/// Every attribute of a rule resolved under one configuration
///
/// For library callers that need the whole attribute map of a rule. The
/// record builder resolves attribute by attribute instead, so attributes
/// filtered out by the output options are never evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfiguredAttributeView {
    configuration: ConfigurationToken,
    values: BTreeMap<String, Resolution>,
}

impl ConfiguredAttributeView {
    /// Resolve all attributes of `rule`.
    ///
    /// # Errors
    ///
    /// Propagates the first resolution error.
    pub fn resolve_all<R: AttributeResolver + ?Sized>(
        resolver: &R,
        rule: &RuleDefinition,
        conditions: &ConfigConditions,
        configuration: &ConfigurationToken,
    ) -> OutputResult<Self> {
        let mut values = BTreeMap::new();
        for attr in rule.sorted_attributes() {
            let resolution = resolver.resolve(rule, &attr.name, conditions, configuration)?;
            let _ = values.insert(attr.name.clone(), resolution);
        }
        Ok(Self {
            configuration: configuration.clone(),
            values,
        })
    }

    /// Configuration the view was resolved in
    pub fn configuration(&self) -> &ConfigurationToken {
        &self.configuration
    }

    /// Resolution of one attribute, `None` if the rule does not declare it
    pub fn get(&self, name: &str) -> Option<&Resolution> {
        self.values.get(name)
    }

    /// Resolutions in attribute-name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Resolution)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}
