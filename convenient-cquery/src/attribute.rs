//! Rule attribute model
//!
//! Rules declare typed attributes whose value is either a literal or a
//! `select()` over configuration conditions. This module holds that model
//! and the deterministic attribute order used for output.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Condition key naming the fallback branch of a `select()`.
pub const DEFAULT_CONDITION: &str = "//conditions:default";

/// Declared type of a rule attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// 32-bit integer
    Integer,
    /// Free-form string
    String,
    /// Single label
    Label,
    /// Single output file label
    Output,
    /// List of strings
    StringList,
    /// List of labels
    LabelList,
    /// List of output file labels
    OutputList,
    /// List of integers
    IntegerList,
    /// Boolean flag
    Boolean,
    /// Yes/no/auto switch
    Tristate,
    /// String to string dictionary
    StringDict,
}

impl AttributeType {
    /// Name used in error messages and logs
    pub fn as_str(self) -> &'static str {
        match self {
            AttributeType::Integer => "integer",
            AttributeType::String => "string",
            AttributeType::Label => "label",
            AttributeType::Output => "output",
            AttributeType::StringList => "string_list",
            AttributeType::LabelList => "label_list",
            AttributeType::OutputList => "output_list",
            AttributeType::IntegerList => "integer_list",
            AttributeType::Boolean => "boolean",
            AttributeType::Tristate => "tristate",
            AttributeType::StringDict => "string_dict",
        }
    }

    /// Attribute holds dependency labels
    pub fn is_label(self) -> bool {
        matches!(self, AttributeType::Label | AttributeType::LabelList)
    }

    /// Attribute holds output file labels
    pub fn is_output(self) -> bool {
        matches!(self, AttributeType::Output | AttributeType::OutputList)
    }

    /// Check that a value has the shape this type stores
    pub fn accepts(self, value: &AttributeValue) -> bool {
        match self {
            AttributeType::Integer => matches!(value, AttributeValue::Int(_)),
            AttributeType::String | AttributeType::Label | AttributeType::Output => {
                matches!(value, AttributeValue::String(_))
            }
            AttributeType::StringList | AttributeType::LabelList | AttributeType::OutputList => {
                matches!(value, AttributeValue::StringList(_))
            }
            AttributeType::IntegerList => matches!(value, AttributeValue::IntList(_)),
            AttributeType::Boolean => matches!(value, AttributeValue::Bool(_)),
            AttributeType::Tristate => matches!(value, AttributeValue::Tristate(_)),
            AttributeType::StringDict => matches!(value, AttributeValue::StringDict(_)),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tristate attribute value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tristate {
    /// Forced on
    Yes,
    /// Forced off
    No,
    /// Decided by the toolchain
    Auto,
}

impl Tristate {
    /// Integer form: yes=1, no=0, auto=-1
    pub fn as_int(self) -> i32 {
        match self {
            Tristate::Yes => 1,
            Tristate::No => 0,
            Tristate::Auto => -1,
        }
    }

    /// Lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            Tristate::Yes => "yes",
            Tristate::No => "no",
            Tristate::Auto => "auto",
        }
    }
}

/// Concrete attribute value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeValue {
    /// Integer value
    Int(i32),
    /// String, label or output value
    String(String),
    /// List of strings, labels or outputs
    StringList(Vec<String>),
    /// List of integers
    IntList(Vec<i32>),
    /// Boolean value
    Bool(bool),
    /// Tristate value
    Tristate(Tristate),
    /// String dictionary, kept sorted by key
    StringDict(BTreeMap<String, String>),
}

impl AttributeValue {
    /// Labels referenced by this value (strings and string lists only)
    pub fn labels(&self) -> Vec<&str> {
        match self {
            AttributeValue::String(s) => vec![s.as_str()],
            AttributeValue::StringList(list) => list.iter().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<Vec<String>> for AttributeValue {
    fn from(value: Vec<String>) -> Self {
        AttributeValue::StringList(value)
    }
}

/// One `condition: value` entry of a `select()`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectBranch {
    /// Label of the config condition guarding this branch
    pub condition: String,
    /// Value chosen when the condition matches
    pub value: AttributeValue,
}

/// A `select()` expression
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Selector {
    /// Branches in declaration order
    pub branches: Vec<SelectBranch>,
    /// Value used when no branch matches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<AttributeValue>,
}

impl Selector {
    /// Build a selector from `(condition, value)` pairs.
    ///
    /// A pair keyed by [`DEFAULT_CONDITION`] becomes the default branch.
    pub fn from_branches<I, S>(branches: I) -> Self
    where
        I: IntoIterator<Item = (S, AttributeValue)>,
        S: Into<String>,
    {
        let mut selector = Selector::default();
        for (condition, value) in branches {
            let condition = condition.into();
            if condition == DEFAULT_CONDITION {
                selector.default = Some(value);
            } else {
                selector.branches.push(SelectBranch { condition, value });
            }
        }
        selector
    }

    /// Set the default branch
    pub fn with_default(mut self, value: impl Into<AttributeValue>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// Declared value of an attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclaredValue {
    /// Plain value, identical in every configuration
    Literal(AttributeValue),
    /// Configuration-dependent value
    Select(Selector),
}

/// Attribute declaration on a rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDef {
    /// Attribute name
    pub name: String,
    /// Declared type
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    /// Whether the BUILD file set this attribute explicitly
    #[serde(default)]
    pub explicitly_specified: bool,
    /// Literal or `select()` value
    pub value: DeclaredValue,
}

impl AttributeDef {
    /// Explicitly specified literal attribute
    pub fn literal(name: &str, attr_type: AttributeType, value: impl Into<AttributeValue>) -> Self {
        Self {
            name: name.to_string(),
            attr_type,
            explicitly_specified: true,
            value: DeclaredValue::Literal(value.into()),
        }
    }

    /// Explicitly specified `select()` attribute
    pub fn select(name: &str, attr_type: AttributeType, selector: Selector) -> Self {
        Self {
            name: name.to_string(),
            attr_type,
            explicitly_specified: true,
            value: DeclaredValue::Select(selector),
        }
    }

    /// Mark the attribute as carrying the rule's default value
    pub fn implicit(mut self) -> Self {
        self.explicitly_specified = false;
        self
    }
}

/// Immutable description of a rule target's declared attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDefinition {
    /// Rule label, e.g. `//pkg:name`
    pub label: String,
    /// Rule class, e.g. `cc_library`
    pub rule_class: String,
    /// Declared attributes in declaration order
    #[serde(default)]
    pub attributes: Vec<AttributeDef>,
}

impl RuleDefinition {
    /// Create a rule with no attributes
    pub fn new(label: &str, rule_class: &str) -> Self {
        Self {
            label: label.to_string(),
            rule_class: rule_class.to_string(),
            attributes: Vec::new(),
        }
    }

    /// Add an attribute declaration
    pub fn with_attribute(mut self, attribute: AttributeDef) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Look up an attribute declaration by name
    pub fn attribute(&self, name: &str) -> Option<&AttributeDef> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Attributes in output order
    pub fn sorted_attributes(&self) -> Vec<&AttributeDef> {
        sort_attributes(&self.attributes)
    }
}

/// Order attributes by name (codepoint order).
///
/// Names are unique within a rule, so the order is total.
pub fn sort_attributes<'a, I>(attributes: I) -> Vec<&'a AttributeDef>
where
    I: IntoIterator<Item = &'a AttributeDef>,
{
    let mut sorted: Vec<&AttributeDef> = attributes.into_iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule_with(names: &[&str]) -> RuleDefinition {
        names.iter().fold(RuleDefinition::new("//pkg:lib", "cc_library"), |rule, name| {
            rule.with_attribute(AttributeDef::literal(name, AttributeType::String, "x"))
        })
    }

    #[test]
    fn test_sorted_attribute_names() {
        let rule = rule_with(&["srcs", "deps", "name"]);
        let names: Vec<&str> = rule.sorted_attributes().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["deps", "name", "srcs"]);
    }

    #[test]
    fn test_sort_is_codepoint_order() {
        let rule = rule_with(&["b", "B", "_a", "a"]);
        let names: Vec<&str> = rule.sorted_attributes().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["B", "_a", "a", "b"]);
    }

    #[test]
    fn test_selector_from_branches_extracts_default() {
        let selector = Selector::from_branches(vec![
            ("//conditions:arm", AttributeValue::from("arm.c")),
            (DEFAULT_CONDITION, AttributeValue::from("generic.c")),
        ]);
        assert_eq!(selector.branches.len(), 1);
        assert_eq!(selector.branches[0].condition, "//conditions:arm");
        assert_eq!(selector.default, Some(AttributeValue::from("generic.c")));
    }

    #[test]
    fn test_type_accepts_value_shape() {
        assert!(AttributeType::LabelList.accepts(&AttributeValue::StringList(vec![])));
        assert!(AttributeType::Label.accepts(&AttributeValue::from("//a:b")));
        assert!(!AttributeType::Boolean.accepts(&AttributeValue::Int(1)));
        assert!(AttributeType::Tristate.accepts(&AttributeValue::Tristate(Tristate::Auto)));
    }

    #[test]
    fn test_declared_value_json_shape() {
        let attr = AttributeDef::literal("linkstatic", AttributeType::Boolean, true);
        let json = serde_json::to_string(&attr).unwrap();
        assert_eq!(
            json,
            r#"{"name":"linkstatic","type":"boolean","explicitly_specified":true,"value":{"literal":{"bool":true}}}"#
        );
        let back: AttributeDef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, attr);
    }
}
