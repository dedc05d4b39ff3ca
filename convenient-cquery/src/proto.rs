//! Protobuf schema of query output
//!
//! `QueryResult` is the plain build-graph schema; `CqueryResult` wraps every
//! target with the configuration it was analyzed in. The messages derive
//! `prost::Message` for the wire format and serde for the protobuf JSON
//! mapping (lowerCamelCase names, enums by name, empty fields omitted).

use serde::{Deserialize, Serialize};

/// Protobuf enum with stable symbolic names
pub trait ProtoEnum: Sized + Copy + TryFrom<i32> + Into<i32> {
    /// All symbolic names
    const NAMES: &'static [&'static str];

    /// Symbolic name of the value
    fn name(self) -> &'static str;

    /// Value for a symbolic name
    fn from_name(name: &str) -> Option<Self>;

    /// Symbolic name of a raw value, if it is a known variant
    fn name_of(value: i32) -> Option<&'static str> {
        Self::try_from(value).ok().map(Self::name)
    }
}

macro_rules! proto_enum_names {
    ($enum:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl ProtoEnum for $enum {
            const NAMES: &'static [&'static str] = &[$($name),+];

            fn name(self) -> &'static str {
                match self {
                    $($enum::$variant => $name),+
                }
            }

            fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some($enum::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

macro_rules! enum_json {
    ($module:ident, $enum:ident) => {
        mod $module {
            use super::{ProtoEnum, $enum};
            use serde::{Deserialize, Deserializer, Serializer};

            pub fn serialize<S: Serializer>(value: &i32, serializer: S) -> Result<S::Ok, S::Error> {
                match <$enum as ProtoEnum>::name_of(*value) {
                    Some(name) => serializer.serialize_str(name),
                    None => serializer.serialize_i32(*value),
                }
            }

            pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
                let name = String::deserialize(deserializer)?;
                <$enum as ProtoEnum>::from_name(&name)
                    .map(Into::into)
                    .ok_or_else(|| serde::de::Error::unknown_variant(&name, <$enum as ProtoEnum>::NAMES))
            }

            pub mod optional {
                use serde::{Deserializer, Serializer};

                pub fn serialize<S: Serializer>(value: &Option<i32>, serializer: S) -> Result<S::Ok, S::Error> {
                    match value {
                        Some(v) => super::serialize(v, serializer),
                        None => serializer.serialize_none(),
                    }
                }

                pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i32>, D::Error> {
                    super::deserialize(deserializer).map(Some)
                }
            }
        }
    };
}

/// Kind of target in the build graph
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum TargetType {
    /// Rule instance
    Rule = 1,
    /// Source file
    SourceFile = 2,
    /// Generated file
    GeneratedFile = 3,
    /// Package group
    PackageGroup = 4,
}

proto_enum_names!(TargetType {
    Rule => "RULE",
    SourceFile => "SOURCE_FILE",
    GeneratedFile => "GENERATED_FILE",
    PackageGroup => "PACKAGE_GROUP",
});

/// Attribute value type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum AttributeDiscriminator {
    /// int_value
    Integer = 1,
    /// string_value
    String = 2,
    /// string_value
    Label = 3,
    /// string_value
    Output = 4,
    /// string_list_value
    StringList = 5,
    /// string_list_value
    LabelList = 6,
    /// string_list_value
    OutputList = 7,
    /// string_dict_value
    StringDict = 10,
    /// boolean_value
    Boolean = 14,
    /// tristate_value
    Tristate = 15,
    /// int_list_value
    IntegerList = 16,
}

proto_enum_names!(AttributeDiscriminator {
    Integer => "INTEGER",
    String => "STRING",
    Label => "LABEL",
    Output => "OUTPUT",
    StringList => "STRING_LIST",
    LabelList => "LABEL_LIST",
    OutputList => "OUTPUT_LIST",
    StringDict => "STRING_DICT",
    Boolean => "BOOLEAN",
    Tristate => "TRISTATE",
    IntegerList => "INTEGER_LIST",
});

/// Tristate attribute value
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum TristateValue {
    /// no
    No = 0,
    /// yes
    Yes = 1,
    /// auto
    Auto = 2,
}

proto_enum_names!(TristateValue {
    No => "NO",
    Yes => "YES",
    Auto => "AUTO",
});

enum_json!(target_type_json, TargetType);
enum_json!(attribute_type_json, AttributeDiscriminator);
enum_json!(tristate_json, TristateValue);

/// Result of a plain query: targets only
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryResult {
    /// Targets
    #[prost(message, repeated, tag = "1")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub target: Vec<Target>,
}

/// Result of a configured query: targets with their configuration
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CqueryResult {
    /// Configured targets
    #[prost(message, repeated, tag = "1")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<ConfiguredTarget>,
}

/// Target paired with its configuration
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfiguredTarget {
    /// Target
    #[prost(message, optional, tag = "1")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
    /// Configuration the target was analyzed in
    #[prost(message, optional, tag = "2")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration: Option<Configuration>,
}

/// Build configuration identity
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Configuration {
    /// Configuration checksum
    #[prost(string, tag = "1")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub checksum: String,
}

/// A build-graph target; exactly one of the kind-specific fields is set
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Target {
    /// Which kind-specific field is set
    #[prost(enumeration = "TargetType", required, tag = "1")]
    #[serde(with = "target_type_json")]
    pub r#type: i32,
    /// Rule details
    #[prost(message, optional, tag = "2")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<Rule>,
    /// Source file details
    #[prost(message, optional, tag = "3")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_file: Option<SourceFile>,
    /// Generated file details
    #[prost(message, optional, tag = "4")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_file: Option<GeneratedFile>,
    /// Package group details
    #[prost(message, optional, tag = "5")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_group: Option<PackageGroup>,
}

/// Rule instance
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Rule {
    /// Rule label
    #[prost(string, required, tag = "1")]
    pub name: String,
    /// Rule class
    #[prost(string, required, tag = "2")]
    pub rule_class: String,
    /// BUILD file location
    #[prost(string, optional, tag = "3")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Attributes sorted by name
    #[prost(message, repeated, tag = "4")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attribute: Vec<Attribute>,
    /// Labels this rule depends on
    #[prost(string, repeated, tag = "5")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rule_input: Vec<String>,
    /// Labels of files this rule declares as outputs
    #[prost(string, repeated, tag = "6")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rule_output: Vec<String>,
}

/// Source file target
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceFile {
    /// File label
    #[prost(string, required, tag = "1")]
    pub name: String,
    /// BUILD file location
    #[prost(string, optional, tag = "2")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Generated file target
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneratedFile {
    /// File label
    #[prost(string, required, tag = "1")]
    pub name: String,
    /// Label of the generating rule
    #[prost(string, required, tag = "2")]
    pub generating_rule: String,
    /// BUILD file location
    #[prost(string, optional, tag = "3")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Package group target
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PackageGroup {
    /// Group label
    #[prost(string, required, tag = "1")]
    pub name: String,
    /// Package specifications
    #[prost(string, repeated, tag = "2")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contained_package: Vec<String>,
}

/// Entry of a string dictionary attribute
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StringDictEntry {
    /// Key
    #[prost(string, required, tag = "1")]
    pub key: String,
    /// Value
    #[prost(string, required, tag = "2")]
    pub value: String,
}

/// Rule attribute with its configured value
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Attribute {
    /// Attribute name
    #[prost(string, required, tag = "1")]
    pub name: String,
    /// Which value field is set
    #[prost(enumeration = "AttributeDiscriminator", required, tag = "2")]
    #[serde(with = "attribute_type_json")]
    pub r#type: i32,
    /// Integer value (also set for booleans and tristates)
    #[prost(int32, optional, tag = "3")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub int_value: Option<i32>,
    /// String, label or output value (also set for booleans and tristates)
    #[prost(string, optional, tag = "5")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub string_value: Option<String>,
    /// List value
    #[prost(string, repeated, tag = "6")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub string_list_value: Vec<String>,
    /// Dictionary value
    #[prost(message, repeated, tag = "8")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub string_dict_value: Vec<StringDictEntry>,
    /// Whether the BUILD file set the attribute
    #[prost(bool, optional, tag = "13")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explicitly_specified: Option<bool>,
    /// Boolean value
    #[prost(bool, optional, tag = "14")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boolean_value: Option<bool>,
    /// Tristate value
    #[prost(enumeration = "TristateValue", optional, tag = "15")]
    #[serde(with = "tristate_json::optional", skip_serializing_if = "Option::is_none")]
    pub tristate_value: Option<i32>,
    /// Integer list value
    #[prost(int32, repeated, tag = "17")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub int_list_value: Vec<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_enum_names() {
        assert_eq!(TargetType::Rule.name(), "RULE");
        assert_eq!(TargetType::from_name("GENERATED_FILE"), Some(TargetType::GeneratedFile));
        assert_eq!(AttributeDiscriminator::name_of(6), Some("LABEL_LIST"));
        assert_eq!(AttributeDiscriminator::name_of(99), None);
    }

    #[test]
    fn test_json_uses_camel_case_and_enum_names() {
        let target = Target {
            r#type: TargetType::SourceFile.into(),
            source_file: Some(SourceFile {
                name: "//pkg:a.cc".to_string(),
                location: None,
            }),
            ..Target::default()
        };
        let json = serde_json::to_string(&target).unwrap();
        assert_eq!(json, r#"{"type":"SOURCE_FILE","sourceFile":{"name":"//pkg:a.cc"}}"#);

        let back: Target = serde_json::from_str(&json).unwrap();
        assert_eq!(back, target);
    }

    #[test]
    fn test_unknown_enum_name_is_rejected() {
        let err = serde_json::from_str::<Target>(r#"{"type":"ALIAS"}"#).unwrap_err();
        assert!(err.to_string().contains("ALIAS"));
    }

    #[test]
    fn test_tristate_json() {
        let attr = Attribute {
            name: "stamp".to_string(),
            r#type: AttributeDiscriminator::Tristate.into(),
            tristate_value: Some(TristateValue::Auto.into()),
            ..Attribute::default()
        };
        let json = serde_json::to_string(&attr).unwrap();
        assert_eq!(json, r#"{"name":"stamp","type":"TRISTATE","tristateValue":"AUTO"}"#);
        assert_eq!(serde_json::from_str::<Attribute>(&json).unwrap(), attr);
    }

    #[test]
    fn test_required_fields_survive_wire_format() {
        let rule = Rule {
            name: String::new(),
            rule_class: "genrule".to_string(),
            ..Rule::default()
        };
        let bytes = rule.encode_to_vec();
        assert_eq!(Rule::decode(bytes.as_slice()).unwrap(), rule);
    }
}
