//! Protobuf text format rendering
//!
//! Prints messages as `field: value` lines with nested messages in braces,
//! fields in tag order, two-space indentation.

use crate::proto::{
    Attribute, AttributeDiscriminator, Configuration, ConfiguredTarget, CqueryResult,
    GeneratedFile, PackageGroup, ProtoEnum, QueryResult, Rule, SourceFile, StringDictEntry,
    Target, TargetType, TristateValue,
};
use std::fmt::Write;

/// Message that can print itself in text format
pub trait TextMessage {
    /// Write the message's fields at the writer's current depth
    fn write_fields(&self, w: &mut TextWriter);

    /// Render as a top-level text format document
    fn to_text(&self) -> String {
        let mut w = TextWriter::new();
        self.write_fields(&mut w);
        w.finish()
    }
}

/// Indenting text format writer
#[derive(Debug, Default)]
pub struct TextWriter {
    out: String,
    depth: usize,
}

impl TextWriter {
    /// Empty writer at depth zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Rendered text
    pub fn finish(self) -> String {
        self.out
    }

    fn indent(&mut self) {
        for _ in 0..self.depth {
            self.out.push_str("  ");
        }
    }

    fn line(&mut self, name: &str, value: impl std::fmt::Display) {
        self.indent();
        // Writing into a String cannot fail.
        let _ = writeln!(self.out, "{name}: {value}");
    }

    /// Quoted string field
    pub fn string(&mut self, name: &str, value: &str) {
        let escaped = escape(value);
        self.line(name, format_args!("\"{escaped}\""));
    }

    /// Integer field
    pub fn int(&mut self, name: &str, value: i32) {
        self.line(name, value);
    }

    /// Boolean field
    pub fn bool(&mut self, name: &str, value: bool) {
        self.line(name, value);
    }

    /// Enum field, printed by name when known
    pub fn enumeration<E: ProtoEnum>(&mut self, name: &str, value: i32) {
        match E::name_of(value) {
            Some(symbol) => self.line(name, symbol),
            None => self.line(name, value),
        }
    }

    /// Nested message field
    pub fn message<M: TextMessage>(&mut self, name: &str, message: &M) {
        self.indent();
        self.out.push_str(name);
        self.out.push_str(" {\n");
        self.depth += 1;
        message.write_fields(self);
        self.depth -= 1;
        self.indent();
        self.out.push_str("}\n");
    }

    fn opt_string(&mut self, name: &str, value: Option<&String>) {
        if let Some(v) = value {
            self.string(name, v);
        }
    }

    fn opt_message<M: TextMessage>(&mut self, name: &str, message: Option<&M>) {
        if let Some(m) = message {
            self.message(name, m);
        }
    }
}

/// C-style escaping as used by protobuf text format.
///
/// Non-ASCII characters are escaped byte-wise as octal.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            b'"' => out.push_str("\\\""),
            b'\'' => out.push_str("\\'"),
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7e => out.push(char::from(byte)),
            _ => {
                let _ = write!(out, "\\{byte:03o}");
            }
        }
    }
    out
}

impl TextMessage for CqueryResult {
    fn write_fields(&self, w: &mut TextWriter) {
        for result in &self.results {
            w.message("results", result);
        }
    }
}

impl TextMessage for QueryResult {
    fn write_fields(&self, w: &mut TextWriter) {
        for target in &self.target {
            w.message("target", target);
        }
    }
}

impl TextMessage for ConfiguredTarget {
    fn write_fields(&self, w: &mut TextWriter) {
        w.opt_message("target", self.target.as_ref());
        w.opt_message("configuration", self.configuration.as_ref());
    }
}

impl TextMessage for Configuration {
    fn write_fields(&self, w: &mut TextWriter) {
        if !self.checksum.is_empty() {
            w.string("checksum", &self.checksum);
        }
    }
}

impl TextMessage for Target {
    fn write_fields(&self, w: &mut TextWriter) {
        w.enumeration::<TargetType>("type", self.r#type);
        w.opt_message("rule", self.rule.as_ref());
        w.opt_message("source_file", self.source_file.as_ref());
        w.opt_message("generated_file", self.generated_file.as_ref());
        w.opt_message("package_group", self.package_group.as_ref());
    }
}

impl TextMessage for Rule {
    fn write_fields(&self, w: &mut TextWriter) {
        w.string("name", &self.name);
        w.string("rule_class", &self.rule_class);
        w.opt_string("location", self.location.as_ref());
        for attribute in &self.attribute {
            w.message("attribute", attribute);
        }
        for input in &self.rule_input {
            w.string("rule_input", input);
        }
        for output in &self.rule_output {
            w.string("rule_output", output);
        }
    }
}

impl TextMessage for SourceFile {
    fn write_fields(&self, w: &mut TextWriter) {
        w.string("name", &self.name);
        w.opt_string("location", self.location.as_ref());
    }
}

impl TextMessage for GeneratedFile {
    fn write_fields(&self, w: &mut TextWriter) {
        w.string("name", &self.name);
        w.string("generating_rule", &self.generating_rule);
        w.opt_string("location", self.location.as_ref());
    }
}

impl TextMessage for PackageGroup {
    fn write_fields(&self, w: &mut TextWriter) {
        w.string("name", &self.name);
        for package in &self.contained_package {
            w.string("contained_package", package);
        }
    }
}

impl TextMessage for StringDictEntry {
    fn write_fields(&self, w: &mut TextWriter) {
        w.string("key", &self.key);
        w.string("value", &self.value);
    }
}

impl TextMessage for Attribute {
    fn write_fields(&self, w: &mut TextWriter) {
        w.string("name", &self.name);
        w.enumeration::<AttributeDiscriminator>("type", self.r#type);
        if let Some(v) = self.int_value {
            w.int("int_value", v);
        }
        w.opt_string("string_value", self.string_value.as_ref());
        for v in &self.string_list_value {
            w.string("string_list_value", v);
        }
        for entry in &self.string_dict_value {
            w.message("string_dict_value", entry);
        }
        if let Some(v) = self.explicitly_specified {
            w.bool("explicitly_specified", v);
        }
        if let Some(v) = self.boolean_value {
            w.bool("boolean_value", v);
        }
        if let Some(v) = self.tristate_value {
            w.enumeration::<TristateValue>("tristate_value", v);
        }
        for v in &self.int_list_value {
            w.int("int_list_value", *v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("a\"b\\c\n"), "a\\\"b\\\\c\\n");
        assert_eq!(escape("it's"), "it\\'s");
        assert_eq!(escape("\u{1}"), "\\001");
        assert_eq!(escape("é"), "\\303\\251");
    }

    #[test]
    fn test_nested_message_layout() {
        let result = CqueryResult {
            results: vec![ConfiguredTarget {
                target: Some(Target {
                    r#type: TargetType::SourceFile.into(),
                    source_file: Some(SourceFile {
                        name: "//pkg:a.cc".to_string(),
                        location: Some("/ws/pkg/BUILD".to_string()),
                    }),
                    ..Target::default()
                }),
                configuration: Some(Configuration {
                    checksum: "beef".to_string(),
                }),
            }],
        };

        let expected = "\
results {
  target {
    type: SOURCE_FILE
    source_file {
      name: \"//pkg:a.cc\"
      location: \"/ws/pkg/BUILD\"
    }
  }
  configuration {
    checksum: \"beef\"
  }
}
";
        assert_eq!(result.to_text(), expected);
    }

    #[test]
    fn test_empty_result_prints_nothing() {
        assert_eq!(QueryResult::default().to_text(), "");
    }

    #[test]
    fn test_attribute_fields_in_tag_order() {
        let attr = Attribute {
            name: "linkstatic".to_string(),
            r#type: AttributeDiscriminator::Boolean.into(),
            int_value: Some(1),
            string_value: Some("true".to_string()),
            explicitly_specified: Some(true),
            boolean_value: Some(true),
            ..Attribute::default()
        };
        assert_eq!(
            attr.to_text(),
            "name: \"linkstatic\"\ntype: BOOLEAN\nint_value: 1\nstring_value: \"true\"\n\
             explicitly_specified: true\nboolean_value: true\n"
        );
    }
}
