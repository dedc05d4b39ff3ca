//! Tests for the cquery-fmt command flow

use clap::Parser;
use cquery_cli::{Cli, CliError, run};
use std::fs;
use tempfile::tempdir;

fn rule_batch(label: &str, configuration: &str) -> String {
    format!(
        r#"[{{"target":{{"label":"{label}","kind":"rule"}},"rule":{{"label":"{label}","rule_class":"cc_library","attributes":[{{"name":"copts","type":"string_list","value":{{"select":{{"branches":[{{"condition":"//cfg:opt","value":{{"string_list":["-O2"]}}}}],"default":{{"string_list":[]}}}}}}}}]}},"configuration":"{configuration}","config_conditions":{{"//cfg:opt":true}}}}]"#
    )
}

fn file_batch(label: &str) -> String {
    format!(r#"[{{"target":{{"label":"{label}","kind":"source_file"}},"configuration":"cfg"}}]"#)
}

#[test]
fn test_writes_output_file() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("targets.jsonl");
    let output = dir.path().join("result.json");
    fs::write(&input, format!("{}\n{}\n", rule_batch("//lib:a", "cfg"), file_batch("//lib:a.cc"))).unwrap();

    let cli = Cli::try_parse_from([
        "cquery-fmt",
        "--input",
        input.to_str().unwrap(),
        "--output",
        output.to_str().unwrap(),
    ])
    .unwrap();
    run(&cli).unwrap();

    let json = fs::read_to_string(&output).unwrap();
    assert!(json.starts_with(r#"{"results":["#));
    assert!(json.contains(r#""stringListValue":["-O2"]"#));
    assert!(json.contains(r#""//lib:a.cc""#));
}

#[test]
fn test_stable_order_sorts_across_batches() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("targets.jsonl");
    let output = dir.path().join("result.txt");
    let lines: Vec<String> = ["//z:z", "//m:m", "//a:a", "//q:q"]
        .iter()
        .map(|label| rule_batch(label, "cfg"))
        .collect();
    fs::write(&input, lines.join("\n")).unwrap();

    let cli = Cli::try_parse_from([
        "cquery-fmt",
        "--format",
        "textproto",
        "--include-configurations",
        "false",
        "--stable-order",
        "--jobs",
        "4",
        "--input",
        input.to_str().unwrap(),
        "--output",
        output.to_str().unwrap(),
    ])
    .unwrap();
    run(&cli).unwrap();

    let text = fs::read_to_string(&output).unwrap();
    let positions: Vec<usize> = ["//a:a", "//m:m", "//q:q", "//z:z"]
        .iter()
        .map(|label| text.find(&format!("name: \"{label}\"")).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
    assert!(!text.contains("configuration"));
}

#[test]
fn test_unknown_format_fails_before_reading_input() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("result.bin");

    let cli = Cli::try_parse_from([
        "cquery-fmt",
        "--format",
        "yaml",
        "--input",
        dir.path().join("missing.jsonl").to_str().unwrap(),
        "--output",
        output.to_str().unwrap(),
    ])
    .unwrap();

    let err = run(&cli).unwrap_err();
    assert!(matches!(err, CliError::Output(_)));
    assert_eq!(err.to_string(), "Unknown output format: yaml");
    assert!(!output.exists());
}

#[test]
fn test_failed_run_leaves_no_output_file() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("targets.jsonl");
    let output = dir.path().join("result.bin");
    // a rule target without its definition cannot be formatted
    fs::write(
        &input,
        format!(
            "{}\n{}\n",
            rule_batch("//lib:a", "cfg"),
            r#"[{"target":{"label":"//lib:b","kind":"rule"},"configuration":"cfg"}]"#
        ),
    )
    .unwrap();

    let cli = Cli::try_parse_from([
        "cquery-fmt",
        "--format",
        "proto",
        "--input",
        input.to_str().unwrap(),
        "--output",
        output.to_str().unwrap(),
    ])
    .unwrap();

    assert!(run(&cli).is_err());
    assert!(!output.exists());
}
