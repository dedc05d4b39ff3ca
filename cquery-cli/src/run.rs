//! Batch reading, parallel record building and output writing

use crate::{Cli, CliError, CliResult};
use convenient_cquery::{CqueryOutputCallback, OutputOptions, OutputResult, QueriedTarget};
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Write};
use tracing::{debug, info, warn};

/// Read JSON Lines input, one batch of targets per non-empty line.
///
/// # Errors
///
/// Returns `CliError::Input` naming the first line that is not a JSON array
/// of targets.
pub fn read_batches<R: BufRead>(reader: R) -> CliResult<Vec<Vec<QueriedTarget>>> {
    let mut batches = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let batch: Vec<QueriedTarget> = serde_json::from_str(&line).map_err(|source| CliError::Input {
            line: index + 1,
            source,
        })?;
        debug!("Read batch of {} targets from line {}", batch.len(), index + 1);
        batches.push(batch);
    }
    Ok(batches)
}

/// Format batches on a worker pool and return the encoded output.
///
/// Records are built concurrently but collected in input order, so the
/// output only depends on the input. The first error aborts the run and no
/// output is produced.
///
/// # Errors
///
/// Returns the first record building or encoding error.
pub fn format_batches(
    options: OutputOptions,
    jobs: Option<usize>,
    batches: &[Vec<QueriedTarget>],
) -> CliResult<Vec<u8>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.unwrap_or(0))
        .thread_name(|i| format!("cquery-worker-{i}"))
        .build()?;

    let callback = CqueryOutputCallback::new(options, Vec::new());
    callback.start()?;

    let built = pool.install(|| {
        batches
            .par_iter()
            .map(|batch| callback.build_records(batch))
            .collect::<OutputResult<Vec<_>>>()
    });
    let processed = built.and_then(|records| {
        records
            .into_iter()
            .try_for_each(|batch| callback.append_records(batch))
    });

    match processed {
        Ok(()) => Ok(callback.close(false)?),
        Err(e) => {
            warn!("Aborting {} output: {}", callback.name(), e);
            let _ = callback.close(true)?;
            Err(e.into())
        }
    }
}

/// Run the formatter with the given flags.
///
/// # Errors
///
/// Returns an error for unknown formats, unreadable input, failed record
/// building or encoding, and write failures.
pub fn run(cli: &Cli) -> CliResult<()> {
    let options = cli.output_options()?;
    info!("Formatting cquery results as {}", options.format);

    let batches = match &cli.input {
        Some(path) => read_batches(BufReader::new(File::open(path)?))?,
        None => read_batches(io::stdin().lock())?,
    };
    let targets: usize = batches.iter().map(Vec::len).sum();
    info!("Read {} batches with {} targets", batches.len(), targets);

    let output = format_batches(options, cli.jobs, &batches)?;

    match &cli.output {
        Some(path) => {
            fs::write(path, &output)?;
            info!("Wrote {} bytes to {}", output.len(), path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&output)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use convenient_cquery::{OutputError, OutputFormat};
    use std::io::Cursor;

    const RULE_BATCH: &str = r#"[{"target":{"label":"//app:bin","kind":"rule"},"rule":{"label":"//app:bin","rule_class":"sh_binary","attributes":[{"name":"srcs","type":"label_list","explicitly_specified":true,"value":{"literal":{"string_list":["//app:bin.sh"]}}}]},"configuration":"cfg1"}]"#;

    #[test]
    fn test_read_batches_skips_blank_lines() {
        let input = format!("{RULE_BATCH}\n\n{RULE_BATCH}\n");
        let batches = read_batches(Cursor::new(input)).unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0][0].target.label, "//app:bin");
    }

    #[test]
    fn test_read_batches_reports_line() {
        let input = format!("{RULE_BATCH}\nnot json\n");
        let err = read_batches(Cursor::new(input)).unwrap_err();
        assert!(matches!(err, CliError::Input { line: 2, .. }));
    }

    #[test]
    fn test_format_batches_on_pool() {
        let batches = read_batches(Cursor::new(format!("{RULE_BATCH}\n{RULE_BATCH}\n"))).unwrap();
        let output =
            format_batches(OutputOptions::with_format(OutputFormat::Json), Some(2), &batches).unwrap();
        let text = String::from_utf8(output).unwrap();
        assert!(text.ends_with('\n'));
        assert_eq!(text.matches(r#""checksum":"cfg1""#).count(), 2);
    }

    #[test]
    fn test_pooled_runs_are_byte_identical() {
        let lines: Vec<String> = (0..64)
            .map(|i| RULE_BATCH.replace("//app:bin", &format!("//app:t{i:02}")))
            .collect();
        let batches = read_batches(Cursor::new(lines.join("\n"))).unwrap();
        let options = OutputOptions::with_format(OutputFormat::Json);

        let first = format_batches(options.clone(), Some(4), &batches).unwrap();
        for _ in 0..20 {
            assert_eq!(format_batches(options.clone(), Some(4), &batches).unwrap(), first);
        }

        let text = String::from_utf8(first).unwrap();
        let positions: Vec<usize> = (0..64)
            .map(|i| text.find(&format!("\"//app:t{i:02}\"")).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_missing_rule_definition_produces_no_output() {
        let batch = r#"[{"target":{"label":"//app:bin","kind":"rule"},"configuration":"cfg1"}]"#;
        let batches = read_batches(Cursor::new(batch)).unwrap();
        let err = format_batches(OutputOptions::default(), Some(1), &batches).unwrap_err();
        assert!(matches!(
            err,
            CliError::Output(OutputError::MissingRuleDefinition(_))
        ));
    }
}
