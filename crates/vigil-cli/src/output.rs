//! Rendering of result rows as CSV or JSON.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::Context;
use serde::Serialize;
use tracing::debug;

/// Output format for query and diff results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Csv,
    Json,
}

impl OutputFormat {
    /// The `--format` flag if given, otherwise the configured default.
    ///
    /// # Errors
    ///
    /// Fails if the configured format is neither `csv` nor `json`.
    pub fn resolve(flag: Option<Self>, configured: &str) -> anyhow::Result<Self> {
        match flag {
            Some(format) => Ok(format),
            None => configured.parse(),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => anyhow::bail!("unknown output format '{other}' (expected csv or json)"),
        }
    }
}

/// Writes `rows` to `out`.
///
/// CSV gets a header row derived from the field names. JSON is one pretty
/// printed array followed by a newline.
///
/// # Errors
///
/// Fails if a row cannot be serialized in `format` or `out` cannot be written.
pub fn render<T: Serialize>(rows: &[T], format: OutputFormat, out: &mut dyn Write) -> anyhow::Result<()> {
    match format {
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(out);
            for row in rows {
                writer.serialize(row).context("failed to write CSV row")?;
            }
            writer.flush().context("failed to flush CSV output")?;
        }
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, rows).context("failed to write JSON output")?;
            writeln!(out).context("failed to write JSON output")?;
        }
    }
    Ok(())
}

/// [`render`] to `path`, or to stdout when no path is given.
///
/// # Errors
///
/// See [`render`]; also fails if the output file cannot be created.
pub fn emit<T: Serialize>(rows: &[T], format: OutputFormat, path: Option<&Path>) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("failed to create output directory '{}'", parent.display())
                    })?;
                }
            }
            let file = File::create(path)
                .with_context(|| format!("failed to create output file '{}'", path.display()))?;
            let mut writer = BufWriter::new(file);
            render(rows, format, &mut writer)?;
            writer
                .flush()
                .with_context(|| format!("failed to write output file '{}'", path.display()))?;
            debug!(path = %path.display(), rows = rows.len(), "wrote results");
            Ok(())
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            render(rows, format, &mut lock)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        arn: &'static str,
        admin: Option<bool>,
    }

    fn rendered(format: OutputFormat) -> String {
        let rows = [
            Row {
                arn: "arn:a",
                admin: Some(true),
            },
            Row {
                arn: "arn:b",
                admin: None,
            },
        ];
        let mut buf = Vec::new();
        render(&rows, format, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn csv_has_header_and_empty_cells() {
        assert_eq!(rendered(OutputFormat::Csv), "arn,admin\narn:a,true\narn:b,\n");
    }

    #[test]
    fn json_is_an_array_with_nulls() {
        let value: serde_json::Value = serde_json::from_str(&rendered(OutputFormat::Json)).unwrap();
        assert_eq!(value[0]["arn"], "arn:a");
        assert!(value[1]["admin"].is_null());
    }

    #[test]
    fn emit_creates_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("result.csv");
        let rows = [Row {
            arn: "arn:a",
            admin: None,
        }];
        emit(&rows, OutputFormat::Csv, Some(&path)).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "arn,admin\narn:a,\n");
    }

    #[test]
    fn flag_overrides_configured_format() {
        assert_eq!(
            OutputFormat::resolve(Some(OutputFormat::Csv), "json").unwrap(),
            OutputFormat::Csv
        );
        assert_eq!(OutputFormat::resolve(None, "JSON").unwrap(), OutputFormat::Json);
        assert!(OutputFormat::resolve(None, "xml").is_err());
    }
}
