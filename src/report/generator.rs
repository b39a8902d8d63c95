//! Ranking report generation.
//!
//! The plain form, one `<module> <count>` line per entry, is the canonical
//! output and can be parsed back with [`parse_ranking`]. The table and JSON
//! forms are for people and downstream tooling respectively.

use crate::config::OutputFormat;
use crate::error::ReportError;
use crate::models::{RankEntry, Report};
use anyhow::Result;
use std::io::{self, Write};
use std::path::Path;

/// Write a ranking as `<module> <count>` lines, in ranking order.
pub fn write_ranking<W: Write>(ranking: &[RankEntry], out: &mut W) -> io::Result<()> {
    for entry in ranking {
        writeln!(out, "{} {}", entry.module, entry.count)?;
    }
    Ok(())
}

/// Render a ranking in the plain form.
pub fn generate_plain_ranking(ranking: &[RankEntry]) -> Result<String> {
    let mut buf = Vec::new();
    write_ranking(ranking, &mut buf)?;
    Ok(String::from_utf8(buf)?)
}

/// Parse the plain form back into ranking entries. Blank lines are ignored.
#[allow(dead_code)] // Inverse of `write_ranking`, for consumers of saved rankings
pub fn parse_ranking(text: &str) -> Result<Vec<RankEntry>, ReportError> {
    let mut ranking = Vec::new();

    for (i, line) in text.lines().enumerate() {
        let line_no = i + 1;
        if line.trim().is_empty() {
            continue;
        }

        let (module, count) = line
            .rsplit_once(' ')
            .filter(|(module, _)| !module.is_empty())
            .ok_or_else(|| ReportError::MalformedLine {
                line: line_no,
                content: line.to_string(),
            })?;

        let count = count.parse().map_err(|_| ReportError::InvalidCount {
            line: line_no,
            count: count.to_string(),
        })?;

        ranking.push(RankEntry::new(module, count));
    }

    Ok(ranking)
}

/// Render a ranking as a numbered table.
pub fn generate_table_ranking(ranking: &[RankEntry]) -> String {
    let mut table = String::new();

    table.push_str("#    Count  Module\n");
    for (i, entry) in ranking.iter().enumerate() {
        table.push_str(&format!("{:<4} {:<6} {}\n", i + 1, entry.count, entry.module));
    }

    table
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Render a report in the requested format.
pub fn generate_report(report: &Report, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Plain => generate_plain_ranking(&report.ranking),
        OutputFormat::Table => Ok(generate_table_ranking(&report.ranking)),
        OutputFormat::Json => generate_json_report(report).map(|mut json| {
            json.push('\n');
            json
        }),
    }
}

/// Write rendered output to a file, or to standard output when no path is given.
pub fn write_output(content: &str, path: Option<&Path>) -> io::Result<()> {
    match path {
        Some(path) => std::fs::write(path, content),
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle.write_all(content.as_bytes())?;
            handle.flush()
        }
    }
}
