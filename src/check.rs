use std::path::Path;

use anyhow::Context;
use regex::bytes::Regex;

use crate::line_reader::LineReader;
use crate::record::Record;

/// Outcome of [crate::sort::Sort::check]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CheckReport {
    lines: u64,
    violations: u64,
    format_warnings: u64,
}

impl CheckReport {
    /// Lines read
    pub fn lines(&self) -> u64 {
        self.lines
    }

    /// Adjacent line pairs in the wrong order
    pub fn violations(&self) -> u64 {
        self.violations
    }

    /// Lines not shaped like `<digits>. <text>`
    pub fn format_warnings(&self) -> u64 {
        self.format_warnings
    }

    pub fn is_sorted(&self) -> bool {
        self.violations == 0
    }
}

pub(crate) fn check_file(path: &Path, endl: u8, progress_lines: u64) -> Result<CheckReport, anyhow::Error> {
    log::info!("Started checking sort order of {}", path.display());
    let pattern = Regex::new(r"(?-u)^[0-9]+\. .+$").context("line format pattern")?;
    let mut report = CheckReport::default();
    let mut previous: Option<(u64, Vec<u8>, Record)> = None;
    let mut reader = LineReader::new(path, endl)?;

    while let Some(line) = reader.next() {
        let line = line?;
        let number = reader.lines();
        report.lines = number;
        if number % progress_lines == 0 {
            log::info!("Checked lines: {}", number);
        }

        if !pattern.is_match(&line) {
            report.format_warnings += 1;
            log::warn!("Wrong format, line {}: '{}'", number, String::from_utf8_lossy(&line));
        }

        let current = match Record::parse(&line) {
            Ok(record) => record,
            Err(e) => {
                log::warn!("Skipping line {}: {}", number, e);
                continue;
            }
        };

        if let Some((previous_number, previous_line, previous_record)) = &previous {
            if previous_record > &current {
                report.violations += 1;
                log::warn!(
                    "Lines are in incorrect order, line {}: '{}', line {}: '{}'",
                    previous_number,
                    String::from_utf8_lossy(previous_line),
                    number,
                    String::from_utf8_lossy(&line),
                );
            }
        }
        previous = Some((number, line, current));
    }

    if report.is_sorted() {
        log::info!("All {} lines of {} are sorted correctly", report.lines, path.display());
    } else {
        log::warn!("Found {} sort order violations in {}", report.violations, path.display());
    }
    Ok(report)
}
