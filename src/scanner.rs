use std::path::Path;

use crate::line_reader::LineReader;
use crate::record::Record;
use crate::scan_policy::ScanPolicy;

/// Turns input lines into records.
///
/// Unparsable lines go through the [ScanPolicy]: skipped and logged, or returned as an error that
/// ends the run. Errors reading the input always end the run.
pub(crate) struct Scanner {
    reader: LineReader,
    policy: ScanPolicy,
    skipped: u64,
}

impl Scanner {
    pub(crate) fn new(path: &Path, endl: u8, policy: ScanPolicy) -> Result<Scanner, anyhow::Error> {
        Ok(
            Scanner {
                reader: LineReader::new(path, endl)?,
                policy,
                skipped: 0,
            }
        )
    }

    /// Lines read so far, skipped lines included
    pub(crate) fn lines(&self) -> u64 {
        self.reader.lines()
    }

    pub(crate) fn skipped(&self) -> u64 {
        self.skipped
    }

    pub(crate) fn next_record(&mut self) -> Result<Option<Record>, anyhow::Error> {
        loop {
            let line = match self.reader.next() {
                Some(line) => line?,
                None => return Ok(None),
            };
            match Record::parse(&line) {
                Ok(record) => return Ok(Some(record)),
                Err(e) => {
                    match self.policy {
                        ScanPolicy::Skip => {
                            self.skipped += 1;
                            log::warn!(
                                "Skipping line {} of {}: {}",
                                self.reader.lines(),
                                self.reader.path().display(),
                                e
                            );
                        }
                        ScanPolicy::Fail => {
                            return Err(
                                e.context(
                                    format!(
                                        "path: {}, line: {}",
                                        self.reader.path().display(),
                                        self.reader.lines()
                                    )
                                )
                            );
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use crate::record::Record;
    use crate::scan_policy::ScanPolicy;
    use crate::scanner::Scanner;

    #[test]
    fn test_skip_malformed() -> Result<(), anyhow::Error> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("input.txt");
        fs::write(&path, b"1. a\nbroken\n\n2. b\n")?;
        let mut scanner = Scanner::new(&path, b'\n', ScanPolicy::Skip)?;
        let mut records = Vec::new();
        while let Some(record) = scanner.next_record()? {
            records.push(record);
        }
        assert_eq!(records, vec![Record::parse(b"1. a")?, Record::blank(), Record::parse(b"2. b")?]);
        assert_eq!(scanner.skipped(), 1);
        assert_eq!(scanner.lines(), 4);
        Ok(())
    }

    #[test]
    fn test_fail_on_malformed() -> Result<(), anyhow::Error> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("input.txt");
        fs::write(&path, b"1. a\nbroken\n2. b\n")?;
        let mut scanner = Scanner::new(&path, b'\n', ScanPolicy::Fail)?;
        assert!(scanner.next_record()?.is_some());
        let error = scanner.next_record().unwrap_err();
        assert!(format!("{:#}", error).contains("line: 2"));
        Ok(())
    }
}
