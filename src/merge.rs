use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{anyhow, Context};
use tempfile::Builder;

use crate::config::Config;
use crate::ledger::Ledger;
use crate::record::{Record, SEPARATOR};

/// Extra output bytes accepted when the input's last line had no terminator
pub const TERMINATOR_TOLERANCE: u64 = 2;

/// Line count and byte length of a file
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Checksum {
    lines: u64,
    bytes: u64,
}

impl Checksum {
    pub fn new(lines: u64, bytes: u64) -> Checksum {
        Checksum {
            lines,
            bytes,
        }
    }

    pub fn lines(&self) -> u64 {
        self.lines
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Whether `output` holds the same lines as `self`, allowing for a terminator added after an
    /// unterminated last line.
    pub fn matches(&self, output: &Checksum) -> bool {
        self.lines == output.lines
            && output.bytes >= self.bytes
            && output.bytes <= self.bytes + TERMINATOR_TOLERANCE
    }
}

fn write_record<W: Write>(writer: &mut W, record: &Record, endl: u8) -> std::io::Result<()> {
    if !record.is_blank() {
        writer.write_all(record.tag())?;
        writer.write_all(SEPARATOR)?;
        writer.write_all(record.key())?;
    }
    writer.write_all(&[endl])
}

/// Directory in which `output` is created, `.` for a bare file name
pub(crate) fn output_dir(output: &Path) -> &Path {
    match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Stream every chunk of the ledger, in order, to `output`.
///
/// The lines are written to a temporary file next to `output` that replaces `output` only when
/// all chunks were written.
pub(crate) fn write_output(ledger: &Ledger, output: &Path, config: &Config) -> Result<Checksum, anyhow::Error> {
    let dir = output_dir(output);
    let tmp_file = Builder::new()
        .prefix(".sorted-")
        .tempfile_in(dir)
        .with_context(|| anyhow!("Failed to create output file in {}", dir.display()))?;
    let mut writer = BufWriter::new(tmp_file);

    let mut lines: u64 = 0;
    for chunk in ledger.iter() {
        if chunk.pending() > 0 {
            return Err(anyhow!("chunk [{:?} .. {:?}] was not flushed", chunk.lower(), chunk.upper()));
        }
        let mut written = 0;
        for record in chunk.reader(config)? {
            write_record(&mut writer, &record?, config.endl())
                .with_context(|| format!("path: {}", output.display()))?;
            written += 1;
            lines += 1;
            if lines % config.progress_lines() == 0 {
                log::info!("Written lines: {}", lines);
            }
        }
        if written != chunk.persisted() {
            return Err(anyhow!("chunk held {} records, expected {}", written, chunk.persisted()));
        }
    }

    writer.flush().with_context(|| format!("path: {}", output.display()))?;
    let tmp_file = writer.into_inner()
        .map_err(|e| anyhow!("path: {}, error: {}", output.display(), e.error()))?;
    tmp_file.persist(output)
        .map_err(|e| anyhow!("Failed to persist output file {}: {}", output.display(), e.error))?;

    let bytes = fs::metadata(output)
        .with_context(|| format!("path: {}", output.display()))?
        .len();
    Ok(Checksum::new(lines, bytes))
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use crate::chunk::tests::{records, test_config};
    use crate::chunk::{Chunk, Staging};
    use crate::ledger::Ledger;
    use crate::merge::{output_dir, write_output, Checksum};
    use crate::record::Record;

    #[test]
    fn test_write_output() -> Result<(), anyhow::Error> {
        let dir = tempfile::tempdir()?;
        let config = test_config(dir.path());
        let mut ledger = Ledger::new();
        ledger.push_back(Staging::new(records(&["", "5. Apple", "30. Banana"])).persist(&config)?);
        ledger.push_back(Staging::new(records(&["10. cat", "2. cat"])).persist(&config)?);

        let output = dir.path().join("sorted.txt");
        let checksum = write_output(&ledger, &output, &config)?;
        let expected = "\n5. Apple\n30. Banana\n10. cat\n2. cat\n";
        assert_eq!(fs::read_to_string(&output)?, expected);
        assert_eq!(checksum, Checksum::new(5, expected.len() as u64));
        Ok(())
    }

    #[test]
    fn test_write_empty_ledger() -> Result<(), anyhow::Error> {
        let dir = tempfile::tempdir()?;
        let config = test_config(dir.path());
        let output = dir.path().join("empty.txt");
        let checksum = write_output(&Ledger::new(), &output, &config)?;
        assert_eq!(checksum, Checksum::new(0, 0));
        assert_eq!(fs::metadata(&output)?.len(), 0);
        Ok(())
    }

    #[test]
    fn test_unflushed_chunk_is_rejected() -> Result<(), anyhow::Error> {
        let dir = tempfile::tempdir()?;
        let config = test_config(dir.path());
        let mut ledger = Ledger::new();
        ledger.push_back(Chunk::seeded(Record::parse(b"1. a")?));
        let output = dir.path().join("never.txt");
        assert!(write_output(&ledger, &output, &config).is_err());
        assert!(!output.exists());
        Ok(())
    }

    #[test]
    fn test_output_dir() {
        assert_eq!(output_dir(Path::new("sorted.txt")), Path::new("."));
        assert_eq!(output_dir(Path::new("out/sorted.txt")), Path::new("out"));
        assert_eq!(output_dir(Path::new("/tmp/sorted.txt")), Path::new("/tmp"));
    }

    #[test]
    fn test_checksum_matches() {
        let input = Checksum::new(3, 100);
        assert!(input.matches(&Checksum::new(3, 100)));
        assert!(input.matches(&Checksum::new(3, 101)));
        assert!(input.matches(&Checksum::new(3, 102)));
        assert!(!input.matches(&Checksum::new(3, 103)));
        assert!(!input.matches(&Checksum::new(3, 99)));
        assert!(!input.matches(&Checksum::new(2, 100)));
    }
}
