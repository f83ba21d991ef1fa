use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};

/// Reads a file line by line as raw bytes, without line terminators, counting lines as it goes.
pub(crate) struct LineReader {
    path: PathBuf,
    reader: BufReader<File>,
    lines: u64,
    endl: u8,
}

impl LineReader {
    pub(crate) fn new(path: &Path, endl: u8) -> Result<LineReader, anyhow::Error> {
        let file = File::open(path)
            .with_context(|| anyhow!("path: {}", path.display()))?;
        Ok(
            LineReader {
                path: path.to_path_buf(),
                reader: BufReader::new(file),
                lines: 0,
                endl,
            }
        )
    }

    pub(crate) fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Number of lines read so far. This is also the 1 based number of the last returned line.
    pub(crate) fn lines(&self) -> u64 {
        self.lines
    }

    fn read_line(&mut self) -> Result<Option<Vec<u8>>, anyhow::Error> {
        let mut line = Vec::new();
        let bytes = self.reader.read_until(self.endl, &mut line)
            .with_context(|| anyhow!("path: {}, after line: {}", self.path.display(), self.lines))?;
        if bytes == 0 {
            return Ok(None);
        }
        if line.last() == Some(&self.endl) {
            line.pop();
        }
        self.lines += 1;
        Ok(Some(line))
    }
}

impl Iterator for LineReader {
    type Item = Result<Vec<u8>, anyhow::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_line().transpose()
    }
}
