use std::fs;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{anyhow, Context};
use tempfile::Builder;

use crate::config::Config;
use crate::line_reader::LineReader;
use crate::record::Record;

pub(crate) fn create_column_file(config: &Config, suffix: &str) -> Result<(File, PathBuf), anyhow::Error> {
    let tmp_file = Builder::new()
        .prefix(config.tmp_prefix())
        .suffix(suffix)
        .tempfile_in(config.work_dir())
        .with_context(|| anyhow!("Failed to create column file in {}", config.work_dir().display()))?;
    let (file, path) = tmp_file.keep()
        .with_context(|| anyhow!("Failed to persist column file in {}", config.work_dir().display()))?;
    Ok((file, path))
}

/// The two index aligned column files of a persisted chunk
#[derive(Debug)]
pub(crate) struct ColumnFiles {
    key_path: PathBuf,
    tag_path: PathBuf,
}

impl ColumnFiles {
    pub(crate) fn key_path(&self) -> &PathBuf {
        &self.key_path
    }

    pub(crate) fn tag_path(&self) -> &PathBuf {
        &self.tag_path
    }
}

/// A range bounded slice of the sorted output.
///
/// The persisted part lives in two column files, sorted. Records routed to the chunk since the
/// last flush wait unsorted in `pending`. The bounds cover both parts.
#[derive(Debug)]
pub(crate) struct Chunk {
    lower: Record,
    upper: Record,
    columns: Option<ColumnFiles>,
    persisted: usize,
    pending: Vec<Record>,
}

impl Chunk {
    /// A new, not yet persisted chunk holding a single record
    pub(crate) fn seeded(record: Record) -> Chunk {
        Chunk {
            lower: record.clone(),
            upper: record.clone(),
            columns: None,
            persisted: 0,
            pending: vec![record],
        }
    }

    pub(crate) fn lower(&self) -> &Record {
        &self.lower
    }

    pub(crate) fn upper(&self) -> &Record {
        &self.upper
    }

    #[cfg(test)]
    pub(crate) fn columns(&self) -> Option<&ColumnFiles> {
        self.columns.as_ref()
    }

    pub(crate) fn persisted(&self) -> usize {
        self.persisted
    }

    pub(crate) fn pending(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.persisted + self.pending.len()
    }

    pub(crate) fn is_persisted(&self) -> bool {
        self.persisted > 0
    }

    pub(crate) fn absorb(&mut self, record: Record) {
        self.pending.push(record);
    }

    pub(crate) fn absorb_lower(&mut self, record: Record) {
        self.lower = record.clone();
        self.pending.push(record);
    }

    pub(crate) fn absorb_upper(&mut self, record: Record) {
        self.upper = record.clone();
        self.pending.push(record);
    }

    pub(crate) fn take_pending(&mut self) -> Vec<Record> {
        std::mem::take(&mut self.pending)
    }

    pub(crate) fn reader(&self, config: &Config) -> Result<ChunkReader, anyhow::Error> {
        match &self.columns {
            Some(columns) => ChunkReader::new(columns, config.endl()),
            None => Err(anyhow!("chunk [{:?} .. {:?}] has no column files", self.lower, self.upper)),
        }
    }

    /// Read the persisted records back, in their sorted order.
    pub(crate) fn read_persisted(&self, config: &Config) -> Result<Vec<Record>, anyhow::Error> {
        let mut records = Vec::with_capacity(self.persisted + self.pending.len());
        for record in self.reader(config)? {
            records.push(record?);
        }
        if records.len() != self.persisted {
            return Err(
                anyhow!(
                    "chunk column files hold {} records, expected {}",
                    records.len(),
                    self.persisted,
                )
            );
        }
        Ok(records)
    }

    pub(crate) fn remove_files(&self) -> Result<(), anyhow::Error> {
        if let Some(columns) = &self.columns {
            fs::remove_file(columns.key_path())
                .with_context(|| format!("path: {}", columns.key_path().display()))?;
            fs::remove_file(columns.tag_path())
                .with_context(|| format!("path: {}", columns.tag_path().display()))?;
        }
        Ok(())
    }
}

/// Reads the two column files of a chunk in lockstep
pub(crate) struct ChunkReader {
    keys: LineReader,
    tags: LineReader,
}

impl ChunkReader {
    fn new(columns: &ColumnFiles, endl: u8) -> Result<ChunkReader, anyhow::Error> {
        Ok(
            ChunkReader {
                keys: LineReader::new(columns.key_path(), endl)?,
                tags: LineReader::new(columns.tag_path(), endl)?,
            }
        )
    }
}

impl Iterator for ChunkReader {
    type Item = Result<Record, anyhow::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        match (self.keys.next(), self.tags.next()) {
            (None, None) => None,
            (Some(key), Some(tag)) => {
                Some(key.and_then(|key| tag.map(|tag| Record::new(key, tag))))
            }
            _ => {
                Some(
                    Err(
                        anyhow!(
                            "column files are not aligned, keys: {} ({} lines), tags: {} ({} lines)",
                            self.keys.path().display(),
                            self.keys.lines(),
                            self.tags.path().display(),
                            self.tags.lines(),
                        )
                    )
                )
            }
        }
    }
}

/// Records owned by a single flush, split or reorder operation while they are sorted and written.
///
/// Never visible to the router.
#[derive(Debug, Default)]
pub(crate) struct Staging {
    records: Vec<Record>,
}

impl Staging {
    pub(crate) fn new(records: Vec<Record>) -> Staging {
        Staging {
            records,
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    #[cfg(test)]
    pub(crate) fn records(&self) -> &[Record] {
        &self.records
    }

    pub(crate) fn append(&mut self, mut records: Vec<Record>) {
        self.records.append(&mut records);
    }

    pub(crate) fn sort(&mut self) {
        self.records.sort_unstable();
    }

    /// Split sorted records at `len / 2`; the upper half gets the extra record of an odd length.
    pub(crate) fn split(mut self) -> (Staging, Staging) {
        let upper = self.records.split_off(self.records.len() / 2);
        (self, Staging::new(upper))
    }

    /// Write sorted records to a fresh pair of column files.
    pub(crate) fn persist(self, config: &Config) -> Result<Chunk, anyhow::Error> {
        let (lower, upper) = match (self.records.first(), self.records.last()) {
            (Some(lower), Some(upper)) => (lower.clone(), upper.clone()),
            _ => return Err(anyhow!("cannot persist an empty chunk")),
        };

        let (key_file, key_path) = create_column_file(config, config.key_suffix())?;
        let (tag_file, tag_path) = create_column_file(config, config.tag_suffix())?;
        let mut key_writer = BufWriter::new(key_file);
        let mut tag_writer = BufWriter::new(tag_file);
        let endl = [config.endl()];
        for record in &self.records {
            key_writer.write_all(record.key())
                .and_then(|_| key_writer.write_all(&endl))
                .with_context(|| format!("path: {}", key_path.display()))?;
            tag_writer.write_all(record.tag())
                .and_then(|_| tag_writer.write_all(&endl))
                .with_context(|| format!("path: {}", tag_path.display()))?;
        }
        key_writer.flush().with_context(|| format!("path: {}", key_path.display()))?;
        tag_writer.flush().with_context(|| format!("path: {}", tag_path.display()))?;

        Ok(
            Chunk {
                lower,
                upper,
                columns: Some(ColumnFiles { key_path, tag_path }),
                persisted: self.records.len(),
                pending: Vec::new(),
            }
        )
    }
}
