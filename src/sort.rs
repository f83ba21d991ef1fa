use std::cmp::min;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Context};
use tempfile::Builder;

use crate::check::{check_file, CheckReport};
use crate::config::Config;
use crate::flush::Engine;
use crate::merge::{output_dir, write_output, Checksum};
use crate::scan_policy::ScanPolicy;
use crate::scanner::Scanner;

/// Default number of records sorted in memory at once
pub const DEFAULT_CHUNK_RECORDS: usize = 4 * 1024 * 1024;

/// Free space required on the volume of the temporary directory, as a multiple of the input size.
/// Covers the two column files of every chunk, the chunks duplicated while splitting and the
/// output file.
pub const FREE_SPACE_MULTIPLIER: u64 = 3;

pub(crate) const PROGRESS_LINES: u64 = 5_000_000;

/// Statistics of a completed sort
#[derive(Clone, Debug)]
pub struct SortReport {
    input: Checksum,
    output: Checksum,
    chunks: usize,
    flush_cycles: usize,
    splits: usize,
    reorders: usize,
    skipped_lines: u64,
    peak_pending: usize,
}

impl SortReport {
    /// Line count and byte length of the input
    pub fn input(&self) -> &Checksum {
        &self.input
    }

    /// Line count and byte length of the output
    pub fn output(&self) -> &Checksum {
        &self.output
    }

    /// Number of chunks merged into the output
    pub fn chunks(&self) -> usize {
        self.chunks
    }

    pub fn flush_cycles(&self) -> usize {
        self.flush_cycles
    }

    pub fn splits(&self) -> usize {
        self.splits
    }

    /// Adjacent chunk pairs merged and re-split to restore the order
    pub fn reorders(&self) -> usize {
        self.reorders
    }

    /// Input lines left out because they could not be parsed
    pub fn skipped_lines(&self) -> u64 {
        self.skipped_lines
    }

    /// Largest number of records held in pending buffers at once
    pub fn peak_pending(&self) -> usize {
        self.peak_pending
    }

    /// Whether output line count and byte length agree with the input
    pub fn integrity_ok(&self) -> bool {
        self.input.matches(&self.output)
    }
}

/// Sort a text file of `<number>. <string>` lines.
///
/// Lines are ordered by the string part and then by the number part, both compared byte by byte.
/// The number part is compared as text, so "10. cat" comes before "2. cat".
///
/// # Examples
/// ```
/// use std::path::PathBuf;
/// use large_file_sort::sort::Sort;
///
/// fn sort_file(input: PathBuf, output: PathBuf, tmp: PathBuf) -> Result<(), anyhow::Error> {
///     let mut sort = Sort::new(input, output);
///     // records sorted in memory at once, and held in all pending buffers together
///     sort.with_chunk_records(1_000_000);
///     sort.with_buffered_records(4_000_000);
///     // number of threads flushing chunks. The default of zero uses all cores.
///     sort.with_tasks(4);
///     // the default is the directory of the input file
///     sort.with_tmp_dir(tmp);
///     sort.sort()
/// }
/// ```
pub struct Sort {
    input: PathBuf,
    output: PathBuf,
    tmp: Option<PathBuf>,
    tasks: usize,
    chunk_records: usize,
    buffered_records: usize,
    scan_policy: ScanPolicy,
    endl: char,
}

impl Sort {
    /// Create a default Sort definition.
    ///
    /// * chunk files are created in the directory of the input file
    /// * all cores are used to flush chunks
    /// * up to [DEFAULT_CHUNK_RECORDS] records are sorted in memory at once
    /// * up to four times that many records wait in pending buffers
    /// * lines that cannot be parsed are skipped
    /// * lines end with '\n'
    pub fn new(input: PathBuf, output: PathBuf) -> Sort {
        Sort {
            input,
            output,
            tmp: None,
            tasks: 0,
            chunk_records: DEFAULT_CHUNK_RECORDS,
            buffered_records: DEFAULT_CHUNK_RECORDS * 4,
            scan_policy: ScanPolicy::Skip,
            endl: '\n',
        }
    }

    /// Set the directory in which the temporary chunk directory is created.
    ///
    /// It needs free space of [FREE_SPACE_MULTIPLIER] times the input size. The directory of the
    /// output file needs free space of the input size.
    pub fn with_tmp_dir(&mut self, tmp: PathBuf) {
        self.tmp = Some(tmp);
    }

    /// Set the number of flush threads. Zero uses all system cores.
    pub fn with_tasks(&mut self, tasks: usize) {
        self.tasks = tasks;
    }

    /// Set the largest number of records sorted in memory at once. Also caps the pending buffer
    /// of a single chunk.
    pub fn with_chunk_records(&mut self, chunk_records: usize) {
        self.chunk_records = chunk_records;
    }

    /// Set the largest number of records held in all pending buffers together
    pub fn with_buffered_records(&mut self, buffered_records: usize) {
        self.buffered_records = buffered_records;
    }

    /// Set what happens to lines that cannot be parsed
    pub fn with_scan_policy(&mut self, scan_policy: ScanPolicy) {
        self.scan_policy = scan_policy;
    }

    /// Set line ending char - not supporting CRLF
    pub fn with_endl(&mut self, endl: char) {
        self.endl = endl;
    }

    /// Sort the input file into the output file
    pub fn sort(&self) -> Result<(), anyhow::Error> {
        self.sort_with_report()?;
        Ok(())
    }

    /// Sort the input file into the output file and report on the run
    pub fn sort_with_report(&self) -> Result<SortReport, anyhow::Error> {
        let input_bytes = self.check_preconditions()?;
        let tmp = self.tmp_root();
        Self::check_free_space(&tmp, input_bytes.saturating_mul(FREE_SPACE_MULTIPLIER))?;
        // the output may live on another volume than the chunks
        Self::check_free_space(output_dir(&self.output), input_bytes)?;

        log::info!("Creating temporary directory for chunks in {}", tmp.display());
        let work_dir = Builder::new()
            .prefix("chunks-")
            .tempdir_in(&tmp)
            .with_context(|| anyhow!("Cannot create temporary directory for chunks in {}", tmp.display()))?;
        let config = self.create_config(work_dir.path().to_path_buf())?;

        let result = Self::internal_sort(&self.input, &self.output, input_bytes, &config);
        if let Err(e) = &result {
            log::error!("Cannot complete sorting {}: {:#}", self.input.display(), e);
        }

        log::info!("Removing temporary chunks");
        if let Err(e) = work_dir.close() {
            log::warn!("Cannot remove temporary chunks: {}", e);
        }
        result
    }

    /// Verify the sort order of the input file
    pub fn check(&self) -> Result<CheckReport, anyhow::Error> {
        if !self.input.is_file() {
            return Err(anyhow!("File was not found: {}", self.input.display()));
        }
        check_file(&self.input, self.endl_byte()?, PROGRESS_LINES)
    }

    fn endl_byte(&self) -> Result<u8, anyhow::Error> {
        if self.endl.is_ascii() {
            Ok(self.endl as u8)
        } else {
            Err(anyhow!("line ending must be an ASCII character, got: {:?}", self.endl))
        }
    }

    fn tmp_root(&self) -> PathBuf {
        match &self.tmp {
            Some(tmp) => tmp.clone(),
            None => match self.input.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            },
        }
    }

    /// Returns the input length in bytes
    fn check_preconditions(&self) -> Result<u64, anyhow::Error> {
        if self.input.as_os_str().is_empty() {
            return Err(anyhow!("Input path is empty"));
        }
        if self.output.as_os_str().is_empty() {
            return Err(anyhow!("Output path is empty"));
        }
        if self.chunk_records == 0 || self.buffered_records == 0 {
            return Err(
                anyhow!(
                    "Memory caps must be positive, chunk records: {}, buffered records: {}",
                    self.chunk_records,
                    self.buffered_records
                )
            );
        }
        self.endl_byte()?;
        if !self.input.is_file() {
            return Err(anyhow!("File was not found: {}", self.input.display()));
        }
        let metadata = self.input.metadata()
            .with_context(|| anyhow!("path: {}", self.input.display()))?;
        Ok(metadata.len())
    }

    fn check_free_space(dir: &Path, required: u64) -> Result<(), anyhow::Error> {
        let available = fs2::available_space(dir)
            .with_context(|| anyhow!("Cannot get free space of {}", dir.display()))?;
        if available < required {
            return Err(
                anyhow!(
                    "There is not enough free space ({} bytes required, {} available) at {}",
                    required,
                    available,
                    dir.display()
                )
            );
        }
        Ok(())
    }

    fn create_config(&self, work_dir: PathBuf) -> Result<Config, anyhow::Error> {
        let tasks = if self.tasks == 0 {
            num_cpus::get()
        } else {
            self.tasks
        };

        Ok(
            Config::new(
                work_dir,
                tasks,
                self.chunk_records,
                self.buffered_records,
                self.scan_policy,
                self.endl_byte()?,
            )
        )
    }

    fn internal_sort(input: &Path, output: &Path, input_bytes: u64, config: &Config) -> Result<SortReport, anyhow::Error> {
        let started = Instant::now();
        log::info!("Started processing {} with {} bytes", input.display(), input_bytes);
        let mut engine = Engine::new(config.clone())?;
        let mut scanner = Scanner::new(input, config.endl(), config.scan_policy())?;

        let mut initial = Vec::with_capacity(min(config.chunk_records(), 1 << 16));
        let mut exhausted = true;
        while let Some(record) = scanner.next_record()? {
            initial.push(record);
            if initial.len() >= config.chunk_records() {
                exhausted = false;
                break;
            }
        }
        engine.load_initial(initial)?;

        if exhausted {
            log::info!("Input fits in a single chunk, lines: {}", scanner.lines());
        } else {
            log::info!("Started splitting input into chunks");
            while let Some(record) = scanner.next_record()? {
                engine.ingest(record)?;
                if scanner.lines() % config.progress_lines() == 0 {
                    log::info!("Processed lines: {}, chunks: {}", scanner.lines(), engine.ledger().len());
                }
            }
            engine.flush_cycle()?;
            log::info!("Completed splitting input into {} chunks", engine.ledger().len());
        }

        let input_checksum = Checksum::new(scanner.lines(), input_bytes);
        log::info!(
            "Input lines: {}, records in chunks: {}, skipped lines: {}",
            input_checksum.lines(),
            engine.ledger().records(),
            scanner.skipped()
        );

        log::info!("Started merging into {}", output.display());
        let output_checksum = write_output(engine.ledger(), output, config)?;
        log::info!(
            "Output lines: {}, output length: {} bytes",
            output_checksum.lines(),
            output_checksum.bytes()
        );

        if input_checksum.matches(&output_checksum) {
            log::info!("Checksums of line count and file length are equal");
        } else {
            log::warn!(
                "Checksums of line count and file length are not equal, input: {:?}, output: {:?}",
                input_checksum,
                output_checksum
            );
        }

        log::info!(
            "Completed sorting {} to {} in {:.3} sec",
            input.display(),
            output.display(),
            started.elapsed().as_secs_f64()
        );
        Ok(
            SortReport {
                input: input_checksum,
                output: output_checksum,
                chunks: engine.ledger().len(),
                flush_cycles: engine.cycles(),
                splits: engine.splits(),
                reorders: engine.reorders(),
                skipped_lines: scanner.skipped(),
                peak_pending: engine.peak_pending(),
            }
        )
    }
}
