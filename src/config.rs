use std::path::PathBuf;

use crate::scan_policy::ScanPolicy;
use crate::sort::PROGRESS_LINES;

#[derive(Clone, Debug)]
pub(crate) struct Config {
    work_dir: PathBuf,
    tmp_prefix: String,
    key_suffix: String,
    tag_suffix: String,
    tasks: usize,
    chunk_records: usize,
    buffered_records: usize,
    scan_policy: ScanPolicy,
    endl: u8,
    progress_lines: u64,
}

impl Config {
    pub(crate) fn new(
        work_dir: PathBuf,
        tasks: usize,
        chunk_records: usize,
        buffered_records: usize,
        scan_policy: ScanPolicy,
        endl: u8,
    ) -> Config {
        Config {
            work_dir,
            tmp_prefix: "chunk-".to_string(),
            key_suffix: ".keys".to_string(),
            tag_suffix: ".tags".to_string(),
            tasks,
            chunk_records,
            buffered_records,
            scan_policy,
            endl,
            progress_lines: PROGRESS_LINES,
        }
    }

    pub(crate) fn work_dir(&self) -> &PathBuf {
        &self.work_dir
    }

    pub(crate) fn tmp_prefix(&self) -> &String {
        &self.tmp_prefix
    }

    pub(crate) fn key_suffix(&self) -> &String {
        &self.key_suffix
    }

    pub(crate) fn tag_suffix(&self) -> &String {
        &self.tag_suffix
    }

    pub(crate) fn tasks(&self) -> usize {
        self.tasks
    }

    pub(crate) fn chunk_records(&self) -> usize {
        self.chunk_records
    }

    pub(crate) fn buffered_records(&self) -> usize {
        self.buffered_records
    }

    pub(crate) fn scan_policy(&self) -> ScanPolicy {
        self.scan_policy
    }

    pub(crate) fn endl(&self) -> u8 {
        self.endl
    }

    pub(crate) fn progress_lines(&self) -> u64 {
        self.progress_lines
    }
}
