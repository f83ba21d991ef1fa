use std::fs;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use data_encoding::HEXLOWER;
use large_file_sort::record::Record;

/// Directories written by the integration tests
const RESULT_DIRS: [&str; 2] = ["./target/results/", "./target/parallel-results/"];

pub fn setup() {
    for dir in RESULT_DIRS {
        fs::create_dir_all(dir).unwrap_or_else(|e| panic!("Cannot create {}: {}", dir, e));
    }
}

/// Lines of a file without their terminators
#[allow(dead_code)]
pub fn read_lines(path: PathBuf) -> Result<Vec<String>, anyhow::Error> {
    let reader = BufReader::new(File::open(&path)?);
    let lines = reader.lines().collect::<Result<Vec<String>, std::io::Error>>()?;
    Ok(lines)
}

#[allow(dead_code)]
pub fn write_lines(path: &PathBuf, lines: &[&str]) -> Result<(), anyhow::Error> {
    let content: String = lines.iter().map(|line| format!("{}\n", line)).collect();
    fs::write(path, content)?;
    Ok(())
}

/// A random, not yet existing file name in `dir`
#[allow(dead_code)]
pub fn temp_file_name(dir: &str) -> PathBuf {
    Path::new(dir).join(HEXLOWER.encode(&rand::random::<[u8; 16]>()))
}

/// Lines sorted in memory, for comparison with the external sort
#[allow(dead_code)]
pub fn sorted_in_memory(lines: &[String]) -> Vec<String> {
    let mut records: Vec<Record> = lines.iter()
        .map(|line| Record::parse(line.as_bytes()).unwrap())
        .collect();
    records.sort();
    records.iter()
        .map(|record| String::from_utf8(record.line()).unwrap())
        .collect()
}

#[allow(dead_code)]
pub fn assert_sorted(lines: &[String]) {
    for (i, pair) in lines.windows(2).enumerate() {
        let first = Record::parse(pair[0].as_bytes()).unwrap();
        let second = Record::parse(pair[1].as_bytes()).unwrap();
        assert!(first <= second, "lines {} and {} out of order: '{}' > '{}'", i + 1, i + 2, pair[0], pair[1]);
    }
}
