use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::Builder;

use crate::chunk::Staging;
use crate::config::Config;
use crate::generate::Generator;
use crate::record::Record;
use crate::scan_policy::ScanPolicy;

/// Record counts of a default run, from half a million to sixteen million records
pub const DEFAULT_RECORD_COUNTS: [usize; 5] = [
    512 * 1024,
    1024 * 1024,
    2048 * 1024,
    4096 * 1024,
    16384 * 1024,
];

/// Average length of a generated record, number part and string part, used for projections
pub const AVERAGE_RECORD_BYTES: u64 = 5 + 20;

pub const GB_10: u64 = 10 * 1024 * 1024 * 1024;
pub const GB_100: u64 = 100 * 1024 * 1024 * 1024;

/// Records processed in one timed step
#[derive(Clone, Copy, Debug)]
pub struct Throughput {
    records: usize,
    elapsed: Duration,
}

impl Throughput {
    pub fn new(records: usize, elapsed: Duration) -> Throughput {
        Throughput {
            records,
            elapsed,
        }
    }

    pub fn records(&self) -> usize {
        self.records
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Records per second. A step too fast to measure counts as one millisecond.
    pub fn per_second(&self) -> f64 {
        let millis = self.elapsed.as_secs_f64() * 1000.0;
        let millis = if millis > 0.0 { millis } else { 1.0 };
        self.records as f64 * 1000.0 / millis
    }
}

/// Average records per second over all steps, zero when nothing was measured
pub fn average_per_second(steps: &[Throughput]) -> f64 {
    if steps.is_empty() {
        return 0.0;
    }
    steps.iter().map(|step| step.per_second()).sum::<f64>() / steps.len() as f64
}

/// Minutes needed for a file of `file_bytes` at `per_second` records per second
pub fn projected_minutes(per_second: f64, file_bytes: u64) -> f64 {
    if per_second <= 0.0 {
        return f64::INFINITY;
    }
    (file_bytes / AVERAGE_RECORD_BYTES) as f64 / (per_second * 60.0)
}

/// Timings of a [PerfTest] run
#[derive(Clone, Debug, Default)]
pub struct PerfReport {
    sort: Vec<Throughput>,
    write: Vec<Throughput>,
    read: Vec<Throughput>,
}

impl PerfReport {
    /// In memory sort of a chunk
    pub fn sort(&self) -> &[Throughput] {
        &self.sort
    }

    /// Writing a sorted chunk to its column files
    pub fn write(&self) -> &[Throughput] {
        &self.write
    }

    /// Reading a chunk back from its column files
    pub fn read(&self) -> &[Throughput] {
        &self.read
    }
}

/// Measures the building blocks of a sort: sorting a chunk in memory on a single thread, and
/// writing and reading its column files.
///
/// # Examples
/// ```
/// use large_file_sort::perftest::PerfTest;
///
/// let dir = tempfile::tempdir().unwrap();
/// let mut perf_test = PerfTest::new(dir.path().to_path_buf());
/// perf_test.with_record_counts(vec![1000]);
/// let report = perf_test.run().unwrap();
/// assert_eq!(report.sort().len(), 1);
/// ```
pub struct PerfTest {
    tmp: PathBuf,
    record_counts: Vec<usize>,
    seed: Option<u64>,
}

impl PerfTest {
    /// Create a run over [DEFAULT_RECORD_COUNTS] with chunk files in `tmp`
    pub fn new(tmp: PathBuf) -> PerfTest {
        PerfTest {
            tmp,
            record_counts: DEFAULT_RECORD_COUNTS.to_vec(),
            seed: None,
        }
    }

    pub fn with_record_counts(&mut self, record_counts: Vec<usize>) {
        self.record_counts = record_counts;
    }

    pub fn with_seed(&mut self, seed: u64) {
        self.seed = Some(seed);
    }

    pub fn run(&self) -> Result<PerfReport, anyhow::Error> {
        if self.record_counts.iter().any(|count| *count == 0) {
            return Err(anyhow!("Record counts must be positive: {:?}", self.record_counts));
        }
        let work_dir = Builder::new()
            .prefix("perf-")
            .tempdir_in(&self.tmp)
            .with_context(|| anyhow!("Cannot create temporary directory in {}", self.tmp.display()))?;
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut report = PerfReport::default();
        log::info!("Started performance test of {} chunk sizes", self.record_counts.len());
        for count in &self.record_counts {
            let config = Config::new(work_dir.path().to_path_buf(), 1, *count, *count, ScanPolicy::Fail, b'\n');
            Self::measure(&mut rng, *count, &config, &mut report)?;
        }

        Self::log_summary("Sorting", &report.sort);
        Self::log_summary("Writing", &report.write);
        Self::log_summary("Reading", &report.read);
        work_dir.close().context("Cannot remove performance test files")?;
        Ok(report)
    }

    fn measure(rng: &mut StdRng, count: usize, config: &Config, report: &mut PerfReport) -> Result<(), anyhow::Error> {
        let records: Vec<Record> = (0..count).map(|_| Generator::random_record(rng)).collect();
        log::info!("{} records generated in memory", count);
        let mut staging = Staging::new(records);

        let started = Instant::now();
        staging.sort();
        let sort = Throughput::new(count, started.elapsed());
        log::info!("Sorting {} records took {:?}, records per sec: {:.0}", count, sort.elapsed(), sort.per_second());

        let started = Instant::now();
        let chunk = staging.persist(config)?;
        let write = Throughput::new(count, started.elapsed());
        log::info!("Writing {} records took {:?}, records per sec: {:.0}", count, write.elapsed(), write.per_second());

        let started = Instant::now();
        let read_back = chunk.read_persisted(config)?;
        let read = Throughput::new(read_back.len(), started.elapsed());
        log::info!("Reading {} records took {:?}, records per sec: {:.0}", count, read.elapsed(), read.per_second());
        chunk.remove_files()?;

        report.sort.push(sort);
        report.write.push(write);
        report.read.push(read);
        Ok(())
    }

    fn log_summary(step: &str, steps: &[Throughput]) {
        let per_second = average_per_second(steps);
        log::info!("{}: average records per sec: {:.0}", step, per_second);
        log::info!(
            "{}: projected time for 10GB: {:.2} min, for 100GB: {:.2} min",
            step,
            projected_minutes(per_second, GB_10),
            projected_minutes(per_second, GB_100),
        );
    }
}
