use std::cmp::max;

use anyhow::{anyhow, Context};
use rayon::prelude::*;
use rayon::ThreadPool;

use crate::chunk::{Chunk, Staging};
use crate::config::Config;
use crate::ledger::{ChunkId, Ledger};
use crate::record::Record;
use crate::router::route;

/// Result of flushing one touched chunk
#[derive(Debug)]
pub(crate) enum Flushed {
    /// First flush of a chunk, persisted in place
    Persisted(Chunk),
    /// Persisted content and pending records, merged and split in two
    Split(Chunk, Chunk),
}

/// Persist the pending records of a chunk the flush owns exclusively.
pub(crate) fn flush_chunk(mut chunk: Chunk, config: &Config) -> Result<Flushed, anyhow::Error> {
    if !chunk.is_persisted() {
        let mut staging = Staging::new(chunk.take_pending());
        staging.sort();
        return Ok(Flushed::Persisted(staging.persist(config)?));
    }

    let mut staging = Staging::new(chunk.read_persisted(config)?);
    staging.append(chunk.take_pending());
    staging.sort();
    let (lower, upper) = staging.split();
    let lower = lower.persist(config)?;
    let upper = upper.persist(config)?;
    chunk.remove_files()?;
    Ok(Flushed::Split(lower, upper))
}

/// Merge and re-split every adjacent pair whose ranges overlap.
///
/// After a repair the walk resumes at the new lower half. Chunks must not hold pending records.
/// Returns the number of repaired pairs.
pub(crate) fn reorder(ledger: &mut Ledger, config: &Config) -> Result<usize, anyhow::Error> {
    let mut repaired = 0;
    let mut position = 0;
    while position + 1 < ledger.len() {
        let first = ledger.chunk(ledger.ids()[position])?;
        let second = ledger.chunk(ledger.ids()[position + 1])?;
        if first.upper() <= second.lower() {
            position += 1;
            continue;
        }
        if first.pending() > 0 || second.pending() > 0 {
            return Err(anyhow!("cannot reorder chunks at {} with pending records", position));
        }

        let mut staging = Staging::new(first.read_persisted(config)?);
        staging.append(second.read_persisted(config)?);
        staging.sort();
        let (lower, upper) = staging.split();
        let lower = lower.persist(config)?;
        let upper = upper.persist(config)?;
        let (_, replaced) = ledger.splice(position, 2, lower, upper)?;
        for chunk in replaced {
            chunk.remove_files()?;
        }
        repaired += 1;
        log::debug!("Repaired chunk order at position {}, chunks: {}", position, ledger.len());
    }
    Ok(repaired)
}

/// Owns the ledger and drives the initial load, routing and flush cycles.
pub(crate) struct Engine {
    config: Config,
    pool: ThreadPool,
    ledger: Ledger,
    cycles: usize,
    splits: usize,
    reorders: usize,
    peak_pending: usize,
}

impl Engine {
    pub(crate) fn new(config: Config) -> Result<Engine, anyhow::Error> {
        let tasks = config.tasks();
        log::info!("Initializing flush thread pool, tasks: {}", tasks);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(tasks)
            .thread_name(|i| format!("flush-{}", i))
            .build()
            .with_context(|| format!("flush thread pool, tasks: {}", tasks))?;
        Ok(
            Engine {
                config,
                pool,
                ledger: Ledger::new(),
                cycles: 0,
                splits: 0,
                reorders: 0,
                peak_pending: 0,
            }
        )
    }

    pub(crate) fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub(crate) fn cycles(&self) -> usize {
        self.cycles
    }

    pub(crate) fn splits(&self) -> usize {
        self.splits
    }

    pub(crate) fn reorders(&self) -> usize {
        self.reorders
    }

    /// Largest number of pending records held at once
    pub(crate) fn peak_pending(&self) -> usize {
        self.peak_pending
    }

    /// Sort the first block of input and persist it as the only chunk. An empty block leaves the
    /// ledger empty.
    pub(crate) fn load_initial(&mut self, mut records: Vec<Record>) -> Result<(), anyhow::Error> {
        if !self.ledger.is_empty() {
            return Err(anyhow!("initial load into a ledger with {} chunks", self.ledger.len()));
        }
        if records.is_empty() {
            return Ok(());
        }
        log::info!("Sorting initial chunk of {} records", records.len());
        self.pool.install(|| records.par_sort_unstable());
        let chunk = Staging::new(records).persist(&self.config)?;
        self.ledger.push_back(chunk);
        Ok(())
    }

    /// Route one record and run a flush cycle when a memory cap is reached.
    pub(crate) fn ingest(&mut self, record: Record) -> Result<(), anyhow::Error> {
        let id = route(&mut self.ledger, record)?;
        self.peak_pending = max(self.peak_pending, self.ledger.touched_pending());
        if self.should_flush(id)? {
            self.flush_cycle()?;
        }
        Ok(())
    }

    fn should_flush(&self, id: ChunkId) -> Result<bool, anyhow::Error> {
        Ok(
            self.ledger.touched_pending() >= self.config.buffered_records()
                || self.ledger.chunk(id)?.pending() >= self.config.chunk_records()
        )
    }

    /// Persist every touched chunk, splitting those that were persisted before, then repair the
    /// chunk order.
    pub(crate) fn flush_cycle(&mut self) -> Result<(), anyhow::Error> {
        let touched = self.ledger.touched();
        if touched.is_empty() {
            return Ok(());
        }
        log::debug!(
            "Flushing {} chunks holding {} pending records",
            touched.len(),
            self.ledger.touched_pending()
        );

        let mut work = Vec::with_capacity(touched.len());
        for id in touched {
            work.push((id, self.ledger.take(id)?));
        }

        let config = &self.config;
        let flushed = self.pool.install(|| {
            work.into_par_iter()
                .map(|(id, chunk)| flush_chunk(chunk, config).map(|flushed| (id, flushed)))
                .collect::<Result<Vec<(ChunkId, Flushed)>, anyhow::Error>>()
        })?;

        for (id, flushed) in flushed {
            match flushed {
                Flushed::Persisted(chunk) => {
                    self.ledger.put(id, chunk);
                }
                Flushed::Split(lower, upper) => {
                    let position = self.ledger.position(id)?;
                    self.ledger.splice(position, 1, lower, upper)?;
                    self.splits += 1;
                }
            }
        }

        let repaired = reorder(&mut self.ledger, &self.config)?;
        if repaired > 0 {
            log::info!("Sorted existing chunks to ensure correct order, repaired pairs: {}", repaired);
        }
        self.reorders += repaired;
        self.ledger.clear_touched();
        self.cycles += 1;
        log::debug!("Flush cycle {} done, chunks: {}", self.cycles, self.ledger.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use crate::chunk::tests::{records, test_config};
    use crate::chunk::{Chunk, Staging};
    use crate::flush::{flush_chunk, reorder, Engine, Flushed};
    use crate::ledger::Ledger;
    use crate::record::Record;

    fn persisted(config: &crate::config::Config, lines: &[&str]) -> Chunk {
        let mut staging = Staging::new(records(lines));
        staging.sort();
        staging.persist(config).unwrap()
    }

    fn all_records(ledger: &Ledger, config: &crate::config::Config) -> Vec<Record> {
        ledger.iter().flat_map(|chunk| chunk.read_persisted(config).unwrap()).collect()
    }

    fn files_in(dir: &std::path::Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_flush_new_chunk() -> Result<(), anyhow::Error> {
        let dir = tempfile::tempdir()?;
        let config = test_config(dir.path());
        let mut chunk = Chunk::seeded(Record::parse(b"2. b")?);
        chunk.absorb_lower(Record::parse(b"1. a")?);
        chunk.absorb(Record::parse(b"3. a")?);
        match flush_chunk(chunk, &config)? {
            Flushed::Persisted(chunk) => {
                assert_eq!(chunk.persisted(), 3);
                assert_eq!(chunk.pending(), 0);
                assert_eq!(chunk.lower(), &Record::parse(b"1. a")?);
                assert_eq!(chunk.upper(), &Record::parse(b"2. b")?);
                assert_eq!(chunk.read_persisted(&config)?, records(&["1. a", "3. a", "2. b"]));
            }
            flushed => panic!("unexpected {:?}", flushed),
        }
        Ok(())
    }

    #[test]
    fn test_flush_persisted_chunk_splits() -> Result<(), anyhow::Error> {
        let dir = tempfile::tempdir()?;
        let config = test_config(dir.path());
        let mut chunk = persisted(&config, &["1. a", "1. c", "1. e"]);
        chunk.absorb(Record::parse(b"1. b")?);
        chunk.absorb(Record::parse(b"1. d")?);
        assert_eq!(files_in(dir.path()), 2);
        match flush_chunk(chunk, &config)? {
            Flushed::Split(lower, upper) => {
                assert_eq!(lower.read_persisted(&config)?, records(&["1. a", "1. b"]));
                assert_eq!(upper.read_persisted(&config)?, records(&["1. c", "1. d", "1. e"]));
                assert!(lower.upper() <= upper.lower());
            }
            flushed => panic!("unexpected {:?}", flushed),
        }
        // the replaced column files are gone
        assert_eq!(files_in(dir.path()), 4);
        Ok(())
    }

    #[test]
    fn test_reorder_repairs_overlap() -> Result<(), anyhow::Error> {
        let dir = tempfile::tempdir()?;
        let config = test_config(dir.path());
        let mut ledger = Ledger::new();
        ledger.push_back(persisted(&config, &["1. a", "1. b"]));
        ledger.push_back(persisted(&config, &["1. c", "1. x"]));
        ledger.push_back(persisted(&config, &["1. d", "1. e", "1. z"]));
        let repaired = reorder(&mut ledger, &config)?;
        assert_eq!(repaired, 1);
        assert_eq!(ledger.len(), 3);
        let chunks: Vec<&Chunk> = ledger.iter().collect();
        for pair in chunks.windows(2) {
            assert!(pair[0].upper() <= pair[1].lower());
        }
        assert_eq!(
            all_records(&ledger, &config),
            records(&["1. a", "1. b", "1. c", "1. d", "1. e", "1. x", "1. z"])
        );
        assert_eq!(files_in(dir.path()), 6);
        Ok(())
    }

    #[test]
    fn test_reorder_ordered_ledger_is_untouched() -> Result<(), anyhow::Error> {
        let dir = tempfile::tempdir()?;
        let config = test_config(dir.path());
        let mut ledger = Ledger::new();
        let a = ledger.push_back(persisted(&config, &["1. a", "1. b"]));
        let b = ledger.push_back(persisted(&config, &["1. b", "1. c"]));
        assert_eq!(reorder(&mut ledger, &config)?, 0);
        assert_eq!(ledger.ids(), &[a, b]);
        Ok(())
    }

    #[test]
    fn test_engine_respects_caps() -> Result<(), anyhow::Error> {
        let dir = tempfile::tempdir()?;
        // chunk cap 4, aggregate cap 8
        let config = test_config(dir.path());
        let mut engine = Engine::new(config.clone())?;
        engine.load_initial(records(&["1. m", "1. n", "1. o", "1. p"]))?;
        let mut expected = records(&["1. m", "1. n", "1. o", "1. p"]);
        for i in 0..200 {
            let line = format!("{}. {}", i % 7, (b'a' + (i * 11 % 26) as u8) as char);
            let record = Record::parse(line.as_bytes())?;
            expected.push(record.clone());
            engine.ingest(record)?;
            assert!(engine.ledger().touched_pending() < 8);
            for chunk in engine.ledger().iter() {
                assert!(chunk.pending() < 4);
            }
        }
        engine.flush_cycle()?;
        assert!(engine.peak_pending() <= 8);
        assert!(engine.cycles() > 1);
        assert!(engine.splits() > 0);
        assert_eq!(engine.ledger().touched_pending(), 0);

        expected.sort();
        assert_eq!(all_records(engine.ledger(), &config), expected);
        assert_eq!(files_in(dir.path()), engine.ledger().len() * 2);
        Ok(())
    }

    #[test]
    fn test_initial_load_empty() -> Result<(), anyhow::Error> {
        let dir = tempfile::tempdir()?;
        let mut engine = Engine::new(test_config(dir.path()))?;
        engine.load_initial(Vec::new())?;
        assert!(engine.ledger().is_empty());
        engine.flush_cycle()?;
        assert_eq!(engine.cycles(), 0);
        Ok(())
    }
}
