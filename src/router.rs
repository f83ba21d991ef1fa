use std::cmp::Ordering;

use anyhow::anyhow;

use crate::chunk::Chunk;
use crate::ledger::{ChunkId, Ledger};
use crate::record::Record;

/// Where a record goes
#[derive(Debug, Eq, PartialEq)]
pub(crate) enum Placement {
    /// Into the chunk, becoming its new lower bound
    Lower(ChunkId),
    /// Into the chunk, bounds unchanged
    Inside(ChunkId),
    /// Into the chunk, becoming its new upper bound
    Upper(ChunkId),
    /// Into a new chunk appended after the last one
    NewTail,
}

/// Scan the ledger from the head for the first chunk that accepts `record`.
///
/// Bounds of chunks that were not flushed yet still move, so the scan is linear rather than a
/// binary search over the bounds.
pub(crate) fn place(ledger: &Ledger, record: &Record) -> Result<Placement, anyhow::Error> {
    for id in ledger.ids() {
        let chunk = ledger.chunk(*id)?;
        let to_lower = record.cmp(chunk.lower());
        let to_upper = record.cmp(chunk.upper());
        match (to_lower, to_upper) {
            (Ordering::Less | Ordering::Equal, Ordering::Less) => {
                return Ok(Placement::Lower(*id));
            }
            (Ordering::Greater, Ordering::Less) | (Ordering::Equal, Ordering::Equal) => {
                return Ok(Placement::Inside(*id));
            }
            (Ordering::Greater, Ordering::Equal) => {
                return Ok(Placement::Upper(*id));
            }
            (Ordering::Greater, Ordering::Greater) => {
                continue;
            }
            _ => {
                return Err(
                    anyhow!(
                        "chunk {:?} has a lower bound above its upper bound: {:?} > {:?}",
                        id,
                        chunk.lower(),
                        chunk.upper()
                    )
                );
            }
        }
    }
    Ok(Placement::NewTail)
}

/// Add `record` to the pending buffer of exactly one chunk and mark that chunk touched.
pub(crate) fn route(ledger: &mut Ledger, record: Record) -> Result<ChunkId, anyhow::Error> {
    let id = match place(ledger, &record)? {
        Placement::Lower(id) => {
            ledger.chunk_mut(id)?.absorb_lower(record);
            id
        }
        Placement::Inside(id) => {
            ledger.chunk_mut(id)?.absorb(record);
            id
        }
        Placement::Upper(id) => {
            ledger.chunk_mut(id)?.absorb_upper(record);
            id
        }
        Placement::NewTail => {
            ledger.push_back(Chunk::seeded(record))
        }
    };
    ledger.touch(id);
    Ok(id)
}

#[cfg(test)]
mod tests {
    use rand::Rng;

    use crate::chunk::Chunk;
    use crate::ledger::Ledger;
    use crate::record::Record;
    use crate::router::{place, route, Placement};

    fn record(line: &str) -> Record {
        Record::parse(line.as_bytes()).unwrap()
    }

    fn ranged(lower: &str, upper: &str) -> Chunk {
        let mut chunk = Chunk::seeded(record(lower));
        chunk.absorb_upper(record(upper));
        chunk
    }

    #[test]
    fn test_placements() -> Result<(), anyhow::Error> {
        let mut ledger = Ledger::new();
        let first = ledger.push_back(ranged("1. d", "1. f"));
        let second = ledger.push_back(ranged("1. m", "1. p"));

        assert_eq!(place(&ledger, &record("1. a"))?, Placement::Lower(first));
        assert_eq!(place(&ledger, &record("1. d"))?, Placement::Lower(first));
        assert_eq!(place(&ledger, &record("1. e"))?, Placement::Inside(first));
        assert_eq!(place(&ledger, &record("1. f"))?, Placement::Upper(first));
        assert_eq!(place(&ledger, &record("1. g"))?, Placement::Lower(second));
        assert_eq!(place(&ledger, &record("1. n"))?, Placement::Inside(second));
        assert_eq!(place(&ledger, &record("1. p"))?, Placement::Upper(second));
        assert_eq!(place(&ledger, &record("1. q"))?, Placement::NewTail);
        Ok(())
    }

    #[test]
    fn test_duplicate_of_single_valued_tail() -> Result<(), anyhow::Error> {
        let mut ledger = Ledger::new();
        let only = ledger.push_back(Chunk::seeded(record("7. same")));
        assert_eq!(place(&ledger, &record("7. same"))?, Placement::Inside(only));
        route(&mut ledger, record("7. same"))?;
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.records(), 2);
        Ok(())
    }

    #[test]
    fn test_empty_ledger_gets_tail() -> Result<(), anyhow::Error> {
        let mut ledger = Ledger::new();
        let id = route(&mut ledger, record("1. a"))?;
        assert_eq!(ledger.ids(), &[id]);
        assert_eq!(ledger.touched(), vec![id]);
        Ok(())
    }

    #[test]
    fn test_route_updates_bounds() -> Result<(), anyhow::Error> {
        let mut ledger = Ledger::new();
        let id = ledger.push_back(ranged("1. d", "1. f"));
        route(&mut ledger, record("1. b"))?;
        route(&mut ledger, record("1. e"))?;
        route(&mut ledger, record("2. f"))?;
        let chunk = ledger.chunk(id)?;
        assert_eq!(chunk.lower(), &record("1. b"));
        assert_eq!(chunk.upper(), &record("1. f"));
        assert_eq!(chunk.pending(), 4);
        // "2. f" is beyond the upper bound "1. f" and opens a new tail
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.touched_pending(), 3);
        Ok(())
    }

    #[test]
    fn test_no_record_dropped() -> Result<(), anyhow::Error> {
        let mut rng = rand::thread_rng();
        let mut ledger = Ledger::new();
        ledger.push_back(ranged("1. k", "1. m"));
        ledger.push_back(ranged("1. t", "1. v"));
        let initial = ledger.records();
        let n = 5_000;
        for _ in 0..n {
            let key: String = (0..rng.gen_range(0..3))
                .map(|_| rng.gen_range(b'a'..=b'z') as char)
                .collect();
            let line = format!("{}. {}", rng.gen_range(0..5), key);
            route(&mut ledger, record(&line))?;
        }
        assert_eq!(ledger.records(), initial + n);
        assert_eq!(ledger.touched_pending(), n);
        let chunks: Vec<&Chunk> = ledger.iter().collect();
        for pair in chunks.windows(2) {
            assert!(pair[0].upper() <= pair[1].lower());
        }
        Ok(())
    }
}
