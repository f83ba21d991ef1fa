use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{anyhow, Context};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::record::Record;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ -";
const MIN_KEY_LENGTH: usize = 10;
const MAX_KEY_LENGTH: usize = 30;
const MAX_TAG: u32 = 50_000;

/// Writes a test file of `<number>. <string>` lines.
///
/// Nine tenths of the requested size are random lines; the last tenth repeats a single string
/// with random numbers, so the file always contains duplicate keys.
///
/// # Examples
/// ```
/// use large_file_sort::generate::Generator;
///
/// let dir = tempfile::tempdir().unwrap();
/// let path = dir.path().join("input.txt");
/// let lines = Generator::new(path.clone(), 4096).with_seed(7).generate().unwrap();
/// assert!(lines > 0);
/// assert!(path.metadata().unwrap().len() >= 4096);
/// ```
pub struct Generator {
    path: PathBuf,
    target_bytes: u64,
    seed: Option<u64>,
}

impl Generator {
    pub fn new(path: PathBuf, target_bytes: u64) -> Generator {
        Generator {
            path,
            target_bytes,
            seed: None,
        }
    }

    /// Produce the same file for the same seed
    pub fn with_seed(mut self, seed: u64) -> Generator {
        self.seed = Some(seed);
        self
    }

    /// Write the file, returning the number of lines written
    pub fn generate(&self) -> Result<u64, anyhow::Error> {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        log::info!("Generating {} with {} bytes", self.path.display(), self.target_bytes);
        let file = File::create(&self.path)
            .with_context(|| anyhow!("path: {}", self.path.display()))?;
        let mut writer = BufWriter::new(file);

        let standard_bytes = self.target_bytes / 10 * 9;
        let mut bytes: u64 = 0;
        let mut lines: u64 = 0;
        while bytes < standard_bytes {
            let key = Self::key(&mut rng);
            bytes += self.write_line(&mut writer, &mut rng, &key)?;
            lines += 1;
        }

        let duplicate = Self::key(&mut rng);
        log::info!("Duplicated string: {}", String::from_utf8_lossy(&duplicate));
        while bytes < self.target_bytes {
            bytes += self.write_line(&mut writer, &mut rng, &duplicate)?;
            lines += 1;
        }

        writer.flush().with_context(|| anyhow!("path: {}", self.path.display()))?;
        log::info!("Generated {}, lines: {}, bytes: {}", self.path.display(), lines, bytes);
        Ok(lines)
    }

    fn key(rng: &mut StdRng) -> Vec<u8> {
        let length = rng.gen_range(MIN_KEY_LENGTH..MAX_KEY_LENGTH);
        (0..length)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())])
            .collect()
    }

    fn tag(rng: &mut StdRng) -> Vec<u8> {
        rng.gen_range(1..MAX_TAG).to_string().into_bytes()
    }

    /// A record shaped like the lines of a generated file
    pub(crate) fn random_record(rng: &mut StdRng) -> Record {
        Record::new(Self::key(rng), Self::tag(rng))
    }

    fn write_line(&self, writer: &mut BufWriter<File>, rng: &mut StdRng, key: &[u8]) -> Result<u64, anyhow::Error> {
        let tag = Self::tag(rng);
        writer.write_all(&tag)
            .and_then(|_| writer.write_all(b". "))
            .and_then(|_| writer.write_all(key))
            .and_then(|_| writer.write_all(b"\n"))
            .with_context(|| anyhow!("path: {}", self.path.display()))?;
        Ok((tag.len() + 2 + key.len() + 1) as u64)
    }
}
