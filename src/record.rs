use std::cmp::Ordering;

use anyhow::anyhow;

pub(crate) const SEPARATOR: &[u8] = b". ";

/// A `<tag>. <key>` line split into its two sort fields.
///
/// Both fields are kept as raw bytes and compared byte-wise. The tag is the number part of the
/// line but it is never parsed, so "10" sorts before "2".
///
/// # Examples
/// ```
/// use large_file_sort::record::Record;
///
/// let apple = Record::parse(b"5. Apple").unwrap();
/// let banana = Record::parse(b"30. Banana").unwrap();
/// assert!(apple < banana);
/// assert_eq!(apple.line(), b"5. Apple".to_vec());
/// ```
#[derive(Clone, Debug)]
pub struct Record {
    key: Vec<u8>,
    tag: Vec<u8>,
}

impl Record {
    pub(crate) fn new(key: Vec<u8>, tag: Vec<u8>) -> Record {
        Record {
            key,
            tag,
        }
    }

    /// The record produced for empty and whitespace only lines. Sorts before every other record.
    pub fn blank() -> Record {
        Record::new(Vec::new(), Vec::new())
    }

    /// Parse a line without its terminator.
    ///
    /// The line is split at the first `". "`. Empty and whitespace only lines produce
    /// [Record::blank]. A line without the separator, or with nothing before it, is an error.
    pub fn parse(line: &[u8]) -> Result<Record, anyhow::Error> {
        if line.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Record::blank());
        }

        match line.windows(SEPARATOR.len()).position(|w| w == SEPARATOR) {
            Some(0) => {
                Err(anyhow!("missing number before '. ', line: {}", String::from_utf8_lossy(line)))
            }
            Some(index) => {
                Ok(
                    Record::new(
                        line[index + SEPARATOR.len()..].to_vec(),
                        line[..index].to_vec(),
                    )
                )
            }
            None => {
                Err(anyhow!("missing '. ' separator, line: {}", String::from_utf8_lossy(line)))
            }
        }
    }

    /// The string part
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// The number part, as text
    pub fn tag(&self) -> &[u8] {
        &self.tag
    }

    pub fn is_blank(&self) -> bool {
        self.key.is_empty() && self.tag.is_empty()
    }

    /// Render the record back to its line form, without a terminator.
    pub fn line(&self) -> Vec<u8> {
        if self.is_blank() {
            return Vec::new();
        }
        let mut line = Vec::with_capacity(self.tag.len() + SEPARATOR.len() + self.key.len());
        line.extend_from_slice(&self.tag);
        line.extend_from_slice(SEPARATOR);
        line.extend_from_slice(&self.key);
        line
    }
}

impl Eq for Record {}

impl PartialEq<Self> for Record {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.tag == other.tag
    }
}

impl PartialOrd<Self> for Record {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Record {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.key.cmp(&other.key) {
            Ordering::Equal => {
                self.tag.cmp(&other.tag)
            }
            ordering => {
                ordering
            }
        }
    }
}
