//! This crate sorts text files of `<number>. <string>` lines that are far larger than the available
//! memory.
//!
//! Lines are ordered by the string part and then by the number part. Both parts are compared byte
//! by byte, so upper case letters come before lower case ones and the number part is never parsed:
//! "10. cat" sorts before "2. cat".
//!
//! The input is read once. The first block is sorted in memory and becomes the first chunk. Every
//! following line is routed to the chunk whose range covers it, or to a new chunk at the end.
//! When the pending buffers reach their memory caps the touched chunks are sorted and written to
//! disk, as two column files each, splitting chunks that were already on disk in two. Finally the
//! chunks are written out in order. Peak memory is bounded by the caps, not by the input size.
//!
//! # Examples
//! ```
//! use std::path::PathBuf;
//! use large_file_sort::sort::Sort;
//!
//! fn sort_lines(input: PathBuf, output: PathBuf, tmp: PathBuf) -> Result<(), anyhow::Error> {
//!     let mut sort = Sort::new(input, output);
//!
//!     // set number of CPU cores used to flush chunks. The default is to use all available cores.
//!     sort.with_tasks(2);
//!
//!     // set the directory for intermediate results. The default is the directory of the input
//!     // file; it needs free space of three times the input size.
//!     sort.with_tmp_dir(tmp);
//!
//!     let report = sort.sort_with_report()?;
//!     if !report.integrity_ok() {
//!         log::warn!("output differs from input: {:?} / {:?}", report.input(), report.output());
//!     }
//!     Ok(())
//! }
//! ```
//!

pub(crate) mod config;
pub(crate) mod line_reader;
pub(crate) mod scanner;
pub(crate) mod chunk;
pub(crate) mod ledger;
pub(crate) mod router;
pub(crate) mod flush;

pub mod record;
pub mod scan_policy;
pub mod merge;
pub mod check;
pub mod generate;
pub mod perftest;
pub mod sort;
