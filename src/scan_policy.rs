/// What to do with an input line that cannot be parsed into a record
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScanPolicy {
    /// Log the line with its position, leave it out of the output and continue
    Skip,
    /// Abort the run
    Fail,
}
