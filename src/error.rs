use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("input is missing required columns: {}", .missing.join(", "))]
    Schema { missing: Vec<String> },
    #[error("failed to read input, reason: `{0}`")]
    ReadFailure(String),
    #[error("failed to write export, reason: `{0}`")]
    WriteFailure(String),
    #[error("invalid filter criteria: {0}")]
    InvalidCriteria(String),
}

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        Error::ReadFailure(e.to_string())
    }
}

/// Reasons a single input row is rejected during loading.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowError {
    #[error("required field `{0}` is empty")]
    MissingField(&'static str),
    #[error("unparseable timestamp `{0}`")]
    InvalidTimestamp(String),
    #[error("unparseable amount `{0}`")]
    InvalidAmount(String),
    #[error("negative amount `{0}`")]
    NegativeAmount(String),
    #[error("amount `{0}` exceeds the supported maximum")]
    AmountOutOfRange(String),
    #[error("malformed row, reason: `{0}`")]
    Malformed(String),
}

/// A skipped row. Non-fatal: the loader keeps going and reports these
/// alongside the loaded table.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("row {line} skipped: {reason}")]
pub struct RowParseWarning {
    /// 1-based line number in the source, header included.
    pub line: u64,
    pub reason: RowError,
}
