/// Errors raised while reading host statistics.
///
/// # Examples
///
/// ```rust
/// use nodewatch_collector::error::CollectorError;
///
/// let err = CollectorError::UnknownDisk("/data9".into());
/// assert_eq!(err.to_string(), "No mounted filesystem at /data9");
/// ```
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("Stat source I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A kernel statistics line did not have the expected shape.
    #[error("Malformed stats line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("No mounted filesystem at {0}")]
    UnknownDisk(String),
}

pub type Result<T> = std::result::Result<T, CollectorError>;
