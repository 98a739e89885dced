//! Error kinds raised by the per-read analyses.
//!
//! None of these are fatal to a batch: callers log the offending read and move on.

use thiserror::Error;

pub type ReadResult<T> = std::result::Result<T, ReadError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    /// Malformed compact CIGAR text or an operation outside the supported set
    #[error("Invalid CIGAR '{cigar}': {reason}")]
    Format {
        /// The offending CIGAR text (or operation)
        cigar: String,
        /// Explanation of the problem
        reason: String,
    },

    /// Edit operations, read length and coordinates disagree with each other
    #[error("Inconsistent read '{read_id}': {reason}")]
    InconsistentInput {
        /// Identifier of the read being analyzed
        read_id: String,
        /// Explanation of the mismatch
        reason: String,
    },
}

impl ReadError {
    pub fn format(cigar: impl Into<String>, reason: impl Into<String>) -> Self {
        ReadError::Format {
            cigar: cigar.into(),
            reason: reason.into(),
        }
    }

    pub fn inconsistent(read_id: impl Into<String>, reason: impl Into<String>) -> Self {
        ReadError::InconsistentInput {
            read_id: read_id.into(),
            reason: reason.into(),
        }
    }
}
