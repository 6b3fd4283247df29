//! Error taxonomy for the Strider workspace
//!
//! Every failure is surfaced immediately at the offending call and carries a
//! one-line message plus a stable numeric code. Partial results are never
//! returned; in-place operations that fail leave their input unchanged.

use thiserror::Error;

/// Workspace-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All failure kinds the engine can produce.
#[derive(Debug, Error)]
pub enum Error {
    /// Broadcast, reshape or join mismatch.
    #[error("shape error: {0}")]
    Shape(String),

    /// Unsupported dtype for an operation or device.
    #[error("type error: {0}")]
    Type(String),

    /// Selector or integer index out of range, or a malformed selector.
    #[error("index error: {0}")]
    Index(String),

    /// Invalid parameter value.
    #[error("argument error: {0}")]
    Arg(String),

    /// Backend failure or out-of-memory condition.
    #[error("device error: {0}")]
    Device(String),

    /// Matrix is not positive definite; `rank` is the leading minor that
    /// failed.
    #[error("cholesky decomposition failed at rank {rank}")]
    Cholesky { rank: usize },

    /// FFT plan creation failure or unsupported transform shape.
    #[error("fft error: {0}")]
    Fft(String),
}

impl Error {
    /// Stable categorical code, usable by binding layers that map errors to
    /// a host-language convention.
    pub fn code(&self) -> u32 {
        match self {
            Error::Shape(_) => 101,
            Error::Type(_) => 102,
            Error::Index(_) => 103,
            Error::Arg(_) => 104,
            Error::Device(_) => 105,
            Error::Cholesky { .. } => 106,
            Error::Fft(_) => 107,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(Error::Shape("x".into()).code(), 101);
        assert_eq!(Error::Cholesky { rank: 3 }.code(), 106);
    }

    #[test]
    fn messages_are_one_line() {
        let e = Error::Arg("n must be at least 1".into());
        assert!(!e.to_string().contains('\n'));
    }
}
