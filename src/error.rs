//! Error types for the DashQL analyzer.
//!
//! # Error handling strategy
//!
//! - [`AnalyzerError`]: the Status layer. Returned as `Result<T, AnalyzerError>` from every
//!   public analyzer operation; a non-`Ok` result means the operation produced nothing and
//!   left prior state untouched.
//! - [`crate::instance::NodeError`] and [`crate::linter::LinterMessage`]: non-fatal diagnostics
//!   accumulated on a [`crate::instance::ProgramInstance`] during analysis. They never cause an
//!   operation to fail; a faulty subtree is simply left unevaluated.
//!
//! This separation lets instantiation stay resilient: a handful of bad function calls or
//! missing DSON options should not prevent the rest of the program from analyzing.

use std::fmt;

/// Error returned by a public analyzer operation (§7 "Status" layer).
#[derive(Debug, Clone, thiserror::Error)]
pub enum AnalyzerError {
    /// Input was structurally invalid (bad statement shape, unrenderable edit, ...).
    #[error("invalid input: {0}")]
    Invalid(String),
    /// The requested operation is recognized but not implemented by this core.
    #[error("not implemented: {0}")]
    NotImplemented(String),
    /// Execution of an otherwise well-formed operation failed.
    #[error("execution error: {0}")]
    ExecutionError(String),
    /// Failure reading or writing external state (e.g. a `ProgramReplacement` source).
    #[error("io error: {0}")]
    IoError(String),
}

impl AnalyzerError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::NotImplemented(message.into())
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::ExecutionError(message.into())
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::IoError(message.into())
    }

    /// The numeric status code carried by a [`crate::response::Response`] (§6.1).
    ///
    /// `0` is reserved for success and is never returned here.
    pub fn status_code(&self) -> u32 {
        match self {
            AnalyzerError::Invalid(_) => 1,
            AnalyzerError::NotImplemented(_) => 2,
            AnalyzerError::ExecutionError(_) => 3,
            AnalyzerError::IoError(_) => 4,
        }
    }
}

impl From<std::io::Error> for AnalyzerError {
    fn from(err: std::io::Error) -> Self {
        AnalyzerError::IoError(err.to_string())
    }
}

/// A statement or node-id reference that turned out to be out of range.
///
/// A handful of internal lookups (task ids, node ids recovered from a stale diff) return this
/// before being converted into an [`AnalyzerError`] at the public boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfRange {
    pub index: usize,
    pub len: usize,
}

impl fmt::Display for OutOfRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "index {} out of range (len {})", self.index, self.len)
    }
}

impl std::error::Error for OutOfRange {}

impl From<OutOfRange> for AnalyzerError {
    fn from(err: OutOfRange) -> Self {
        AnalyzerError::Invalid(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_are_distinct_and_nonzero() {
        let errs = [
            AnalyzerError::invalid("x"),
            AnalyzerError::not_implemented("x"),
            AnalyzerError::execution("x"),
            AnalyzerError::io("x"),
        ];
        let codes: Vec<u32> = errs.iter().map(AnalyzerError::status_code).collect();
        assert!(codes.iter().all(|c| *c != 0));
        let mut sorted = codes.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), codes.len());
    }

    #[test]
    fn test_display_messages() {
        let err = AnalyzerError::invalid("bad statement");
        assert_eq!(err.to_string(), "invalid input: bad statement");
    }

    #[test]
    fn test_out_of_range_display() {
        let err = OutOfRange { index: 5, len: 3 };
        assert_eq!(err.to_string(), "index 5 out of range (len 3)");
        let wrapped: AnalyzerError = err.into();
        assert!(matches!(wrapped, AnalyzerError::Invalid(_)));
    }
}
