//! Common error types shared across crates.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level engine error type.
///
/// Variants map to the coarse [`ErrorKind`] callers branch on:
/// - [`EngineError::KeyDerivation`] → [`ErrorKind::KeyDerivation`]
/// - [`EngineError::Cipher`] → [`ErrorKind::Cipher`]
/// - [`EngineError::Schema`] → [`ErrorKind::Schema`]
/// - [`EngineError::Rows`] → [`ErrorKind::Authentication`] when every failed row
///   failed authentication, [`ErrorKind::RowFailure`] otherwise
#[derive(Debug, Error)]
pub enum EngineError {
    /// The password or salt could not be turned into a key.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// An internal cryptographic failure. Not expected for valid inputs.
    #[error("cipher failure: {0}")]
    Cipher(String),

    /// Columns were missing, mismatched in length, or of an unsupported type.
    #[error("schema error: {0}")]
    Schema(String),

    /// One or more rows failed; no values were returned for the batch.
    #[error(transparent)]
    Rows(#[from] RowFailures),

    /// The engine configuration is invalid.
    #[error("configuration invalid: {0}")]
    Config(String),

    /// The source of a deferred plan failed to produce a table.
    #[error("plan execution failed: {0}")]
    Plan(String),
}

/// Coarse classification of an [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    KeyDerivation,
    Cipher,
    Authentication,
    Schema,
    RowFailure,
    Config,
    Plan,
}

impl EngineError {
    /// Returns the [`ErrorKind`] for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::KeyDerivation(_) => ErrorKind::KeyDerivation,
            EngineError::Cipher(_) => ErrorKind::Cipher,
            EngineError::Schema(_) => ErrorKind::Schema,
            EngineError::Rows(rows) if rows.all_authentication() => ErrorKind::Authentication,
            EngineError::Rows(_) => ErrorKind::RowFailure,
            EngineError::Config(_) => ErrorKind::Config,
            EngineError::Plan(_) => ErrorKind::Plan,
        }
    }

    /// Returns the aggregated row failures, if this error carries any.
    pub fn row_failures(&self) -> Option<&RowFailures> {
        match self {
            EngineError::Rows(rows) => Some(rows),
            _ => None,
        }
    }
}

/// Why a single row could not be transformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The ciphertext did not verify under the key and nonce.
    Authentication,
    /// A ciphertext cell had no matching nonce cell.
    MissingNonce,
    /// The nonce cell has the wrong length for the cipher suite.
    InvalidNonce,
    /// A text-encoded cell was not valid hex/base64.
    InvalidEncoding,
    /// The authenticated plaintext could not be decoded into a value.
    InvalidPlaintext,
    /// The decrypted value's type differs from the column's type.
    KindMismatch,
}

impl FailureReason {
    /// Short human-readable description, used for annotation columns.
    pub fn describe(&self) -> &'static str {
        match self {
            FailureReason::Authentication => "decryption failed: authentication error",
            FailureReason::MissingNonce => "nonce is missing",
            FailureReason::InvalidNonce => "nonce has invalid length",
            FailureReason::InvalidEncoding => "decoding nonce or cipher text failed",
            FailureReason::InvalidPlaintext => "decrypted bytes are not a valid value",
            FailureReason::KindMismatch => "decrypted value has unexpected type",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// A failure of one row, identified by its index in the source column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFailure {
    pub row: usize,
    pub reason: FailureReason,
}

/// All row failures of one column transform, in ascending row order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct RowFailures {
    failures: Vec<RowFailure>,
}

/// Number of row indices printed by the [`RowFailures`] display impl.
const DISPLAY_ROWS: usize = 8;

impl RowFailures {
    /// Build from failures in any order; they are sorted by row index.
    pub fn new(mut failures: Vec<RowFailure>) -> Self {
        failures.sort_by_key(|f| f.row);
        Self { failures }
    }

    pub fn failures(&self) -> &[RowFailure] {
        &self.failures
    }

    /// Indices of the failed rows, ascending.
    pub fn rows(&self) -> Vec<usize> {
        self.failures.iter().map(|f| f.row).collect()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Returns `true` if every failure is an authentication failure.
    pub fn all_authentication(&self) -> bool {
        !self.failures.is_empty()
            && self
                .failures
                .iter()
                .all(|f| f.reason == FailureReason::Authentication)
    }
}

impl fmt::Display for RowFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} row(s) failed: ", self.failures.len())?;
        for (i, failure) in self.failures.iter().take(DISPLAY_ROWS).enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "row {} ({})", failure.row, failure.reason)?;
        }
        if self.failures.len() > DISPLAY_ROWS {
            write!(f, ", ... and {} more", self.failures.len() - DISPLAY_ROWS)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(row: usize, reason: FailureReason) -> RowFailure {
        RowFailure { row, reason }
    }

    #[test]
    fn error_kinds() {
        assert_eq!(
            EngineError::KeyDerivation("x".into()).kind(),
            ErrorKind::KeyDerivation
        );
        assert_eq!(EngineError::Cipher("x".into()).kind(), ErrorKind::Cipher);
        assert_eq!(EngineError::Schema("x".into()).kind(), ErrorKind::Schema);
        assert_eq!(EngineError::Config("x".into()).kind(), ErrorKind::Config);
        assert_eq!(EngineError::Plan("x".into()).kind(), ErrorKind::Plan);
    }

    #[test]
    fn authentication_only_failures_map_to_authentication_kind() {
        let err = EngineError::from(RowFailures::new(vec![
            failure(2, FailureReason::Authentication),
            failure(0, FailureReason::Authentication),
        ]));
        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert_eq!(err.row_failures().unwrap().rows(), vec![0, 2]);
    }

    #[test]
    fn mixed_failures_map_to_row_failure_kind() {
        let err = EngineError::from(RowFailures::new(vec![
            failure(1, FailureReason::Authentication),
            failure(3, FailureReason::MissingNonce),
        ]));
        assert_eq!(err.kind(), ErrorKind::RowFailure);
    }

    #[test]
    fn empty_failures_are_not_authentication() {
        assert!(!RowFailures::new(Vec::new()).all_authentication());
    }

    #[test]
    fn display_names_rows_and_truncates() {
        let failures = (0..20)
            .map(|row| failure(row, FailureReason::Authentication))
            .collect();
        let msg = RowFailures::new(failures).to_string();
        assert!(msg.starts_with("20 row(s) failed"), "{msg}");
        assert!(msg.contains("row 7"), "{msg}");
        assert!(!msg.contains("row 8 "), "{msg}");
        assert!(msg.ends_with("and 12 more"), "{msg}");
    }

    #[test]
    fn display_includes_message() {
        let e = EngineError::Schema("column product_id not found".into());
        assert!(e.to_string().contains("product_id"));
    }
}
