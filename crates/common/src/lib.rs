//! Common types, protocol definitions, and errors shared across `colcrypt` crates.

pub mod error;
pub mod protocol;

pub use error::{EngineError, ErrorKind, FailureReason, RowFailure, RowFailures};
pub use protocol::{CellEncoding, CipherSuite, FailurePolicy, NonceStrategy, TransformKind};
