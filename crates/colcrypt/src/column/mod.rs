//! Arrow column handling: plaintext cell encoding and the ciphertext/nonce
//! column codec.
//!
//! # Module invariants
//!
//! - **No crypto.** This module shapes bytes into and out of Arrow arrays; it
//!   never encrypts, decrypts, or sees key material.
//! - Source arrays are only read. Every output is a freshly built array.

pub mod codec;
pub mod value;

pub use codec::{ColumnCodec, EncryptedCell, EncryptedColumns};
pub use value::{DecodedCell, PlaintextColumn, ValueKind};
