//! Key derivation, nonce generation, and per-value AEAD.
//!
//! This module knows nothing about Arrow or scheduling. It provides the
//! primitives the column transforms apply row by row.
//!
//! # Key handling
//!
//! - A [`DerivedKey`] lives for one column transform and is zeroed on drop.
//! - The keyed [`CipherEngine`] erases its key schedule on drop for both
//!   suites.
//! - Key material is never logged, serialised, or included in span fields.

pub mod cipher;
pub mod kdf;
pub mod nonce;

pub use cipher::{CipherEngine, CipherError};
pub use kdf::{DerivedKey, KdfParams, KeyDerivation, KeyDerivationError, Password, KEY_LEN};
pub use nonce::{Nonce, NonceGenerator, NonceStream};
