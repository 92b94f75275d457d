//! `colcrypt`: chunk-parallel column encryption for Arrow tables.
//!
//! One column of a [`RecordBatch`](arrow_array::RecordBatch) is encrypted
//! row by row into a ciphertext column and a nonce column, and later restored
//! in its original type given the same password.
//!
//! Two entry points share one transform:
//! - [`parallel_encrypt`] / [`parallel_decrypt`] run immediately on a
//!   materialised table.
//! - [`lazy_parallel_encrypt`] / [`lazy_parallel_decrypt`] append a node to a
//!   [`LazyTable`] that runs on [`LazyTable::collect`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use arrow_array::{ArrayRef, RecordBatch, StringArray};
//!
//! let table = RecordBatch::try_from_iter(vec![(
//!     "product_id",
//!     Arc::new(StringArray::from(vec!["A1", "A2", "A3"])) as ArrayRef,
//! )])?;
//! let encrypted = colcrypt::parallel_encrypt(&table, "product_id", "test")?;
//! let decrypted = colcrypt::parallel_decrypt(
//!     &encrypted,
//!     "product_id_encrypted",
//!     "product_id_nonce",
//!     "test",
//! )?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod column;
pub mod config;
pub mod crypto;
pub mod eager;
pub mod lazy;
pub mod scheduler;
pub mod telemetry;
pub mod transform;

pub use common::{
    CellEncoding, CipherSuite, EngineError, ErrorKind, FailurePolicy, FailureReason,
    NonceStrategy, RowFailure, RowFailures, TransformKind,
};
pub use config::EngineConfig;
pub use eager::{parallel_decrypt, parallel_decrypt_with, parallel_encrypt, parallel_encrypt_with};
pub use lazy::{
    lazy_parallel_decrypt, lazy_parallel_decrypt_with, lazy_parallel_encrypt,
    lazy_parallel_encrypt_with, IntoLazy, LazyTable, MemorySource, TableSource,
};
pub use transform::{ColumnTransform, DecryptOptions, EncryptOptions, TableTransform};
