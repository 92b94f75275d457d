//! Entry points over a materialised table.
//!
//! Each call derives the key, transforms the column on the calling thread's
//! behalf, and returns a new table. The input table is never modified.

use std::sync::Arc;

use arrow_array::RecordBatch;
use common::EngineError;

use crate::config::EngineConfig;
use crate::crypto::Password;
use crate::transform::{ColumnTransform, DecryptOptions, EncryptOptions, TableTransform};

/// Encrypt `column`, appending `<column>_encrypted` and `<column>_nonce`.
///
/// Uses [`EngineConfig::default`]. See [`parallel_encrypt_with`].
///
/// # Errors
///
/// - [`EngineError::Schema`] if the column is missing, has an unsupported
///   type, or an output column already exists.
/// - [`EngineError::KeyDerivation`] for an empty password.
pub fn parallel_encrypt(
    batch: &RecordBatch,
    column: &str,
    password: impl AsRef<[u8]>,
) -> Result<RecordBatch, EngineError> {
    parallel_encrypt_with(
        batch,
        column,
        password,
        &EngineConfig::default(),
        EncryptOptions::default(),
    )
}

/// [`parallel_encrypt`] with explicit configuration and per-call options.
pub fn parallel_encrypt_with(
    batch: &RecordBatch,
    column: &str,
    password: impl AsRef<[u8]>,
    config: &EngineConfig,
    options: EncryptOptions,
) -> Result<RecordBatch, EngineError> {
    ColumnTransform::encrypt(
        column,
        Password::new(password),
        Arc::new(config.clone()),
        options,
    )
    .evaluate(batch)
}

/// Decrypt `ciphertext_column` with its `nonce_column`, appending the
/// decrypted column in its original type.
///
/// Uses [`EngineConfig::default`]. See [`parallel_decrypt_with`].
///
/// # Errors
///
/// - [`EngineError::Schema`] for missing or incompatible columns.
/// - [`EngineError::KeyDerivation`] for an empty password.
/// - [`EngineError::Rows`] listing every row that failed, e.g. all rows for a
///   wrong password. No decrypted values are returned in that case.
pub fn parallel_decrypt(
    batch: &RecordBatch,
    ciphertext_column: &str,
    nonce_column: &str,
    password: impl AsRef<[u8]>,
) -> Result<RecordBatch, EngineError> {
    parallel_decrypt_with(
        batch,
        ciphertext_column,
        nonce_column,
        password,
        &EngineConfig::default(),
        DecryptOptions::default(),
    )
}

/// [`parallel_decrypt`] with explicit configuration and per-call options.
pub fn parallel_decrypt_with(
    batch: &RecordBatch,
    ciphertext_column: &str,
    nonce_column: &str,
    password: impl AsRef<[u8]>,
    config: &EngineConfig,
    options: DecryptOptions,
) -> Result<RecordBatch, EngineError> {
    ColumnTransform::decrypt(
        ciphertext_column,
        nonce_column,
        Password::new(password),
        Arc::new(config.clone()),
        options,
    )
    .evaluate(batch)
}
