use std::collections::HashMap;

use arrow_array::RecordBatch;
use arrow_schema::Field;
use common::protocol::{
    encrypted_column_name, nonce_column_name, META_CIPHER, META_ENCODING, META_SOURCE_TYPE,
};
use common::EngineError;
use tracing::{info, info_span};
use zeroize::Zeroizing;

use super::{append_columns, ensure_absent, find_column, EncryptOptions};
use crate::column::{ColumnCodec, EncryptedCell, PlaintextColumn};
use crate::config::EngineConfig;
use crate::crypto::{CipherEngine, CipherError, Nonce, NonceGenerator, NonceStream, Password};

/// Encrypt `column` into `<column>_encrypted` and `<column>_nonce`.
pub(super) fn encrypt_column(
    batch: &RecordBatch,
    column: &str,
    password: &Password,
    config: &EngineConfig,
    options: &EncryptOptions,
) -> Result<RecordBatch, EngineError> {
    let span = info_span!("encrypt_column", column, rows = batch.num_rows());
    let _enter = span.enter();

    let schema = batch.schema();
    let (index, field) = find_column(&schema, column)?;
    let source = PlaintextColumn::new(batch.column(index).as_ref()).ok_or_else(|| {
        EngineError::Schema(format!(
            "column '{column}' has type {}, which cannot be encrypted",
            field.data_type()
        ))
    })?;
    let ciphertext_name = encrypted_column_name(column);
    let nonce_name = nonce_column_name(column);
    ensure_absent(&schema, &ciphertext_name)?;
    ensure_absent(&schema, &nonce_name)?;

    let suite = config.cipher_suite;
    let nonces = match &options.nonce_prefix {
        Some(prefix) => {
            require_call_salt(options, config)?;
            NonceGenerator::with_prefix(suite, prefix)?
        }
        None => NonceGenerator::new(suite, config.nonce_strategy),
    };
    let key = config
        .key_derivation()
        .derive(password.as_bytes(), options.salt.as_deref())?;
    let cipher = CipherEngine::new(suite, &key)?;
    drop(key);

    let outcome = config.scheduler().run(
        source.len(),
        |first_row| nonces.stream(first_row),
        |stream, row| {
            seal_cell(stream, source.cell(row), |nonce, plaintext| {
                cipher.encrypt(nonce, plaintext)
            })
        },
    )?;
    if let Some((row, e)) = outcome.failures.into_iter().next() {
        return Err(EngineError::Cipher(format!("row {row}: {e}")));
    }

    let codec = ColumnCodec::new(config.cell_encoding);
    let (ciphertexts, nonce_array) = codec.encode(&outcome.values);
    let metadata = HashMap::from([
        (META_SOURCE_TYPE.to_string(), source.kind().name().to_string()),
        (META_CIPHER.to_string(), suite.name().to_string()),
        (META_ENCODING.to_string(), codec.encoding().name().to_string()),
    ]);
    let ciphertext_field =
        Field::new(&ciphertext_name, codec.data_type(), true).with_metadata(metadata);
    let nonce_field = Field::new(&nonce_name, codec.data_type(), true);

    info!(
        nulls = ciphertexts.null_count(),
        cipher = suite.name(),
        encoding = codec.encoding().name(),
        "column encrypted"
    );
    append_columns(
        batch,
        vec![(ciphertext_field, ciphertexts), (nonce_field, nonce_array)],
    )
}

/// A pinned nonce prefix repeats the same nonces on every call, so the key
/// must be unique to the call: it needs its own salt, distinct from the
/// configured one.
fn require_call_salt(options: &EncryptOptions, config: &EngineConfig) -> Result<(), EngineError> {
    match options.salt.as_deref() {
        Some(salt) if salt != config.salt.as_bytes() => Ok(()),
        Some(_) => Err(EngineError::Config(
            "a pinned nonce prefix needs a per-call salt different from the configured salt".into(),
        )),
        None => Err(EngineError::Config(
            "a pinned nonce prefix needs a per-call salt".into(),
        )),
    }
}

/// Encrypt one cell. Null cells advance the stream without touching `seal`.
fn seal_cell<F>(
    stream: &mut NonceStream<'_>,
    cell: Option<Zeroizing<Vec<u8>>>,
    seal: F,
) -> Result<Option<EncryptedCell>, CipherError>
where
    F: FnOnce(&Nonce, &[u8]) -> Result<Vec<u8>, CipherError>,
{
    let Some(plaintext) = cell else {
        stream.skip();
        return Ok(None);
    };
    let nonce = stream.next();
    seal(&nonce, plaintext.as_slice()).map(|ciphertext| Some(EncryptedCell { ciphertext, nonce }))
}
