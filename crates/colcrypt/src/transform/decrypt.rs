use std::sync::Arc;

use arrow_array::{ArrayRef, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};
use common::protocol::{
    decrypted_column_name, decryption_errors_column_name, source_column_name, META_CIPHER,
    META_ENCODING, META_SOURCE_TYPE,
};
use common::{
    CellEncoding, CipherSuite, EngineError, FailurePolicy, FailureReason, RowFailure, RowFailures,
};
use tracing::{info, info_span, warn};

use super::{append_columns, ensure_absent, find_column, DecryptOptions};
use crate::column::value::build_array;
use crate::column::{ColumnCodec, DecodedCell, EncryptedColumns, ValueKind};
use crate::config::EngineConfig;
use crate::crypto::{CipherEngine, CipherError, Password};

/// Decrypt a ciphertext/nonce column pair into a column of the original type.
pub(super) fn decrypt_column(
    batch: &RecordBatch,
    ciphertext_column: &str,
    nonce_column: &str,
    password: &Password,
    config: &EngineConfig,
    options: &DecryptOptions,
) -> Result<RecordBatch, EngineError> {
    let span = info_span!(
        "decrypt_column",
        column = ciphertext_column,
        nonce_column,
        rows = batch.num_rows()
    );
    let _enter = span.enter();

    let schema = batch.schema();
    let (ciphertext_index, ciphertext_field) = find_column(&schema, ciphertext_column)?;
    let (nonce_index, _) = find_column(&schema, nonce_column)?;
    let ColumnMetadata {
        suite,
        encoding,
        kind,
    } = ColumnMetadata::read(ciphertext_field, config)?;

    let output_name =
        decrypted_output_name(&schema, ciphertext_column, options.output_column.as_deref())?;
    let errors_name = match options.failure_policy {
        FailurePolicy::Fail => None,
        FailurePolicy::Annotate => {
            let name = decryption_errors_column_name(ciphertext_column);
            ensure_absent(&schema, &name)?;
            if name == output_name {
                return Err(EngineError::Schema(format!(
                    "output column '{name}' already exists"
                )));
            }
            Some(name)
        }
    };
    let columns = ColumnCodec::new(encoding).decode(
        batch.column(ciphertext_index).as_ref(),
        batch.column(nonce_index).as_ref(),
    )?;

    let key = config
        .key_derivation()
        .derive(password.as_bytes(), options.salt.as_deref())?;
    let cipher = CipherEngine::new(suite, &key)?;
    drop(key);

    let outcome = config.scheduler().run(
        batch.num_rows(),
        |_| (),
        |_, row| decrypt_row(&columns, &cipher, row),
    )?;

    let mut values = outcome.values;
    let mut failures: Vec<RowFailure> = outcome
        .failures
        .into_iter()
        .map(|(row, reason)| RowFailure { row, reason })
        .collect();

    // Without recorded metadata the first decrypted value fixes the column type.
    let kind = kind
        .or_else(|| values.iter().flatten().map(|cell| cell.kind).next())
        .unwrap_or(ValueKind::Utf8);
    for (row, value) in values.iter_mut().enumerate() {
        if value.as_ref().is_some_and(|cell| cell.kind != kind) {
            *value = None;
            failures.push(RowFailure {
                row,
                reason: FailureReason::KindMismatch,
            });
        }
    }
    let failures = RowFailures::new(failures);

    let mut appended = Vec::with_capacity(2);
    match errors_name {
        None if !failures.is_empty() => {
            warn!(failed_rows = failures.len(), "column decryption failed");
            return Err(failures.into());
        }
        None => {}
        Some(name) => {
            if !failures.is_empty() {
                warn!(
                    failed_rows = failures.len(),
                    "column decryption failed for some rows; annotating"
                );
            }
            let errors = annotate(batch.num_rows(), &failures);
            appended.push((Field::new(&name, DataType::Utf8, true), errors));
        }
    }

    let decrypted = build_array(kind, &values);
    appended.insert(0, (Field::new(&output_name, kind.data_type(), true), decrypted));
    info!(
        output = %output_name,
        kind = kind.name(),
        failed_rows = failures.len(),
        "column decrypted"
    );
    append_columns(batch, appended)
}

fn decrypt_row(
    columns: &EncryptedColumns<'_>,
    cipher: &CipherEngine,
    row: usize,
) -> Result<Option<DecodedCell>, FailureReason> {
    let Some((ciphertext, nonce)) = columns.row(row)? else {
        return Ok(None);
    };
    let plaintext = cipher.decrypt(&nonce, &ciphertext).map_err(|e| match e {
        CipherError::InvalidNonceLength { .. } => FailureReason::InvalidNonce,
        _ => FailureReason::Authentication,
    })?;
    DecodedCell::parse(&plaintext).map(Some)
}

/// Utf8 column holding the failure reason for failed rows, null elsewhere.
fn annotate(rows: usize, failures: &RowFailures) -> ArrayRef {
    let mut reasons: Vec<Option<&str>> = vec![None; rows];
    for failure in failures.failures() {
        reasons[failure.row] = Some(failure.reason.describe());
    }
    Arc::new(StringArray::from(reasons))
}

/// Cipher suite, cell encoding, and source type of a ciphertext column.
struct ColumnMetadata {
    suite: CipherSuite,
    encoding: CellEncoding,
    kind: Option<ValueKind>,
}

impl ColumnMetadata {
    /// Read from field metadata, falling back to `config` for absent keys.
    fn read(field: &Field, config: &EngineConfig) -> Result<Self, EngineError> {
        let metadata = field.metadata();
        let invalid = |key: &str, value: &str| {
            EngineError::Schema(format!(
                "column '{}' has unrecognised {key} '{value}'",
                field.name()
            ))
        };
        let suite = match metadata.get(META_CIPHER) {
            Some(name) => CipherSuite::from_name(name)
                .ok_or_else(|| invalid(META_CIPHER, name.as_str()))?,
            None => config.cipher_suite,
        };
        let encoding = match metadata.get(META_ENCODING) {
            Some(name) => CellEncoding::from_name(name)
                .ok_or_else(|| invalid(META_ENCODING, name.as_str()))?,
            None => config.cell_encoding,
        };
        let kind = metadata
            .get(META_SOURCE_TYPE)
            .map(|name| {
                ValueKind::from_name(name).ok_or_else(|| invalid(META_SOURCE_TYPE, name.as_str()))
            })
            .transpose()?;
        Ok(Self {
            suite,
            encoding,
            kind,
        })
    }
}

/// Name of the decrypted column.
///
/// `explicit` wins. Otherwise `x_encrypted` restores `x` when the table has no
/// `x` column, and any other name gets the `_decrypted` suffix.
fn decrypted_output_name(
    schema: &Schema,
    ciphertext_column: &str,
    explicit: Option<&str>,
) -> Result<String, EngineError> {
    let name = match explicit {
        Some(name) => name.to_string(),
        None => match source_column_name(ciphertext_column) {
            Some(base) if schema.column_with_name(base).is_none() => base.to_string(),
            _ => decrypted_column_name(ciphertext_column),
        },
    };
    ensure_absent(schema, &name)?;
    Ok(name)
}
