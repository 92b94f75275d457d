//! Column transforms: the unit of work shared by the eager and lazy entry
//! points.
//!
//! A [`ColumnTransform`] is a pure description (operation, column names,
//! password, configuration). Nothing runs until [`ColumnTransform::evaluate`]
//! is called, either directly by the eager API or by
//! [`LazyTable::collect`](crate::lazy::LazyTable::collect).

mod decrypt;
mod encrypt;

use std::fmt;
use std::sync::Arc;

use arrow_array::{ArrayRef, RecordBatch};
use arrow_schema::{Field, FieldRef, Schema};
use common::{EngineError, FailurePolicy, TransformKind};
use serde::Serialize;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::crypto::Password;
use crate::lazy::LazyTable;

/// A plan node that turns one table into another.
pub trait TableTransform: Send + Sync + fmt::Debug {
    fn kind(&self) -> TransformKind;

    /// Apply the transform to a materialised table.
    fn evaluate(&self, batch: &RecordBatch) -> Result<RecordBatch, EngineError>;

    /// Serialisable description of the node. Never contains secrets.
    fn describe(&self) -> NodeDescription;
}

/// Per-call encryption options.
#[derive(Debug, Clone, Default)]
pub struct EncryptOptions {
    /// Overrides the configured salt for this call.
    pub salt: Option<Vec<u8>>,
    /// Pins the counter-nonce prefix, making output reproducible. Must be
    /// `nonce_len - 8` bytes for the configured suite, and requires a `salt`
    /// that differs from the configured one.
    pub nonce_prefix: Option<Vec<u8>>,
}

/// Per-call decryption options.
#[derive(Debug, Clone, Default)]
pub struct DecryptOptions {
    /// Overrides the configured salt for this call.
    pub salt: Option<Vec<u8>>,
    /// Name of the decrypted column, replacing the derived name.
    pub output_column: Option<String>,
    pub failure_policy: FailurePolicy,
}

#[derive(Debug, Clone)]
enum Operation {
    Encrypt {
        column: String,
        options: EncryptOptions,
    },
    Decrypt {
        ciphertext_column: String,
        nonce_column: String,
        options: DecryptOptions,
    },
}

/// Encryption or decryption of one column.
#[derive(Debug, Clone)]
pub struct ColumnTransform {
    id: Uuid,
    operation: Operation,
    password: Password,
    config: Arc<EngineConfig>,
}

impl ColumnTransform {
    pub fn encrypt(
        column: impl Into<String>,
        password: Password,
        config: Arc<EngineConfig>,
        options: EncryptOptions,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation: Operation::Encrypt {
                column: column.into(),
                options,
            },
            password,
            config,
        }
    }

    pub fn decrypt(
        ciphertext_column: impl Into<String>,
        nonce_column: impl Into<String>,
        password: Password,
        config: Arc<EngineConfig>,
        options: DecryptOptions,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation: Operation::Decrypt {
                ciphertext_column: ciphertext_column.into(),
                nonce_column: nonce_column.into(),
                options,
            },
            password,
            config,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Return `plan` with this transform appended, without running it.
    pub fn register(self, plan: &LazyTable) -> LazyTable {
        plan.with_node(Arc::new(self))
    }
}

impl TableTransform for ColumnTransform {
    fn kind(&self) -> TransformKind {
        match self.operation {
            Operation::Encrypt { .. } => TransformKind::Encrypt,
            Operation::Decrypt { .. } => TransformKind::Decrypt,
        }
    }

    fn evaluate(&self, batch: &RecordBatch) -> Result<RecordBatch, EngineError> {
        self.config.validate()?;
        match &self.operation {
            Operation::Encrypt { column, options } => {
                encrypt::encrypt_column(batch, column, &self.password, &self.config, options)
            }
            Operation::Decrypt {
                ciphertext_column,
                nonce_column,
                options,
            } => decrypt::decrypt_column(
                batch,
                ciphertext_column,
                nonce_column,
                &self.password,
                &self.config,
                options,
            ),
        }
    }

    fn describe(&self) -> NodeDescription {
        let (columns, output_column, failure_policy) = match &self.operation {
            Operation::Encrypt { column, .. } => (vec![column.clone()], None, None),
            Operation::Decrypt {
                ciphertext_column,
                nonce_column,
                options,
            } => (
                vec![ciphertext_column.clone(), nonce_column.clone()],
                options.output_column.clone(),
                Some(options.failure_policy),
            ),
        };
        NodeDescription {
            id: self.id,
            kind: self.kind(),
            columns,
            output_column,
            failure_policy,
            cipher_suite: self.config.cipher_suite.name(),
            worker_threads: self.config.worker_threads,
        }
    }
}

/// One node in [`LazyTable::explain`](crate::lazy::LazyTable::explain) output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeDescription {
    pub id: Uuid,
    pub kind: TransformKind,
    /// Input columns in argument order.
    pub columns: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_column: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_policy: Option<FailurePolicy>,
    pub cipher_suite: &'static str,
    pub worker_threads: usize,
}

/// Look up a column by name.
fn find_column<'a>(schema: &'a Schema, name: &str) -> Result<(usize, &'a Field), EngineError> {
    schema
        .column_with_name(name)
        .ok_or_else(|| EngineError::Schema(format!("column '{name}' not found")))
}

fn ensure_absent(schema: &Schema, name: &str) -> Result<(), EngineError> {
    if schema.column_with_name(name).is_some() {
        return Err(EngineError::Schema(format!(
            "output column '{name}' already exists"
        )));
    }
    Ok(())
}

/// Return `batch` with `columns` appended after its existing columns.
fn append_columns(
    batch: &RecordBatch,
    columns: Vec<(Field, ArrayRef)>,
) -> Result<RecordBatch, EngineError> {
    let schema = batch.schema();
    let mut fields: Vec<FieldRef> = schema.fields().iter().cloned().collect();
    let mut arrays = batch.columns().to_vec();
    for (field, array) in columns {
        fields.push(Arc::new(field));
        arrays.push(array);
    }
    let schema = Schema::new_with_metadata(fields, schema.metadata().clone());
    RecordBatch::try_new(Arc::new(schema), arrays)
        .map_err(|e| EngineError::Schema(format!("failed to assemble output table: {e}")))
}
