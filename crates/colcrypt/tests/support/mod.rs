//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use arrow_array::{ArrayRef, RecordBatch, StringArray};
use colcrypt::EngineConfig;

/// Cheap Argon2 parameters so tests do not spend their time in key derivation.
pub fn fast_config() -> EngineConfig {
    EngineConfig {
        argon2_memory_kib: 64,
        argon2_iterations: 1,
        argon2_parallelism: 1,
        ..EngineConfig::default()
    }
}

pub fn batch(columns: Vec<(&str, ArrayRef)>) -> RecordBatch {
    RecordBatch::try_from_iter(columns).unwrap()
}

pub fn product_table() -> RecordBatch {
    batch(vec![(
        "product_id",
        Arc::new(StringArray::from(vec!["A1", "A2", "A3"])) as ArrayRef,
    )])
}

/// Replace the column called `name`, keeping the schema (and field metadata).
pub fn replace_column(batch: &RecordBatch, name: &str, array: ArrayRef) -> RecordBatch {
    let index = batch.schema().index_of(name).unwrap();
    let mut columns = batch.columns().to_vec();
    columns[index] = array;
    RecordBatch::try_new(batch.schema(), columns).unwrap()
}
