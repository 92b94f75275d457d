//! Where a deferred plan gets its input table.

use arrow_array::RecordBatch;
use common::EngineError;

/// Produces the input table of a [`LazyTable`](super::LazyTable).
///
/// `load` is called once per [`collect`](super::LazyTable::collect), never
/// while a plan is being built.
pub trait TableSource: Send + Sync {
    /// Short label used in plan descriptions and logs.
    fn name(&self) -> String;

    fn load(&self) -> Result<RecordBatch, EngineError>;
}

/// A source backed by an in-memory table. Loading clones column handles only.
#[derive(Debug, Clone)]
pub struct MemorySource {
    batch: RecordBatch,
}

impl MemorySource {
    pub fn new(batch: RecordBatch) -> Self {
        Self { batch }
    }
}

impl TableSource for MemorySource {
    fn name(&self) -> String {
        format!(
            "memory({} columns x {} rows)",
            self.batch.num_columns(),
            self.batch.num_rows()
        )
    }

    fn load(&self) -> Result<RecordBatch, EngineError> {
        Ok(self.batch.clone())
    }
}
