//! Deferred plans: register column transforms now, run them on `collect`.
//!
//! A [`LazyTable`] is a table source plus an ordered list of transform nodes.
//! Building, cloning, or explaining a plan does no work and never reads the
//! source. [`LazyTable::collect`] loads the source once and applies each node
//! in registration order.

pub mod source;

pub use source::{MemorySource, TableSource};

use std::fmt;
use std::sync::Arc;

use arrow_array::RecordBatch;
use common::EngineError;
use serde::Serialize;
use tracing::{debug, info, info_span};

use crate::config::EngineConfig;
use crate::crypto::Password;
use crate::transform::{
    ColumnTransform, DecryptOptions, EncryptOptions, NodeDescription, TableTransform,
};

/// A table whose transforms have not been executed yet.
#[derive(Clone)]
pub struct LazyTable {
    source: Arc<dyn TableSource>,
    nodes: Vec<Arc<dyn TableTransform>>,
}

impl LazyTable {
    pub fn new(source: Arc<dyn TableSource>) -> Self {
        Self {
            source,
            nodes: Vec::new(),
        }
    }

    pub fn from_batch(batch: RecordBatch) -> Self {
        Self::new(Arc::new(MemorySource::new(batch)))
    }

    /// Return a plan with `node` appended. `self` is left unchanged.
    pub fn with_node(&self, node: Arc<dyn TableTransform>) -> Self {
        let mut nodes = self.nodes.clone();
        nodes.push(node);
        Self {
            source: Arc::clone(&self.source),
            nodes,
        }
    }

    pub fn nodes(&self) -> &[Arc<dyn TableTransform>] {
        &self.nodes
    }

    /// JSON description of the plan: the source label and each node's
    /// operation, columns, and id. Passwords are never included.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Plan`] if the description cannot be serialised.
    pub fn explain(&self) -> Result<String, EngineError> {
        let plan = PlanDescription {
            source: self.source.name(),
            nodes: self.nodes.iter().map(|node| node.describe()).collect(),
        };
        serde_json::to_string_pretty(&plan)
            .map_err(|e| EngineError::Plan(format!("failed to describe plan: {e}")))
    }

    /// Execute the plan.
    ///
    /// Every call reloads the source and re-runs every node; results are not
    /// cached.
    ///
    /// # Errors
    ///
    /// Returns the source's error, or the first error raised by a node.
    pub fn collect(&self) -> Result<RecordBatch, EngineError> {
        let span = info_span!("collect_plan", source = %self.source.name(), nodes = self.nodes.len());
        let _enter = span.enter();

        let mut batch = self.source.load()?;
        debug!(rows = batch.num_rows(), "plan source loaded");
        for node in &self.nodes {
            batch = node.evaluate(&batch)?;
        }
        info!(
            rows = batch.num_rows(),
            columns = batch.num_columns(),
            "plan collected"
        );
        Ok(batch)
    }
}

impl fmt::Debug for LazyTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyTable")
            .field("source", &self.source.name())
            .field("nodes", &self.nodes)
            .finish()
    }
}

#[derive(Serialize)]
struct PlanDescription {
    source: String,
    nodes: Vec<NodeDescription>,
}

/// Conversion of an in-memory table into a [`LazyTable`].
pub trait IntoLazy {
    fn lazy(self) -> LazyTable;
}

impl IntoLazy for RecordBatch {
    fn lazy(self) -> LazyTable {
        LazyTable::from_batch(self)
    }
}

/// Register encryption of `column` on `plan`. Nothing runs until
/// [`LazyTable::collect`].
///
/// Uses [`EngineConfig::default`]. See [`lazy_parallel_encrypt_with`].
pub fn lazy_parallel_encrypt(
    plan: &LazyTable,
    column: &str,
    password: impl AsRef<[u8]>,
) -> LazyTable {
    lazy_parallel_encrypt_with(
        plan,
        column,
        password,
        Arc::new(EngineConfig::default()),
        EncryptOptions::default(),
    )
}

/// [`lazy_parallel_encrypt`] with explicit configuration and per-call options.
pub fn lazy_parallel_encrypt_with(
    plan: &LazyTable,
    column: &str,
    password: impl AsRef<[u8]>,
    config: Arc<EngineConfig>,
    options: EncryptOptions,
) -> LazyTable {
    let node = ColumnTransform::encrypt(column, Password::new(password), config, options);
    debug!(node = %node.id(), column, "registered encrypt node");
    node.register(plan)
}

/// Register decryption of `ciphertext_column` on `plan`. Nothing runs until
/// [`LazyTable::collect`].
///
/// Uses [`EngineConfig::default`]. See [`lazy_parallel_decrypt_with`].
pub fn lazy_parallel_decrypt(
    plan: &LazyTable,
    ciphertext_column: &str,
    nonce_column: &str,
    password: impl AsRef<[u8]>,
) -> LazyTable {
    lazy_parallel_decrypt_with(
        plan,
        ciphertext_column,
        nonce_column,
        password,
        Arc::new(EngineConfig::default()),
        DecryptOptions::default(),
    )
}

/// [`lazy_parallel_decrypt`] with explicit configuration and per-call options.
pub fn lazy_parallel_decrypt_with(
    plan: &LazyTable,
    ciphertext_column: &str,
    nonce_column: &str,
    password: impl AsRef<[u8]>,
    config: Arc<EngineConfig>,
    options: DecryptOptions,
) -> LazyTable {
    let node = ColumnTransform::decrypt(
        ciphertext_column,
        nonce_column,
        Password::new(password),
        config,
        options,
    );
    debug!(node = %node.id(), column = ciphertext_column, "registered decrypt node");
    node.register(plan)
}

#[cfg(test)]
mod tests {
    use arrow_array::{ArrayRef, StringArray};
    use common::TransformKind;

    use super::*;

    fn plan() -> LazyTable {
        RecordBatch::try_from_iter(vec![(
            "product_id",
            std::sync::Arc::new(StringArray::from(vec!["A1", "A2"])) as ArrayRef,
        )])
        .unwrap()
        .lazy()
    }

    #[test]
    fn registration_returns_new_plan() {
        let base = plan();
        let encrypted = lazy_parallel_encrypt(&base, "product_id", "pw");
        assert!(base.nodes().is_empty());
        assert_eq!(encrypted.nodes().len(), 1);
        assert_eq!(encrypted.nodes()[0].kind(), TransformKind::Encrypt);
    }

    #[test]
    fn collect_without_nodes_returns_source() {
        let out = plan().collect().unwrap();
        assert_eq!(out.num_columns(), 1);
        assert_eq!(out.num_rows(), 2);
    }

    #[test]
    fn explain_lists_nodes_in_order_without_password() {
        let p = lazy_parallel_encrypt(&plan(), "product_id", "s3cret-pw");
        let p = lazy_parallel_decrypt(&p, "product_id_encrypted", "product_id_nonce", "s3cret-pw");
        let json = p.explain().unwrap();
        assert!(!json.contains("s3cret-pw"));

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let nodes = value["nodes"].as_array().unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0]["kind"], "encrypt");
        assert_eq!(nodes[1]["kind"], "decrypt");
        assert_eq!(nodes[1]["columns"][1], "product_id_nonce");
        assert!(value["source"].as_str().unwrap().starts_with("memory("));
    }

    #[test]
    fn debug_output_omits_password() {
        let p = lazy_parallel_encrypt(&plan(), "product_id", "s3cret-pw");
        assert!(!format!("{p:?}").contains("s3cret-pw"));
    }
}
