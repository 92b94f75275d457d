mod support;

use std::sync::Arc;

use arrow_array::{cast::AsArray, RecordBatch};
use colcrypt::{
    lazy_parallel_decrypt_with, lazy_parallel_encrypt, lazy_parallel_encrypt_with,
    parallel_encrypt_with, EncryptOptions, EngineConfig, EngineError, ErrorKind, IntoLazy,
    LazyTable, NonceStrategy, TableSource, TransformKind,
};
use mockall::mock;

use support::{fast_config, product_table};

mock! {
    pub Source {}

    impl TableSource for Source {
        fn name(&self) -> String;
        fn load(&self) -> Result<RecordBatch, EngineError>;
    }
}

fn config() -> Arc<EngineConfig> {
    Arc::new(fast_config())
}

fn source_loaded(times: usize) -> MockSource {
    let mut source = MockSource::new();
    source.expect_name().return_const("mock".to_string());
    source
        .expect_load()
        .times(times)
        .returning(|| Ok(product_table()));
    source
}

#[test]
fn building_a_plan_never_loads_the_source() {
    let plan = LazyTable::new(Arc::new(source_loaded(0)));
    let plan = lazy_parallel_encrypt_with(
        &plan,
        "product_id",
        "pw",
        config(),
        EncryptOptions::default(),
    );
    let plan = lazy_parallel_decrypt_with(
        &plan,
        "product_id_encrypted",
        "product_id_nonce",
        "pw",
        config(),
        Default::default(),
    );
    let _copy = plan.clone();
    let _ = plan.explain().unwrap();
    assert_eq!(plan.nodes().len(), 2);
}

#[test]
fn each_collect_loads_the_source_once() {
    let plan = lazy_parallel_encrypt_with(
        &LazyTable::new(Arc::new(source_loaded(2))),
        "product_id",
        "pw",
        config(),
        EncryptOptions::default(),
    );
    let first = plan.collect().unwrap();
    let second = plan.collect().unwrap();
    assert_eq!(first.num_columns(), 3);
    // Random nonces: re-running the plan encrypts afresh.
    assert_ne!(
        first.column_by_name("product_id_nonce").unwrap().as_ref(),
        second.column_by_name("product_id_nonce").unwrap().as_ref()
    );
}

#[test]
fn source_errors_propagate_from_collect() {
    let mut source = MockSource::new();
    source.expect_name().return_const("broken".to_string());
    source
        .expect_load()
        .times(1)
        .returning(|| Err(EngineError::Plan("file vanished".into())));
    let plan = lazy_parallel_encrypt(&LazyTable::new(Arc::new(source)), "product_id", "pw");

    let err = plan.collect().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Plan);
}

#[test]
fn lazy_and_eager_produce_the_same_table() {
    let config = EngineConfig {
        nonce_strategy: NonceStrategy::Counter,
        ..fast_config()
    };
    let options = EncryptOptions {
        salt: Some(b"lazy-eager-salt".to_vec()),
        nonce_prefix: Some(vec![9; 16]),
    };

    let eager =
        parallel_encrypt_with(&product_table(), "product_id", "pw", &config, options.clone())
            .unwrap();
    let lazy = lazy_parallel_encrypt_with(
        &product_table().lazy(),
        "product_id",
        "pw",
        Arc::new(config),
        options,
    )
    .collect()
    .unwrap();
    assert_eq!(eager, lazy);
}

#[test]
fn nodes_run_in_registration_order() {
    let plan = product_table().lazy();
    let plan = lazy_parallel_encrypt_with(
        &plan,
        "product_id",
        "pw",
        config(),
        EncryptOptions::default(),
    );
    let plan = lazy_parallel_decrypt_with(
        &plan,
        "product_id_encrypted",
        "product_id_nonce",
        "pw",
        config(),
        Default::default(),
    );
    let kinds: Vec<TransformKind> = plan.nodes().iter().map(|n| n.kind()).collect();
    assert_eq!(kinds, vec![TransformKind::Encrypt, TransformKind::Decrypt]);

    let out = plan.collect().unwrap();
    let restored = out
        .column_by_name("product_id_encrypted_decrypted")
        .unwrap()
        .as_string::<i32>();
    assert_eq!(restored.iter().flatten().collect::<Vec<_>>(), vec!["A1", "A2", "A3"]);
}

#[test]
fn node_errors_surface_only_at_collect() {
    let plan = lazy_parallel_decrypt_with(
        &product_table().lazy(),
        "missing_encrypted",
        "missing_nonce",
        "pw",
        config(),
        Default::default(),
    );
    let err = plan.collect().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
}

#[test]
fn wrong_password_in_lazy_plan_fails_every_row() {
    let plan = lazy_parallel_encrypt_with(
        &product_table().lazy(),
        "product_id",
        "pw",
        config(),
        EncryptOptions::default(),
    );
    let plan = lazy_parallel_decrypt_with(
        &plan,
        "product_id_encrypted",
        "product_id_nonce",
        "other",
        config(),
        Default::default(),
    );
    let err = plan.collect().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authentication);
    assert_eq!(err.row_failures().unwrap().len(), 3);
}
