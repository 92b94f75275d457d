mod support;

use std::sync::Arc;

use arrow_array::{cast::AsArray, Array, ArrayRef, BinaryArray, Int32Array, RecordBatch};
use colcrypt::{
    parallel_decrypt_with, parallel_encrypt_with, DecryptOptions, EncryptOptions, ErrorKind,
    FailurePolicy, FailureReason,
};

use support::{batch, fast_config, replace_column};

fn encrypted_scores() -> RecordBatch {
    let table = batch(vec![(
        "score",
        Arc::new(Int32Array::from(vec![Some(10), Some(20), None, Some(40)])) as ArrayRef,
    )]);
    parallel_encrypt_with(&table, "score", "pw", &fast_config(), EncryptOptions::default())
        .unwrap()
        .project(&[1, 2])
        .unwrap()
}

/// Swap the ciphertexts of rows 0 and 1: both rows then fail authentication.
fn swap_first_rows(table: &RecordBatch) -> RecordBatch {
    let ciphertexts = table.column_by_name("score_encrypted").unwrap().as_binary::<i32>();
    let mut cells: Vec<Option<&[u8]>> = ciphertexts.iter().collect();
    cells.swap(0, 1);
    let swapped: BinaryArray = cells.into_iter().collect();
    replace_column(table, "score_encrypted", Arc::new(swapped))
}

fn annotate() -> DecryptOptions {
    DecryptOptions {
        failure_policy: FailurePolicy::Annotate,
        ..DecryptOptions::default()
    }
}

#[test]
fn annotate_nulls_failed_rows_and_reports_reasons() {
    let broken = swap_first_rows(&encrypted_scores());
    let out = parallel_decrypt_with(
        &broken,
        "score_encrypted",
        "score_nonce",
        "pw",
        &fast_config(),
        annotate(),
    )
    .unwrap();

    let scores = out
        .column_by_name("score")
        .unwrap()
        .as_primitive::<arrow_array::types::Int32Type>();
    assert!(scores.is_null(0));
    assert!(scores.is_null(1));
    assert!(scores.is_null(2));
    assert_eq!(scores.value(3), 40);

    let errors = out
        .column_by_name("score_encrypted_decryption_errors")
        .unwrap()
        .as_string::<i32>();
    assert_eq!(errors.value(0), FailureReason::Authentication.describe());
    assert_eq!(errors.value(1), FailureReason::Authentication.describe());
    assert!(errors.is_null(2));
    assert!(errors.is_null(3));
}

#[test]
fn annotate_with_clean_input_has_an_all_null_error_column() {
    let out = parallel_decrypt_with(
        &encrypted_scores(),
        "score_encrypted",
        "score_nonce",
        "pw",
        &fast_config(),
        annotate(),
    )
    .unwrap();
    let errors = out.column_by_name("score_encrypted_decryption_errors").unwrap();
    assert_eq!(errors.null_count(), errors.len());
    assert_eq!(out.column_by_name("score").unwrap().null_count(), 1);
}

#[test]
fn fail_policy_lists_every_failed_row() {
    let broken = swap_first_rows(&encrypted_scores());
    let err = parallel_decrypt_with(
        &broken,
        "score_encrypted",
        "score_nonce",
        "pw",
        &fast_config(),
        DecryptOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authentication);
    assert_eq!(err.row_failures().unwrap().rows(), vec![0, 1]);
    assert!(err.to_string().starts_with("2 row(s) failed"));
}
