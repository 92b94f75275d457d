//! Names and options exchanged between the engine, its configuration, and
//! the column metadata it writes.
//!
//! Every enum here round-trips through its string name so it can be stored in
//! Arrow field metadata and read from environment variables.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Column naming
// ---------------------------------------------------------------------------

/// Suffix of the ciphertext column produced for a source column.
pub const ENCRYPTED_SUFFIX: &str = "_encrypted";

/// Suffix of the nonce column produced for a source column.
pub const NONCE_SUFFIX: &str = "_nonce";

/// Suffix of the decrypted column when the source name cannot be restored.
pub const DECRYPTED_SUFFIX: &str = "_decrypted";

/// Suffix of the per-row error column written under [`FailurePolicy::Annotate`].
pub const DECRYPTION_ERRORS_SUFFIX: &str = "_decryption_errors";

/// Field metadata key: logical type of the encrypted values.
pub const META_SOURCE_TYPE: &str = "colcrypt.source_type";

/// Field metadata key: cipher suite used for the column.
pub const META_CIPHER: &str = "colcrypt.cipher";

/// Field metadata key: cell encoding of the column.
pub const META_ENCODING: &str = "colcrypt.encoding";

/// `product_id` → `product_id_encrypted`.
pub fn encrypted_column_name(column: &str) -> String {
    format!("{column}{ENCRYPTED_SUFFIX}")
}

/// `product_id` → `product_id_nonce`.
pub fn nonce_column_name(column: &str) -> String {
    format!("{column}{NONCE_SUFFIX}")
}

/// `product_id_encrypted` → `Some("product_id")`.
pub fn source_column_name(ciphertext_column: &str) -> Option<&str> {
    ciphertext_column
        .strip_suffix(ENCRYPTED_SUFFIX)
        .filter(|base| !base.is_empty())
}

/// `product_id_encrypted` → `product_id_encrypted_decrypted`.
pub fn decrypted_column_name(ciphertext_column: &str) -> String {
    format!("{ciphertext_column}{DECRYPTED_SUFFIX}")
}

/// `product_id_encrypted` → `product_id_encrypted_decryption_errors`.
pub fn decryption_errors_column_name(ciphertext_column: &str) -> String {
    format!("{ciphertext_column}{DECRYPTION_ERRORS_SUFFIX}")
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Authenticated-encryption construction applied to each cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CipherSuite {
    /// XChaCha20-Poly1305, 192-bit nonce.
    #[default]
    #[serde(rename = "xchacha20-poly1305")]
    XChaCha20Poly1305,
    /// AES-256-GCM-SIV (RFC 8452), 96-bit nonce, nonce-misuse-resistant.
    #[serde(rename = "aes-256-gcm-siv")]
    Aes256GcmSiv,
}

impl CipherSuite {
    pub fn name(&self) -> &'static str {
        match self {
            CipherSuite::XChaCha20Poly1305 => "xchacha20-poly1305",
            CipherSuite::Aes256GcmSiv => "aes-256-gcm-siv",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "xchacha20-poly1305" => Some(CipherSuite::XChaCha20Poly1305),
            "aes-256-gcm-siv" => Some(CipherSuite::Aes256GcmSiv),
            _ => None,
        }
    }

    /// Byte length of one nonce under this suite.
    pub fn nonce_len(&self) -> usize {
        match self {
            CipherSuite::XChaCha20Poly1305 => 24,
            CipherSuite::Aes256GcmSiv => 12,
        }
    }

    /// Byte length of the authentication tag appended to each ciphertext.
    pub fn tag_len(&self) -> usize {
        16
    }
}

/// How per-row nonces are produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NonceStrategy {
    /// Every nonce drawn from a thread-local CSPRNG.
    #[default]
    Random,
    /// Random per-call prefix followed by the 64-bit row index.
    ///
    /// Only XChaCha20-Poly1305 qualifies: its 128-bit prefix keeps calls under
    /// one key apart. AES-256-GCM-SIV would leave a 32-bit prefix, which
    /// collides after roughly 2^16 calls.
    Counter,
}

impl NonceStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            NonceStrategy::Random => "random",
            NonceStrategy::Counter => "counter",
        }
    }
}

/// Representation of ciphertext and nonce cells in their columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellEncoding {
    /// Raw bytes in an Arrow `Binary` column.
    #[default]
    Binary,
    /// Lowercase hex text in an Arrow `Utf8` column.
    Hex,
    /// Standard padded base64 text in an Arrow `Utf8` column.
    Base64,
}

impl CellEncoding {
    pub fn name(&self) -> &'static str {
        match self {
            CellEncoding::Binary => "binary",
            CellEncoding::Hex => "hex",
            CellEncoding::Base64 => "base64",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "binary" => Some(CellEncoding::Binary),
            "hex" => Some(CellEncoding::Hex),
            "base64" => Some(CellEncoding::Base64),
            _ => None,
        }
    }
}

/// What decrypt does when individual rows fail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Fail the whole call, listing every failed row.
    #[default]
    Fail,
    /// Null the failed rows and add a `<column>_decryption_errors` column.
    Annotate,
}

/// Direction of a column transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    Encrypt,
    Decrypt,
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformKind::Encrypt => f.write_str("encrypt"),
            TransformKind::Decrypt => f.write_str("decrypt"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_names() {
        assert_eq!(encrypted_column_name("product_id"), "product_id_encrypted");
        assert_eq!(nonce_column_name("product_id"), "product_id_nonce");
        assert_eq!(
            decrypted_column_name("product_id_encrypted"),
            "product_id_encrypted_decrypted"
        );
        assert_eq!(
            decryption_errors_column_name("product_id_encrypted"),
            "product_id_encrypted_decryption_errors"
        );
    }

    #[test]
    fn source_name_requires_suffix_and_base() {
        assert_eq!(source_column_name("product_id_encrypted"), Some("product_id"));
        assert_eq!(source_column_name("product_id"), None);
        assert_eq!(source_column_name("_encrypted"), None);
    }

    #[test]
    fn cipher_suite_names_round_trip() {
        for suite in [CipherSuite::XChaCha20Poly1305, CipherSuite::Aes256GcmSiv] {
            assert_eq!(CipherSuite::from_name(suite.name()), Some(suite));
        }
        assert_eq!(CipherSuite::from_name("rot13"), None);
    }

    #[test]
    fn serde_uses_names() {
        let json = serde_json::to_string(&CipherSuite::Aes256GcmSiv).unwrap();
        assert_eq!(json, "\"aes-256-gcm-siv\"");
        let strategy: NonceStrategy = serde_json::from_str("\"counter\"").unwrap();
        assert_eq!(strategy, NonceStrategy::Counter);
        let encoding: CellEncoding = serde_json::from_str("\"hex\"").unwrap();
        assert_eq!(encoding, CellEncoding::Hex);
        let policy: FailurePolicy = serde_json::from_str("\"annotate\"").unwrap();
        assert_eq!(policy, FailurePolicy::Annotate);
    }

    #[test]
    fn nonce_lengths_meet_minimum_width() {
        assert!(CipherSuite::XChaCha20Poly1305.nonce_len() * 8 >= 96);
        assert!(CipherSuite::Aes256GcmSiv.nonce_len() * 8 >= 96);
    }
}
