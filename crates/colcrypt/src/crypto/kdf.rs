//! Password-based key derivation with Argon2id.

use std::fmt;

use argon2::{Algorithm, Argon2, Params, Version};
use common::EngineError;
use thiserror::Error;
use tracing::debug;
use zeroize::Zeroizing;

/// Byte length of a derived key (32 bytes = 256 bits).
pub const KEY_LEN: usize = 32;

/// Salt used when the caller supplies none.
///
/// Every column encrypted under the same password and this salt shares one
/// key. Callers that need independent keys per dataset pass their own salt.
pub const DEFAULT_SALT: &str = "Q88pmcJzbz8hvnd0ISZ2eF0V3xwcBTHCF4Hj8tsOcX";

/// Shortest accepted salt (Argon2 minimum).
pub const MIN_SALT_LEN: usize = 8;

/// Longest accepted salt.
pub const MAX_SALT_LEN: usize = 64;

/// Errors produced while deriving a key.
#[derive(Debug, Error)]
pub enum KeyDerivationError {
    #[error("password must not be empty")]
    EmptyPassword,

    #[error("salt must be {MIN_SALT_LEN}..={MAX_SALT_LEN} bytes, got {0}")]
    SaltLength(usize),

    #[error("invalid argon2 parameters: {0}")]
    InvalidParams(String),

    #[error("argon2 hashing failed: {0}")]
    Hash(String),
}

impl From<KeyDerivationError> for EngineError {
    fn from(e: KeyDerivationError) -> Self {
        EngineError::KeyDerivation(e.to_string())
    }
}

/// Caller-supplied password bytes.
///
/// Held in a zeroizing buffer; the `Debug` impl never prints the contents.
#[derive(Clone)]
pub struct Password(Zeroizing<Vec<u8>>);

impl Password {
    pub fn new(bytes: impl AsRef<[u8]>) -> Self {
        Self(Zeroizing::new(bytes.as_ref().to_vec()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password([REDACTED])")
    }
}

/// Key material derived from a password. Overwritten with zeroes on drop.
pub struct DerivedKey(Zeroizing<[u8; KEY_LEN]>);

impl DerivedKey {
    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivedKey([REDACTED])")
    }
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Degree of parallelism (lanes).
    pub parallelism: u32,
}

impl KdfParams {
    fn to_argon2(self) -> Result<Params, KeyDerivationError> {
        Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(KEY_LEN),
        )
        .map_err(|e| KeyDerivationError::InvalidParams(e.to_string()))
    }

    /// Check the parameters without deriving anything.
    pub fn validate(&self) -> Result<(), KeyDerivationError> {
        self.to_argon2().map(|_| ())
    }
}

impl Default for KdfParams {
    /// The `argon2` crate defaults (19 MiB, 2 passes, 1 lane).
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

/// Deterministic password → key derivation.
#[derive(Debug, Clone)]
pub struct KeyDerivation {
    params: KdfParams,
    default_salt: Vec<u8>,
}

impl KeyDerivation {
    pub fn new(params: KdfParams, default_salt: impl Into<Vec<u8>>) -> Self {
        Self {
            params,
            default_salt: default_salt.into(),
        }
    }

    /// Derive a [`KEY_LEN`]-byte key from `password`.
    ///
    /// `salt` overrides the configured default salt for this call only.
    ///
    /// # Errors
    ///
    /// Returns [`KeyDerivationError::EmptyPassword`] for an empty password and
    /// [`KeyDerivationError::SaltLength`] when the salt is outside
    /// [`MIN_SALT_LEN`]..=[`MAX_SALT_LEN`].
    pub fn derive(
        &self,
        password: &[u8],
        salt: Option<&[u8]>,
    ) -> Result<DerivedKey, KeyDerivationError> {
        if password.is_empty() {
            return Err(KeyDerivationError::EmptyPassword);
        }
        let salt = salt.unwrap_or(&self.default_salt);
        if !(MIN_SALT_LEN..=MAX_SALT_LEN).contains(&salt.len()) {
            return Err(KeyDerivationError::SaltLength(salt.len()));
        }

        debug!(
            memory_kib = self.params.memory_kib,
            iterations = self.params.iterations,
            parallelism = self.params.parallelism,
            "deriving column key"
        );
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.to_argon2()?);
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        argon2
            .hash_password_into(password, salt, &mut *key)
            .map_err(|e| KeyDerivationError::Hash(e.to_string()))?;
        Ok(DerivedKey(key))
    }
}

impl Default for KeyDerivation {
    fn default() -> Self {
        Self::new(KdfParams::default(), DEFAULT_SALT.as_bytes())
    }
}
