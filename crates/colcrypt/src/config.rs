//! Engine configuration: loading from the environment and validation.
//!
//! Every field has a default, so an empty environment yields a usable
//! configuration. Variables carry the `COLCRYPT_` prefix, e.g.
//! `COLCRYPT_WORKER_THREADS=8` or `COLCRYPT_CIPHER_SUITE=aes-256-gcm-siv`.

use anyhow::{Context, Result};
use common::{CellEncoding, CipherSuite, EngineError, NonceStrategy};
use serde::Deserialize;

use crate::crypto::kdf::{DEFAULT_SALT, MAX_SALT_LEN, MIN_SALT_LEN};
use crate::crypto::{KdfParams, KeyDerivation};
use crate::scheduler::Scheduler;

/// Upper bound on a dedicated worker pool.
pub const MAX_WORKER_THREADS: usize = 1024;

/// Shortest nonce the counter strategy accepts: a 128-bit random prefix
/// ahead of the 64-bit row index.
pub const MIN_COUNTER_NONCE_LEN: usize = 24;

/// Validated engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// Salt used when a call does not supply its own.
    #[serde(default = "default_salt")]
    pub salt: String,

    /// Argon2id memory cost in KiB.
    #[serde(default = "default_argon2_memory_kib")]
    pub argon2_memory_kib: u32,

    /// Argon2id passes.
    #[serde(default = "default_argon2_iterations")]
    pub argon2_iterations: u32,

    /// Argon2id lanes.
    #[serde(default = "default_argon2_parallelism")]
    pub argon2_parallelism: u32,

    /// Size of a dedicated per-call worker pool. `0` runs on the current
    /// rayon pool.
    #[serde(default)]
    pub worker_threads: usize,

    #[serde(default)]
    pub cipher_suite: CipherSuite,

    #[serde(default)]
    pub nonce_strategy: NonceStrategy,

    /// Encoding of newly written ciphertext/nonce columns.
    #[serde(default)]
    pub cell_encoding: CellEncoding,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_salt() -> String {
    DEFAULT_SALT.into()
}
fn default_argon2_memory_kib() -> u32 {
    KdfParams::default().memory_kib
}
fn default_argon2_iterations() -> u32 {
    KdfParams::default().iterations
}
fn default_argon2_parallelism() -> u32 {
    KdfParams::default().parallelism
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            salt: default_salt(),
            argon2_memory_kib: default_argon2_memory_kib(),
            argon2_iterations: default_argon2_iterations(),
            argon2_parallelism: default_argon2_parallelism(),
            worker_threads: 0,
            cipher_suite: CipherSuite::default(),
            nonce_strategy: NonceStrategy::default(),
            cell_encoding: CellEncoding::default(),
            log_level: default_log_level(),
        }
    }
}

impl EngineConfig {
    /// Load and validate configuration from `COLCRYPT_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed or a value is invalid.
    pub fn from_env() -> Result<Self> {
        Self::from_environment(config::Environment::with_prefix("COLCRYPT"))
    }

    fn from_environment(env: config::Environment) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(env)
            .build()
            .context("failed to build colcrypt configuration from environment")?;

        let c: EngineConfig = cfg
            .try_deserialize()
            .context("failed to deserialise colcrypt configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    pub fn validate(&self) -> Result<(), EngineError> {
        let salt_len = self.salt.len();
        if !(MIN_SALT_LEN..=MAX_SALT_LEN).contains(&salt_len) {
            return Err(EngineError::Config(format!(
                "SALT must be {MIN_SALT_LEN}..={MAX_SALT_LEN} bytes, got {salt_len}"
            )));
        }
        self.kdf_params()
            .validate()
            .map_err(|e| EngineError::Config(format!("ARGON2 parameters rejected: {e}")))?;
        if self.worker_threads > MAX_WORKER_THREADS {
            return Err(EngineError::Config(format!(
                "WORKER_THREADS must be <= {MAX_WORKER_THREADS}, got {}",
                self.worker_threads
            )));
        }
        if self.nonce_strategy == NonceStrategy::Counter
            && self.cipher_suite.nonce_len() < MIN_COUNTER_NONCE_LEN
        {
            return Err(EngineError::Config(format!(
                "NONCE_STRATEGY=counter needs a nonce of at least {MIN_COUNTER_NONCE_LEN} bytes; \
                 {} nonces are {} bytes",
                self.cipher_suite.name(),
                self.cipher_suite.nonce_len()
            )));
        }
        if self.log_level.trim().is_empty() {
            return Err(EngineError::Config("LOG_LEVEL must not be empty".into()));
        }
        Ok(())
    }

    pub fn kdf_params(&self) -> KdfParams {
        KdfParams {
            memory_kib: self.argon2_memory_kib,
            iterations: self.argon2_iterations,
            parallelism: self.argon2_parallelism,
        }
    }

    /// Key derivation with this configuration's cost parameters and default salt.
    pub fn key_derivation(&self) -> KeyDerivation {
        KeyDerivation::new(self.kdf_params(), self.salt.as_bytes())
    }

    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(self.worker_threads)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<EngineConfig> {
        let source: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EngineConfig::from_environment(
            config::Environment::with_prefix("COLCRYPT").source(Some(source)),
        )
    }

    #[test]
    fn defaults_are_correct() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.salt, DEFAULT_SALT);
        assert_eq!(cfg.argon2_memory_kib, 19_456);
        assert_eq!(cfg.argon2_iterations, 2);
        assert_eq!(cfg.argon2_parallelism, 1);
        assert_eq!(cfg.worker_threads, 0);
        assert_eq!(cfg.cipher_suite, CipherSuite::XChaCha20Poly1305);
        assert_eq!(cfg.nonce_strategy, NonceStrategy::Random);
        assert_eq!(cfg.cell_encoding, CellEncoding::Binary);
        assert_eq!(cfg.log_level, "info");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn empty_environment_yields_defaults() {
        assert_eq!(load(&[]).unwrap(), EngineConfig::default());
    }

    #[test]
    fn reads_prefixed_variables() {
        let cfg = load(&[
            ("COLCRYPT_WORKER_THREADS", "8"),
            ("COLCRYPT_CIPHER_SUITE", "aes-256-gcm-siv"),
            ("COLCRYPT_CELL_ENCODING", "hex"),
            ("COLCRYPT_ARGON2_MEMORY_KIB", "1024"),
            ("COLCRYPT_SALT", "per-dataset-salt"),
        ])
        .unwrap();
        assert_eq!(cfg.worker_threads, 8);
        assert_eq!(cfg.cipher_suite, CipherSuite::Aes256GcmSiv);
        assert_eq!(cfg.cell_encoding, CellEncoding::Hex);
        assert_eq!(cfg.argon2_memory_kib, 1024);
        assert_eq!(cfg.salt, "per-dataset-salt");
    }

    #[test]
    fn from_env_rejects_invalid_values() {
        assert!(load(&[("COLCRYPT_WORKER_THREADS", "lots")]).is_err());
        assert!(load(&[("COLCRYPT_CIPHER_SUITE", "rot13")]).is_err());
        assert!(load(&[("COLCRYPT_SALT", "short")]).is_err());
    }

    #[test]
    fn validate_rejects_short_salt() {
        let cfg = EngineConfig {
            salt: "abc".into(),
            ..EngineConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(EngineError::Config(_))));
    }

    #[test]
    fn counter_strategy_requires_wide_nonces() {
        let counter = EngineConfig {
            nonce_strategy: NonceStrategy::Counter,
            ..EngineConfig::default()
        };
        assert!(counter.validate().is_ok());

        let aes = EngineConfig {
            cipher_suite: CipherSuite::Aes256GcmSiv,
            ..counter
        };
        assert!(matches!(aes.validate(), Err(EngineError::Config(_))));
        assert!(load(&[
            ("COLCRYPT_CIPHER_SUITE", "aes-256-gcm-siv"),
            ("COLCRYPT_NONCE_STRATEGY", "counter"),
        ])
        .is_err());
    }

    #[test]
    fn validate_rejects_oversized_pool() {
        let cfg = EngineConfig {
            worker_threads: MAX_WORKER_THREADS + 1,
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_argon2_params() {
        let cfg = EngineConfig {
            argon2_iterations: 0,
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
