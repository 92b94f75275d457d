//! Authenticated encryption of individual cell values.
//!
//! **Algorithm choice:** XChaCha20-Poly1305 is the default. Its 192-bit nonce
//! is large enough that random per-row nonces never realistically collide,
//! even across many calls under one password-derived key.
//!
//! AES-256-GCM-SIV (RFC 8452) is offered for environments that require AES.
//! Its 96-bit nonce is small, but it is nonce-misuse-resistant: a repeated
//! nonce only reveals whether two plaintexts were equal.
//!
//! **Do NOT substitute plain AES-256-GCM.** GCM nonce reuse is catastrophic;
//! it breaks both confidentiality and authentication.

use aes_gcm_siv::Aes256GcmSiv;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use common::{CipherSuite, EngineError};
use thiserror::Error;
use zeroize::Zeroizing;

use super::kdf::{DerivedKey, KEY_LEN};
use super::nonce::Nonce;

/// Errors produced by the cipher layer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    /// The key is the wrong length (must be [`KEY_LEN`] bytes).
    #[error("invalid key length: expected {KEY_LEN} bytes")]
    InvalidKeyLength,

    /// The nonce does not have the length the suite requires.
    #[error("invalid nonce length: expected {expected} bytes, got {actual}")]
    InvalidNonceLength { expected: usize, actual: usize },

    /// Encryption failed internally. Unreachable with a valid key and nonce.
    #[error("aead operation failed")]
    AeadFailure,

    /// The ciphertext did not verify: wrong key, tampered data, or wrong nonce.
    #[error("ciphertext failed authentication")]
    Authentication,
}

impl From<CipherError> for EngineError {
    fn from(e: CipherError) -> Self {
        EngineError::Cipher(e.to_string())
    }
}

enum Aead256 {
    XChaCha20Poly1305(XChaCha20Poly1305),
    Aes256GcmSiv(Aes256GcmSiv),
}

/// A keyed AEAD instance, built once per column transform and shared
/// read-only by every worker.
pub struct CipherEngine {
    suite: CipherSuite,
    aead: Aead256,
}

impl CipherEngine {
    /// Key a cipher for `suite`.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidKeyLength`] if the key cannot be used.
    pub fn new(suite: CipherSuite, key: &DerivedKey) -> Result<Self, CipherError> {
        Self::from_key_bytes(suite, key.as_bytes())
    }

    fn from_key_bytes(suite: CipherSuite, key: &[u8]) -> Result<Self, CipherError> {
        if key.len() != KEY_LEN {
            return Err(CipherError::InvalidKeyLength);
        }
        let aead = match suite {
            CipherSuite::XChaCha20Poly1305 => Aead256::XChaCha20Poly1305(
                XChaCha20Poly1305::new_from_slice(key).map_err(|_| CipherError::InvalidKeyLength)?,
            ),
            CipherSuite::Aes256GcmSiv => Aead256::Aes256GcmSiv(
                Aes256GcmSiv::new_from_slice(key).map_err(|_| CipherError::InvalidKeyLength)?,
            ),
        };
        Ok(Self { suite, aead })
    }

    pub fn suite(&self) -> CipherSuite {
        self.suite
    }

    fn check_nonce(&self, nonce: &[u8]) -> Result<(), CipherError> {
        let expected = self.suite.nonce_len();
        if nonce.len() != expected {
            return Err(CipherError::InvalidNonceLength {
                expected,
                actual: nonce.len(),
            });
        }
        Ok(())
    }

    /// Encrypt one value. The output is the ciphertext followed by the tag.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidNonceLength`] for a nonce from another
    /// suite, and [`CipherError::AeadFailure`] on an internal AEAD error.
    pub fn encrypt(&self, nonce: &Nonce, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let nonce = nonce.as_bytes();
        self.check_nonce(nonce)?;
        match &self.aead {
            Aead256::XChaCha20Poly1305(c) => c.encrypt(XNonce::from_slice(nonce), plaintext),
            Aead256::Aes256GcmSiv(c) => c.encrypt(aes_gcm_siv::Nonce::from_slice(nonce), plaintext),
        }
        .map_err(|_| CipherError::AeadFailure)
    }

    /// Decrypt and verify one value.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidNonceLength`] if the nonce has the wrong
    /// length and [`CipherError::Authentication`] if verification fails.
    pub fn decrypt(&self, nonce: &[u8], ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>, CipherError> {
        self.check_nonce(nonce)?;
        match &self.aead {
            Aead256::XChaCha20Poly1305(c) => c.decrypt(XNonce::from_slice(nonce), ciphertext),
            Aead256::Aes256GcmSiv(c) => c.decrypt(aes_gcm_siv::Nonce::from_slice(nonce), ciphertext),
        }
        .map(Zeroizing::new)
        .map_err(|_| CipherError::Authentication)
    }
}
