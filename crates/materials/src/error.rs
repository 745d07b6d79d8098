//! Error types for the materials layer.

use thiserror::Error;

use crate::keyring::KEY_LEN;

/// Errors produced by keyring construction, envelope handling, and the
/// encrypt/decrypt client.
#[derive(Debug, Error)]
pub enum MaterialsError {
    /// The supplied key is the wrong length (must be [`KEY_LEN`] bytes).
    #[error("invalid key length: expected {KEY_LEN} bytes, got {0}")]
    InvalidKeyLength(usize),

    /// A key namespace or key name was empty.
    #[error("{0} must not be empty")]
    EmptyKeyIdentifier(&'static str),

    /// The envelope names a wrapping key this keyring does not hold.
    #[error("no matching wrapping key for {namespace}/{name}")]
    NoMatchingKey {
        /// Key namespace named in the envelope header.
        namespace: String,
        /// Key name named in the envelope header.
        name: String,
    },

    /// The envelope names a wrapping algorithm this keyring does not support.
    #[error("unsupported wrapping algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// AES-GCM encryption or decryption failed (wrong key or tampered data).
    #[error("aead operation failed")]
    AeadFailure,

    /// The stored key commitment does not match the unwrapped data key.
    #[error("key commitment verification failed")]
    CommitmentMismatch,

    /// The envelope bytes do not match the expected framing.
    #[error("invalid envelope format: {0}")]
    InvalidFormat(&'static str),

    /// The envelope header could not be serialised or deserialised.
    #[error("envelope header serialisation failed: {0}")]
    Header(#[from] serde_json::Error),

    /// An unexpected internal error occurred.
    #[error("internal error: {0}")]
    Internal(&'static str),
}
