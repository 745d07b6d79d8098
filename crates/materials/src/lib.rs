//! Cryptographic materials for client-side envelope encryption.
//!
//! This crate owns everything between "raw key bytes in" and "opaque
//! ciphertext blob out":
//!
//! - [`RawAesKeyring`] — wraps and unwraps per-message data keys under a
//!   caller-supplied 256-bit AES key, identified by a key namespace and name.
//! - [`EncryptionClient`] — generates a fresh data key per message, encrypts
//!   the payload under it, and frames everything into a versioned envelope
//!   whose header carries the encryption context and the wrapped data key.
//! - [`CommitmentPolicy`] — requires key-commitment verification on both the
//!   encrypt and decrypt paths.
//!
//! # Module invariants
//!
//! - **No AWS dependencies.** Object storage is a separate concern; this
//!   crate never performs I/O.
//! - Plaintext key material lives only in [`keyring::WrappingKey`] and
//!   [`keyring::DataKey`] buffers, which zero on drop and redact `Debug`.

pub mod client;
pub mod envelope;
pub mod error;
pub mod keyring;

pub use client::{CommitmentPolicy, EncryptionClient};
pub use envelope::EnvelopeHeader;
pub use error::MaterialsError;
pub use keyring::{AesWrappingAlg, RawAesKeyring, KEY_LEN};
