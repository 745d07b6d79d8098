//! [`RawAesKeyring`]: wraps per-message data keys under a caller-supplied
//! 256-bit AES key.
//!
//! The keyring never sees the message payload. Its only job is to protect the
//! data key: `wrap_data_key` encrypts a fresh data key under the wrapping key
//! with AES-256-GCM, and `unwrap_data_key` recovers it on the decrypt path.
//! The key namespace and name are bound into the wrap as associated data, so
//! a wrapped key cannot be silently re-attributed to a different key identity.

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng, Payload},
    Aes256Gcm, Nonce,
};
use serde::{Deserialize, Serialize};

use crate::error::MaterialsError;

/// Byte length of an AES-256 key (32 bytes = 256 bits).
pub const KEY_LEN: usize = 32;

/// Byte length of an AES-GCM IV (12 bytes = 96 bits).
pub const NONCE_LEN: usize = 12;

/// Wrapping algorithms a [`RawAesKeyring`] can apply to data keys.
///
/// A single variant today; the envelope header records the identifier so the
/// set can grow without breaking stored ciphertext.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AesWrappingAlg {
    /// AES-256-GCM with a 12-byte IV and a 16-byte authentication tag.
    Aes256GcmIv12Tag16,
}

impl AesWrappingAlg {
    /// Stable identifier recorded in the envelope header.
    pub fn id(self) -> &'static str {
        match self {
            AesWrappingAlg::Aes256GcmIv12Tag16 => "AES256_GCM_IV12_TAG16",
        }
    }

    /// Parse a header identifier back into an algorithm.
    ///
    /// # Errors
    ///
    /// Returns [`MaterialsError::UnsupportedAlgorithm`] for unknown identifiers.
    pub fn from_id(id: &str) -> Result<Self, MaterialsError> {
        match id {
            "AES256_GCM_IV12_TAG16" => Ok(AesWrappingAlg::Aes256GcmIv12Tag16),
            other => Err(MaterialsError::UnsupportedAlgorithm(other.to_owned())),
        }
    }
}

/// Fixed-size buffer holding the plaintext wrapping key.
///
/// The memory is overwritten with zeroes on drop to minimise the window
/// during which raw key material lives in RAM.
#[derive(Clone)]
pub struct WrappingKey(Box<[u8; KEY_LEN]>);

impl WrappingKey {
    /// Copy `key_bytes` into a new buffer.
    ///
    /// # Errors
    ///
    /// Returns [`MaterialsError::InvalidKeyLength`] if the slice is not
    /// exactly [`KEY_LEN`] bytes.
    pub fn new(key_bytes: &[u8]) -> Result<Self, MaterialsError> {
        if key_bytes.len() != KEY_LEN {
            return Err(MaterialsError::InvalidKeyLength(key_bytes.len()));
        }
        let mut buf = Box::new([0u8; KEY_LEN]);
        buf.copy_from_slice(key_bytes);
        Ok(Self(buf))
    }
}

impl Drop for WrappingKey {
    fn drop(&mut self) {
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

impl std::fmt::Debug for WrappingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material — not even in debug builds.
        f.write_str("WrappingKey([REDACTED])")
    }
}

/// Fixed-size buffer holding a plaintext per-message data key.
///
/// Same zero-on-drop and `Debug`-redaction treatment as [`WrappingKey`].
pub struct DataKey(Box<[u8; KEY_LEN]>);

impl DataKey {
    /// Generate a fresh data key from the OS CSPRNG.
    pub fn generate() -> Self {
        use aes_gcm::aead::rand_core::RngCore;
        let mut buf = Box::new([0u8; KEY_LEN]);
        OsRng.fill_bytes(&mut buf[..]);
        Self(buf)
    }

    fn from_slice(bytes: &[u8]) -> Result<Self, MaterialsError> {
        if bytes.len() != KEY_LEN {
            return Err(MaterialsError::InvalidKeyLength(bytes.len()));
        }
        let mut buf = Box::new([0u8; KEY_LEN]);
        buf.copy_from_slice(bytes);
        Ok(Self(buf))
    }
}

impl AsRef<[u8]> for DataKey {
    fn as_ref(&self) -> &[u8] {
        &self.0[..]
    }
}

impl Drop for DataKey {
    fn drop(&mut self) {
        self.0.iter_mut().for_each(|b| *b = 0);
    }
}

impl std::fmt::Debug for DataKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DataKey([REDACTED])")
    }
}

/// A data key encrypted under the keyring's wrapping key.
///
/// `ciphertext` carries the AES-GCM output including the 16-byte tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedDataKey {
    /// IV used for the wrap operation.
    pub iv: [u8; NONCE_LEN],
    /// Encrypted data key + authentication tag.
    pub ciphertext: Vec<u8>,
}

/// A keyring holding exactly one raw AES-256 wrapping key.
///
/// Immutable once constructed; scoped to a single flow invocation.
pub struct RawAesKeyring {
    key_namespace: String,
    key_name: String,
    wrapping_key: WrappingKey,
    wrapping_alg: AesWrappingAlg,
}

impl RawAesKeyring {
    /// Construct a keyring from static configuration and raw key bytes.
    ///
    /// # Errors
    ///
    /// Returns [`MaterialsError::EmptyKeyIdentifier`] if the namespace or
    /// name is empty, and [`MaterialsError::InvalidKeyLength`] if the key is
    /// not exactly [`KEY_LEN`] bytes.
    pub fn new(
        key_namespace: impl Into<String>,
        key_name: impl Into<String>,
        wrapping_key_bytes: &[u8],
        wrapping_alg: AesWrappingAlg,
    ) -> Result<Self, MaterialsError> {
        let key_namespace = key_namespace.into();
        let key_name = key_name.into();
        if key_namespace.trim().is_empty() {
            return Err(MaterialsError::EmptyKeyIdentifier("key namespace"));
        }
        if key_name.trim().is_empty() {
            return Err(MaterialsError::EmptyKeyIdentifier("key name"));
        }
        Ok(Self {
            key_namespace,
            key_name,
            wrapping_key: WrappingKey::new(wrapping_key_bytes)?,
            wrapping_alg,
        })
    }

    /// Namespace grouping related wrapping keys.
    pub fn key_namespace(&self) -> &str {
        &self.key_namespace
    }

    /// Name of this specific wrapping key.
    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    /// Algorithm this keyring applies to data keys.
    pub fn wrapping_alg(&self) -> AesWrappingAlg {
        self.wrapping_alg
    }

    /// Encrypt `data_key` under the wrapping key with a fresh random IV.
    ///
    /// The key namespace and name are supplied as associated data, so the
    /// wrap authenticates the key identity as well as the key bytes.
    ///
    /// # Errors
    ///
    /// Returns [`MaterialsError::AeadFailure`] on an internal AEAD error
    /// (should be unreachable with a valid key and IV).
    pub fn wrap_data_key(&self, data_key: &DataKey) -> Result<WrappedDataKey, MaterialsError> {
        let cipher = self.cipher()?;

        use aes_gcm::aead::rand_core::RngCore;
        let mut iv = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut iv);

        let aad = self.wrap_aad();
        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&iv),
                Payload {
                    msg: data_key.as_ref(),
                    aad: &aad,
                },
            )
            .map_err(|_| MaterialsError::AeadFailure)?;

        Ok(WrappedDataKey { iv, ciphertext })
    }

    /// Decrypt a wrapped data key produced by an equivalent keyring.
    ///
    /// `namespace` and `name` come from the envelope header; they must match
    /// this keyring's identity before any cryptography is attempted.
    ///
    /// # Errors
    ///
    /// Returns [`MaterialsError::NoMatchingKey`] on an identity mismatch and
    /// [`MaterialsError::AeadFailure`] if authentication fails (wrong key or
    /// tampered wrap).
    pub fn unwrap_data_key(
        &self,
        wrapped: &WrappedDataKey,
        namespace: &str,
        name: &str,
    ) -> Result<DataKey, MaterialsError> {
        if namespace != self.key_namespace || name != self.key_name {
            return Err(MaterialsError::NoMatchingKey {
                namespace: namespace.to_owned(),
                name: name.to_owned(),
            });
        }

        let cipher = self.cipher()?;
        let aad = self.wrap_aad();
        let plaintext = cipher
            .decrypt(
                Nonce::from_slice(&wrapped.iv),
                Payload {
                    msg: wrapped.ciphertext.as_ref(),
                    aad: &aad,
                },
            )
            .map_err(|_| MaterialsError::AeadFailure)?;

        DataKey::from_slice(&plaintext)
    }

    fn cipher(&self) -> Result<Aes256Gcm, MaterialsError> {
        Aes256Gcm::new_from_slice(&self.wrapping_key.0[..])
            .map_err(|_| MaterialsError::InvalidKeyLength(KEY_LEN))
    }

    /// Associated data for the wrap: `namespace \0 name`.
    fn wrap_aad(&self) -> Vec<u8> {
        let mut aad =
            Vec::with_capacity(self.key_namespace.len() + 1 + self.key_name.len());
        aad.extend_from_slice(self.key_namespace.as_bytes());
        aad.push(0);
        aad.extend_from_slice(self.key_name.as_bytes());
        aad
    }
}

impl std::fmt::Debug for RawAesKeyring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawAesKeyring")
            .field("key_namespace", &self.key_namespace)
            .field("key_name", &self.key_name)
            .field("wrapping_key", &self.wrapping_key)
            .field("wrapping_alg", &self.wrapping_alg)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn random_key() -> Vec<u8> {
        use aes_gcm::aead::rand_core::RngCore;
        let mut key = vec![0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        key
    }

    fn keyring(key: &[u8]) -> RawAesKeyring {
        RawAesKeyring::new("HSM_01", "AES_256_012", key, AesWrappingAlg::Aes256GcmIv12Tag16)
            .unwrap()
    }

    #[test]
    fn wrap_unwrap_round_trip() {
        let ring = keyring(&random_key());
        let data_key = DataKey::generate();
        let wrapped = ring.wrap_data_key(&data_key).unwrap();
        let unwrapped = ring
            .unwrap_data_key(&wrapped, "HSM_01", "AES_256_012")
            .unwrap();
        assert_eq!(unwrapped.as_ref(), data_key.as_ref());
    }

    #[test]
    fn rejects_wrong_key_length() {
        let short = vec![0u8; 16];
        let result = RawAesKeyring::new(
            "ns",
            "name",
            &short,
            AesWrappingAlg::Aes256GcmIv12Tag16,
        );
        assert!(matches!(result, Err(MaterialsError::InvalidKeyLength(16))));
    }

    #[test]
    fn rejects_empty_identifiers() {
        let key = random_key();
        assert!(
            RawAesKeyring::new("", "name", &key, AesWrappingAlg::Aes256GcmIv12Tag16).is_err()
        );
        assert!(
            RawAesKeyring::new("ns", "  ", &key, AesWrappingAlg::Aes256GcmIv12Tag16).is_err()
        );
    }

    #[test]
    fn unwrap_with_mismatched_identity_fails() {
        let ring = keyring(&random_key());
        let wrapped = ring.wrap_data_key(&DataKey::generate()).unwrap();
        let result = ring.unwrap_data_key(&wrapped, "HSM_02", "AES_256_012");
        assert!(matches!(result, Err(MaterialsError::NoMatchingKey { .. })));
    }

    #[test]
    fn unwrap_with_different_wrapping_key_fails() {
        let ring1 = keyring(&random_key());
        let ring2 = keyring(&random_key());
        let wrapped = ring1.wrap_data_key(&DataKey::generate()).unwrap();
        let result = ring2.unwrap_data_key(&wrapped, "HSM_01", "AES_256_012");
        assert!(matches!(result, Err(MaterialsError::AeadFailure)));
    }

    #[test]
    fn tampered_wrap_fails_auth() {
        let ring = keyring(&random_key());
        let mut wrapped = ring.wrap_data_key(&DataKey::generate()).unwrap();
        wrapped.ciphertext[0] ^= 0xFF;
        let result = ring.unwrap_data_key(&wrapped, "HSM_01", "AES_256_012");
        assert!(matches!(result, Err(MaterialsError::AeadFailure)));
    }

    #[test]
    fn alg_id_round_trip() {
        let alg = AesWrappingAlg::Aes256GcmIv12Tag16;
        assert_eq!(AesWrappingAlg::from_id(alg.id()).unwrap(), alg);
        assert!(matches!(
            AesWrappingAlg::from_id("AES128_CBC"),
            Err(MaterialsError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn key_buffers_redacted_in_debug() {
        let key = WrappingKey::new(&[0xAB; KEY_LEN]).unwrap();
        assert!(format!("{key:?}").contains("REDACTED"));
        let dk = DataKey::generate();
        assert!(format!("{dk:?}").contains("REDACTED"));
    }
}
