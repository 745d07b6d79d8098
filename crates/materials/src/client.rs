//! [`EncryptionClient`]: envelope encrypt/decrypt with key commitment.
//!
//! Per message the client generates a fresh 256-bit data key, encrypts the
//! payload under it, asks the keyring to wrap the data key, and records an
//! HMAC-SHA256 commitment to the data key in the envelope header. The
//! commitment is verified again at decrypt time, so a ciphertext cannot be
//! silently re-bound to a different data key.

use std::collections::BTreeMap;

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng, Payload},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::envelope::{self, EnvelopeHeader, COMMITMENT_LEN};
use crate::error::MaterialsError;
use crate::keyring::{AesWrappingAlg, DataKey, RawAesKeyring, NONCE_LEN};

/// Label under which the data-key commitment is computed.
const COMMITMENT_LABEL: &[u8] = b"s3-envelope/v1 key commitment";

/// Key-commitment enforcement policy.
///
/// A single variant: commitment is written at encrypt time and verified at
/// decrypt time. Kept as an enum so a relaxed policy could be added without
/// changing the client API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CommitmentPolicy {
    /// Write the commitment on encrypt, verify it on decrypt.
    #[default]
    RequireEncryptRequireDecrypt,
}

/// Envelope encryption client over a [`RawAesKeyring`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EncryptionClient {
    commitment_policy: CommitmentPolicy,
}

impl EncryptionClient {
    /// Construct a client with the given commitment policy.
    pub fn new(commitment_policy: CommitmentPolicy) -> Self {
        Self { commitment_policy }
    }

    /// The policy this client enforces.
    pub fn commitment_policy(&self) -> CommitmentPolicy {
        self.commitment_policy
    }

    /// Encrypt `plaintext` under a fresh data key and frame the envelope.
    ///
    /// The encryption context is recorded in the header and authenticated:
    /// the serialised header bytes are the associated data for the body
    /// encryption. Fresh IVs per call mean two encryptions of the same
    /// plaintext never produce the same envelope.
    ///
    /// # Errors
    ///
    /// Returns [`MaterialsError`] if data-key wrapping, header serialisation,
    /// or the body encryption fails.
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        keyring: &RawAesKeyring,
        encryption_context: &BTreeMap<String, String>,
    ) -> Result<Vec<u8>, MaterialsError> {
        let data_key = DataKey::generate();
        let commitment = key_commitment(&data_key)?;
        let wrapped = keyring.wrap_data_key(&data_key)?;

        let header = EnvelopeHeader {
            key_namespace: keyring.key_namespace().to_owned(),
            key_name: keyring.key_name().to_owned(),
            wrapping_alg: keyring.wrapping_alg().id().to_owned(),
            encryption_context: encryption_context.clone(),
            data_key_iv: STANDARD.encode(wrapped.iv),
            wrapped_data_key: STANDARD.encode(&wrapped.ciphertext),
            key_commitment: STANDARD.encode(commitment),
        };
        let header_bytes = serde_json::to_vec(&header)?;

        let cipher = body_cipher(&data_key)?;
        use aes_gcm::aead::rand_core::RngCore;
        let mut iv = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut iv);

        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&iv),
                Payload {
                    msg: plaintext,
                    aad: &header_bytes,
                },
            )
            .map_err(|_| MaterialsError::AeadFailure)?;

        let mut body = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        body.extend_from_slice(&iv);
        body.extend_from_slice(&ciphertext);

        Ok(envelope::encode(&header_bytes, &body))
    }

    /// Decrypt an envelope produced by [`EncryptionClient::encrypt`].
    ///
    /// Returns the recovered plaintext together with the verified header, so
    /// the caller can inspect the authenticated encryption context.
    ///
    /// # Errors
    ///
    /// Returns [`MaterialsError::InvalidFormat`] on malformed envelopes,
    /// [`MaterialsError::NoMatchingKey`] /
    /// [`MaterialsError::UnsupportedAlgorithm`] when the keyring cannot
    /// service the header, [`MaterialsError::CommitmentMismatch`] if the
    /// stored commitment does not match the unwrapped data key, and
    /// [`MaterialsError::AeadFailure`] on any authentication failure (wrong
    /// key, tampered header or body).
    pub fn decrypt(
        &self,
        envelope_bytes: &[u8],
        keyring: &RawAesKeyring,
    ) -> Result<(Vec<u8>, EnvelopeHeader), MaterialsError> {
        let parsed = envelope::decode(envelope_bytes)?;

        let alg = AesWrappingAlg::from_id(&parsed.header.wrapping_alg)?;
        if alg != keyring.wrapping_alg() {
            return Err(MaterialsError::UnsupportedAlgorithm(
                parsed.header.wrapping_alg.clone(),
            ));
        }

        let wrapped = parsed.header.wrapped_data_key()?;
        let data_key = keyring.unwrap_data_key(
            &wrapped,
            &parsed.header.key_namespace,
            &parsed.header.key_name,
        )?;

        // CommitmentPolicy::RequireEncryptRequireDecrypt: verify on this path too.
        let expected = key_commitment(&data_key)?;
        let stored = parsed.header.key_commitment()?;
        if !bool::from(expected[..].ct_eq(&stored[..])) {
            return Err(MaterialsError::CommitmentMismatch);
        }

        let (iv, ciphertext) = parsed.body.split_at(NONCE_LEN);
        let cipher = body_cipher(&data_key)?;
        let plaintext = cipher
            .decrypt(
                Nonce::from_slice(iv),
                Payload {
                    msg: ciphertext,
                    aad: parsed.header_bytes,
                },
            )
            .map_err(|_| MaterialsError::AeadFailure)?;

        Ok((plaintext, parsed.header))
    }
}

fn body_cipher(data_key: &DataKey) -> Result<Aes256Gcm, MaterialsError> {
    Aes256Gcm::new_from_slice(data_key.as_ref())
        .map_err(|_| MaterialsError::Internal("data key has wrong length for cipher"))
}

/// HMAC-SHA256 commitment to the data key under a fixed label.
fn key_commitment(data_key: &DataKey) -> Result<[u8; COMMITMENT_LEN], MaterialsError> {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(data_key.as_ref())
        .map_err(|_| MaterialsError::Internal("hmac rejected data key"))?;
    mac.update(COMMITMENT_LABEL);
    let mut commitment = [0u8; COMMITMENT_LEN];
    commitment.copy_from_slice(&mac.finalize().into_bytes());
    Ok(commitment)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAMESPACE: &str = "HSM_01";
    const NAME: &str = "AES_256_012";

    fn random_key() -> Vec<u8> {
        use aes_gcm::aead::rand_core::RngCore;
        let mut key = vec![0u8; crate::keyring::KEY_LEN];
        OsRng.fill_bytes(&mut key);
        key
    }

    fn keyring(key: &[u8]) -> RawAesKeyring {
        RawAesKeyring::new(NAMESPACE, NAME, key, AesWrappingAlg::Aes256GcmIv12Tag16).unwrap()
    }

    fn example_context() -> BTreeMap<String, String> {
        BTreeMap::from([("example".to_owned(), "client-side raw key".to_owned())])
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let key = random_key();
        let client = EncryptionClient::default();
        let plaintext = b"Hello World";

        let envelope = client
            .encrypt(plaintext, &keyring(&key), &example_context())
            .unwrap();
        let (decrypted, _) = client.decrypt(&envelope, &keyring(&key)).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn ciphertext_differs_from_plaintext() {
        let client = EncryptionClient::default();
        let plaintext = b"Hello World";
        let envelope = client
            .encrypt(plaintext, &keyring(&random_key()), &example_context())
            .unwrap();
        // The envelope must not contain the plaintext anywhere.
        assert!(!envelope
            .windows(plaintext.len())
            .any(|window| window == plaintext));
    }

    #[test]
    fn encryption_is_nondeterministic() {
        let key = random_key();
        let client = EncryptionClient::default();
        let ctx = example_context();

        let a = client.encrypt(b"same input", &keyring(&key), &ctx).unwrap();
        let b = client.encrypt(b"same input", &keyring(&key), &ctx).unwrap();
        assert_ne!(a, b);

        let c = client
            .encrypt(b"same input", &keyring(&random_key()), &ctx)
            .unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn wrong_key_fails_never_returns_wrong_plaintext() {
        let client = EncryptionClient::default();
        let envelope = client
            .encrypt(b"secret", &keyring(&random_key()), &example_context())
            .unwrap();
        let result = client.decrypt(&envelope, &keyring(&random_key()));
        assert!(matches!(result, Err(MaterialsError::AeadFailure)));
    }

    #[test]
    fn recovered_context_matches_supplied_context() {
        let key = random_key();
        let client = EncryptionClient::default();
        let ctx = example_context();

        let envelope = client.encrypt(b"Hello World", &keyring(&key), &ctx).unwrap();
        let (_, header) = client.decrypt(&envelope, &keyring(&key)).unwrap();
        assert_eq!(header.encryption_context, ctx);
    }

    #[test]
    fn tampered_body_fails_auth() {
        let key = random_key();
        let client = EncryptionClient::default();
        let mut envelope = client
            .encrypt(b"tamper me", &keyring(&key), &example_context())
            .unwrap();
        let last = envelope.len() - 1;
        envelope[last] ^= 0xFF;
        assert!(client.decrypt(&envelope, &keyring(&key)).is_err());
    }

    #[test]
    fn tampered_context_fails_auth() {
        let key = random_key();
        let client = EncryptionClient::default();
        let mut envelope = client
            .encrypt(b"bound to context", &keyring(&key), &example_context())
            .unwrap();
        // Mutate a byte inside the header's context value. The body was
        // encrypted with the header bytes as AAD, so this must fail.
        let needle = b"client-side";
        let pos = envelope
            .windows(needle.len())
            .position(|w| w == needle)
            .unwrap();
        envelope[pos] = b'X';
        assert!(client.decrypt(&envelope, &keyring(&key)).is_err());
    }

    #[test]
    fn forged_commitment_is_rejected() {
        let key = random_key();
        let ring = keyring(&key);
        let client = EncryptionClient::default();

        // Build an otherwise-consistent envelope whose header commits to the
        // wrong value.
        let data_key = DataKey::generate();
        let wrapped = ring.wrap_data_key(&data_key).unwrap();
        let header = EnvelopeHeader {
            key_namespace: NAMESPACE.into(),
            key_name: NAME.into(),
            wrapping_alg: AesWrappingAlg::Aes256GcmIv12Tag16.id().to_owned(),
            encryption_context: example_context(),
            data_key_iv: STANDARD.encode(wrapped.iv),
            wrapped_data_key: STANDARD.encode(&wrapped.ciphertext),
            key_commitment: STANDARD.encode([0u8; COMMITMENT_LEN]),
        };
        let header_bytes = serde_json::to_vec(&header).unwrap();

        let cipher = Aes256Gcm::new_from_slice(data_key.as_ref()).unwrap();
        let iv = [7u8; NONCE_LEN];
        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&iv),
                Payload {
                    msg: b"forged".as_ref(),
                    aad: &header_bytes,
                },
            )
            .unwrap();
        let mut body = iv.to_vec();
        body.extend_from_slice(&ciphertext);
        let forged = envelope::encode(&header_bytes, &body);

        let result = client.decrypt(&forged, &ring);
        assert!(matches!(result, Err(MaterialsError::CommitmentMismatch)));
    }

    #[test]
    fn empty_plaintext_round_trips() {
        let key = random_key();
        let client = EncryptionClient::default();
        let envelope = client
            .encrypt(b"", &keyring(&key), &example_context())
            .unwrap();
        let (decrypted, _) = client.decrypt(&envelope, &keyring(&key)).unwrap();
        assert!(decrypted.is_empty());
    }
}
