//! The two flow sequences: encrypt-and-upload, download-and-decrypt.
//!
//! Configuration is fixed at definition time — bucket, object key, region,
//! key namespace, and key name are constants, not options. The keyring is
//! rebuilt from the supplied raw key on every invocation; nothing is cached
//! across calls.
//!
//! Failure handling is deliberately absent: any error from key decoding,
//! keyring construction, encryption, or S3 propagates to `main` unhandled.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use materials::{AesWrappingAlg, CommitmentPolicy, EncryptionClient, RawAesKeyring};
use object_store::{ObjectLocation, ObjectStore};
use tracing::info;

/// Example payload encrypted by the upload flow.
pub const EXAMPLE_DATA: &[u8] = b"Hello World";

/// Bucket holding the example object.
pub const BUCKET_NAME: &str = "encryption-client-side-example-001";

/// Key of the example object.
pub const OBJECT_KEY: &str = "myfile.txt";

/// Region the bucket lives in.
pub const REGION: &str = "eu-west-3";

/// Namespace of the wrapping key.
pub const KEY_NAMESPACE: &str = "HSM_01";

/// Name of the wrapping key.
pub const KEY_NAME: &str = "AES_256_012";

/// Encryption context bound to the ciphertext on upload and verified as part
/// of header authentication on download.
pub fn encryption_context() -> BTreeMap<String, String> {
    BTreeMap::from([("example".to_owned(), "client-side raw key".to_owned())])
}

/// Decode the base64 key argument and build the keyring over it.
///
/// Runs before any S3 client is constructed, so a malformed key fails the
/// process without a network call.
///
/// # Errors
///
/// Returns an error on invalid base64; the keyring itself rejects key
/// material that is not exactly 32 bytes.
pub fn build_keyring(raw_key_b64: &str) -> Result<RawAesKeyring> {
    let raw_key = STANDARD
        .decode(raw_key_b64)
        .context("raw key is not valid base64")?;
    let keyring = RawAesKeyring::new(
        KEY_NAMESPACE,
        KEY_NAME,
        &raw_key,
        AesWrappingAlg::Aes256GcmIv12Tag16,
    )
    .context("failed to construct raw AES keyring")?;
    Ok(keyring)
}

/// Encrypt [`EXAMPLE_DATA`] under the fixed context and upload the envelope.
pub async fn encrypt_and_upload(raw_key_b64: &str) -> Result<()> {
    let keyring = build_keyring(raw_key_b64)?;
    let client = EncryptionClient::new(CommitmentPolicy::RequireEncryptRequireDecrypt);

    let envelope = client
        .encrypt(EXAMPLE_DATA, &keyring, &encryption_context())
        .context("encryption failed")?;
    info!(size = envelope.len(), "payload encrypted");

    let store = ObjectStore::new(REGION).await;
    let location = ObjectLocation::new(BUCKET_NAME, OBJECT_KEY);
    store.put(&location, envelope).await?;

    println!("Encrypted data uploaded to {location}");
    Ok(())
}

/// Download the envelope, decrypt it, and print the recovered plaintext.
pub async fn download_and_decrypt(raw_key_b64: &str) -> Result<()> {
    let keyring = build_keyring(raw_key_b64)?;
    let client = EncryptionClient::new(CommitmentPolicy::RequireEncryptRequireDecrypt);

    let store = ObjectStore::new(REGION).await;
    let location = ObjectLocation::new(BUCKET_NAME, OBJECT_KEY);
    let envelope = store.get(&location).await?;

    let (plaintext, header) = client
        .decrypt(&envelope, &keyring)
        .context("decryption failed")?;

    // Sanity check carried over from the original example: the recovered
    // context must contain the entry supplied at encrypt time.
    let expected = encryption_context();
    anyhow::ensure!(
        expected
            .iter()
            .all(|(k, v)| header.encryption_context.get(k) == Some(v)),
        "recovered encryption context does not match the expected entries"
    );

    let text = String::from_utf8(plaintext).context("decrypted payload is not valid UTF-8")?;
    println!("Decrypted plaintext: {text}");
    Ok(())
}
