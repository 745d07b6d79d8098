//! Versioned envelope framing for encrypted objects.
//!
//! # Envelope layout
//!
//! ```text
//! "SENV" | version u8 | header length u32 (big-endian) | header JSON | body
//! ```
//!
//! The header is a JSON document carrying the key identity, the wrapping
//! algorithm, the encryption context, the wrapped data key, and the key
//! commitment. The body is a 12-byte message IV followed by the AES-256-GCM
//! ciphertext of the payload, encrypted with the exact serialised header
//! bytes as associated data — so any header mutation (including a changed
//! encryption context) fails authentication at decrypt time.
//!
//! The version byte enables future algorithm or layout migration without
//! breaking stored objects.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::MaterialsError;
use crate::keyring::{WrappedDataKey, NONCE_LEN};

/// Magic bytes at the start of every envelope.
pub const MAGIC: [u8; 4] = *b"SENV";

/// Current envelope format version.
pub const VERSION: u8 = 1;

/// Length of the key-commitment value (HMAC-SHA256 output).
pub const COMMITMENT_LEN: usize = 32;

/// Parsed envelope header.
///
/// Binary fields are carried as standard base64 so the header stays a plain
/// JSON document. The `encryption_context` is a `BTreeMap` so serialisation
/// is deterministic — the header bytes double as AEAD associated data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeHeader {
    /// Namespace of the wrapping key that protected the data key.
    pub key_namespace: String,
    /// Name of the wrapping key that protected the data key.
    pub key_name: String,
    /// Wrapping algorithm identifier (see [`crate::AesWrappingAlg::id`]).
    pub wrapping_alg: String,
    /// Authenticated (non-secret) metadata bound to the ciphertext.
    pub encryption_context: BTreeMap<String, String>,
    /// Base64 of the 12-byte IV used to wrap the data key.
    pub data_key_iv: String,
    /// Base64 of the encrypted data key + tag.
    pub wrapped_data_key: String,
    /// Base64 of HMAC-SHA256(data key, commitment label).
    pub key_commitment: String,
}

impl EnvelopeHeader {
    /// Decode the wrapped-data-key fields back into a [`WrappedDataKey`].
    ///
    /// # Errors
    ///
    /// Returns [`MaterialsError::InvalidFormat`] on malformed base64 or a
    /// wrong-length IV.
    pub fn wrapped_data_key(&self) -> Result<WrappedDataKey, MaterialsError> {
        let iv_bytes = STANDARD
            .decode(&self.data_key_iv)
            .map_err(|_| MaterialsError::InvalidFormat("data key IV is not valid base64"))?;
        if iv_bytes.len() != NONCE_LEN {
            return Err(MaterialsError::InvalidFormat("data key IV has wrong length"));
        }
        let mut iv = [0u8; NONCE_LEN];
        iv.copy_from_slice(&iv_bytes);

        let ciphertext = STANDARD
            .decode(&self.wrapped_data_key)
            .map_err(|_| MaterialsError::InvalidFormat("wrapped data key is not valid base64"))?;

        Ok(WrappedDataKey { iv, ciphertext })
    }

    /// Decode the stored key commitment.
    ///
    /// # Errors
    ///
    /// Returns [`MaterialsError::InvalidFormat`] on malformed base64 or a
    /// wrong-length commitment.
    pub fn key_commitment(&self) -> Result<[u8; COMMITMENT_LEN], MaterialsError> {
        let bytes = STANDARD
            .decode(&self.key_commitment)
            .map_err(|_| MaterialsError::InvalidFormat("key commitment is not valid base64"))?;
        if bytes.len() != COMMITMENT_LEN {
            return Err(MaterialsError::InvalidFormat("key commitment has wrong length"));
        }
        let mut commitment = [0u8; COMMITMENT_LEN];
        commitment.copy_from_slice(&bytes);
        Ok(commitment)
    }
}

/// A decoded envelope, borrowing from the input bytes.
///
/// `header_bytes` is the exact serialised header slice — callers use it as
/// AEAD associated data when decrypting the body.
#[derive(Debug)]
pub struct ParsedEnvelope<'a> {
    /// Exact header bytes as they appear in the envelope.
    pub header_bytes: &'a [u8],
    /// Parsed header.
    pub header: EnvelopeHeader,
    /// Message IV + ciphertext + tag.
    pub body: &'a [u8],
}

/// Frame serialised header bytes and an encrypted body into envelope bytes.
pub fn encode(header_bytes: &[u8], body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(MAGIC.len() + 1 + 4 + header_bytes.len() + body.len());
    out.extend_from_slice(&MAGIC);
    out.push(VERSION);
    out.extend_from_slice(&(header_bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(header_bytes);
    out.extend_from_slice(body);
    out
}

/// Parse envelope bytes into header and body.
///
/// # Errors
///
/// Returns [`MaterialsError::InvalidFormat`] on truncated input, wrong magic,
/// an unsupported version, a header length exceeding the remaining input, or
/// a body shorter than one message IV. Returns [`MaterialsError::Header`] if
/// the header bytes are not a valid header document.
pub fn decode(bytes: &[u8]) -> Result<ParsedEnvelope<'_>, MaterialsError> {
    const PREAMBLE_LEN: usize = 4 + 1 + 4;

    if bytes.len() < PREAMBLE_LEN {
        return Err(MaterialsError::InvalidFormat("envelope is truncated"));
    }
    if bytes[..4] != MAGIC {
        return Err(MaterialsError::InvalidFormat("missing envelope magic"));
    }
    if bytes[4] != VERSION {
        return Err(MaterialsError::InvalidFormat("unsupported envelope version"));
    }

    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&bytes[5..9]);
    let header_len = u32::from_be_bytes(len_bytes) as usize;

    let rest = &bytes[PREAMBLE_LEN..];
    if header_len > rest.len() {
        return Err(MaterialsError::InvalidFormat("header length exceeds input"));
    }
    let (header_bytes, body) = rest.split_at(header_len);

    if body.len() < NONCE_LEN {
        return Err(MaterialsError::InvalidFormat("body shorter than message IV"));
    }

    let header: EnvelopeHeader = serde_json::from_slice(header_bytes)?;

    Ok(ParsedEnvelope {
        header_bytes,
        header,
        body,
    })
}
