//! S3 object store wrapper: put and get of opaque byte blobs.
//!
//! The ciphertext envelope is treated as an indivisible blob — this crate
//! never inspects or parses what it stores. All SDK errors propagate to the
//! caller with context attached; there are no retries beyond what the SDK
//! itself performs.

use anyhow::{Context, Result};
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::primitives::ByteStream;
use tracing::info;

/// A (bucket, object key) pair identifying where a blob lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    /// S3 bucket name.
    pub bucket: String,
    /// Object key within the bucket.
    pub key: String,
}

impl ObjectLocation {
    /// Construct a location from a bucket and key.
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl std::fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// S3 client wrapper scoped to a single region.
#[derive(Clone)]
pub struct ObjectStore {
    s3: aws_sdk_s3::Client,
}

impl ObjectStore {
    /// Initialise an S3 client for `region`.
    ///
    /// Credentials are resolved via the standard AWS credential chain
    /// (environment, shared config, instance role).
    pub async fn new(region: &str) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_owned()))
            .load()
            .await;
        Self {
            s3: aws_sdk_s3::Client::new(&config),
        }
    }

    /// Store `bytes` at `location`, overwriting any existing object.
    ///
    /// # Errors
    ///
    /// Returns an error if the S3 put fails (network failure, missing bucket,
    /// denied access).
    pub async fn put(&self, location: &ObjectLocation, bytes: Vec<u8>) -> Result<()> {
        let size = bytes.len();
        self.s3
            .put_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .with_context(|| format!("failed to upload object to {location}"))?;
        info!(location = %location, size, "object uploaded");
        Ok(())
    }

    /// Fetch the blob stored at `location`.
    ///
    /// # Errors
    ///
    /// Returns an error if the object does not exist or the S3 get fails.
    pub async fn get(&self, location: &ObjectLocation) -> Result<Vec<u8>> {
        let response = self
            .s3
            .get_object()
            .bucket(&location.bucket)
            .key(&location.key)
            .send()
            .await
            .with_context(|| format!("failed to fetch object from {location}"))?;

        let bytes = response
            .body
            .collect()
            .await
            .with_context(|| format!("failed to read object body from {location}"))?
            .into_bytes()
            .to_vec();

        info!(location = %location, size = bytes.len(), "object downloaded");
        Ok(bytes)
    }
}

impl std::fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStore").finish_non_exhaustive()
    }
}
