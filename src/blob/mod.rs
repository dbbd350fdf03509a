mod fs;
mod key;

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::BlobError;

pub use fs::FsBlobStore;
pub use key::BlobKey;

/// A streaming upload body
pub type BlobStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Listing entry for a stored object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobObject {
    pub key: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
    pub content_type: String,
    /// `sha256:<hex>` of the stored bytes
    pub content_hash: String,
}

/// Object storage for uploaded audio
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `body` under `key`, replacing any existing object
    async fn put(
        &self,
        key: &BlobKey,
        body: BlobStream,
        content_type: &str,
    ) -> Result<BlobObject, BlobError>;

    /// All stored objects, most recently uploaded first
    async fn list(&self) -> Result<Vec<BlobObject>, BlobError>;
}
