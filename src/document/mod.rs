// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod github;
mod memory;

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StoreError;

pub use github::{GithubDocumentStore, GithubLocation};
pub use memory::MemoryDocumentStore;

/// Opaque concurrency token identifying one revision of a document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Revision(String);

impl Revision {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Document content together with the revision it was read at
#[derive(Debug, Clone)]
pub struct VersionedDocument {
    pub content: Bytes,
    pub revision: Revision,
}

/// A single document with optimistic-concurrency writes.
///
/// `write` must fail with [`StoreError::Conflict`] when `expected` is no
/// longer the current revision. The check and the write happen atomically
/// on the store side; implementations never retry.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read the current content and its revision
    async fn read(&self) -> Result<VersionedDocument, StoreError>;

    /// Replace the content if `expected` is still current, returning the new revision.
    ///
    /// `message` is recorded in the store's revision history.
    async fn write(
        &self,
        content: Bytes,
        expected: &Revision,
        message: &str,
    ) -> Result<Revision, StoreError>;
}
