// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};

use crate::error::StoreError;

use super::{DocumentStore, Revision, VersionedDocument};

#[derive(Debug)]
struct State {
    content: Bytes,
    revision: Revision,
    history: Vec<String>,
}

/// In-process document store, revisioned by the sha256 of its content
#[derive(Debug)]
pub struct MemoryDocumentStore {
    state: Mutex<State>,
}

impl MemoryDocumentStore {
    pub fn new(content: impl Into<Bytes>) -> Self {
        let content = content.into();
        let revision = content_revision(&content);
        Self {
            state: Mutex::new(State {
                content,
                revision,
                history: Vec::new(),
            }),
        }
    }

    /// Commit messages of every successful write, oldest first
    pub fn history(&self) -> Vec<String> {
        self.lock().map(|s| s.history.clone()).unwrap_or_default()
    }

    /// Current content, bypassing revision tracking
    pub fn content(&self) -> Bytes {
        self.lock().map(|s| s.content.clone()).unwrap_or_default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, State>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }
}

fn content_revision(content: &[u8]) -> Revision {
    Revision::new(format!("{:x}", Sha256::digest(content)))
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn read(&self) -> Result<VersionedDocument, StoreError> {
        let state = self.lock()?;
        Ok(VersionedDocument {
            content: state.content.clone(),
            revision: state.revision.clone(),
        })
    }

    async fn write(
        &self,
        content: Bytes,
        expected: &Revision,
        message: &str,
    ) -> Result<Revision, StoreError> {
        let mut state = self.lock()?;
        if &state.revision != expected {
            return Err(StoreError::Conflict {
                expected: expected.to_string(),
            });
        }

        // Distinct from the previous token even when the content is unchanged,
        // like a commit in a version-controlled repository
        let mut hasher = Sha256::new();
        hasher.update(state.revision.as_str().as_bytes());
        hasher.update(&content);
        let revision = Revision::new(format!("{:x}", hasher.finalize()));

        state.content = content;
        state.revision = revision.clone();
        state.history.push(message.to_string());
        Ok(revision)
    }
}
