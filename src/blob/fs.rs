// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::error::BlobError;

use super::{BlobKey, BlobObject, BlobStore, BlobStream};

const PARTIAL_SUFFIX: &str = ".partial";
const METADATA_SUFFIX: &str = ".json";

/// Blob store keeping each object as a file plus a `<key>.json` metadata sidecar.
///
/// Uploads stream into a uniquely named `.partial` file that is renamed into
/// place once complete, so readers never observe a half-written object.
#[derive(Debug)]
pub struct FsBlobStore {
    root: PathBuf,
    upload_seq: AtomicU64,
    partial_files_cleaned: usize,
}

impl FsBlobStore {
    /// Open (creating if needed) a store rooted at `root`.
    ///
    /// Leftover `.partial` files from interrupted uploads are removed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, BlobError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| BlobError::CreateDirectoryFailed {
            path: root.clone(),
            source: e,
        })?;

        let entries = std::fs::read_dir(&root).map_err(|e| BlobError::ReadDirectoryFailed {
            path: root.clone(),
            source: e,
        })?;

        let mut partial_files_cleaned = 0;
        for entry in entries {
            let entry = entry.map_err(|e| BlobError::ReadDirectoryFailed {
                path: root.clone(),
                source: e,
            })?;
            let path = entry.path();
            let is_partial = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(PARTIAL_SUFFIX));

            if is_partial && std::fs::remove_file(&path).is_ok() {
                partial_files_cleaned += 1;
            }
        }

        Ok(Self {
            root,
            upload_seq: AtomicU64::new(0),
            partial_files_cleaned,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of interrupted uploads removed when the store was opened
    pub fn partial_files_cleaned(&self) -> usize {
        self.partial_files_cleaned
    }

    fn partial_path(&self, name: &str) -> PathBuf {
        let seq = self.upload_seq.fetch_add(1, Ordering::Relaxed);
        self.root
            .join(format!("{name}.{}.{seq}{PARTIAL_SUFFIX}", std::process::id()))
    }

    fn metadata_path(&self, key: &BlobKey) -> PathBuf {
        self.root.join(format!("{key}{METADATA_SUFFIX}"))
    }

    /// Stream the body into `path`, returning its size and content hash
    async fn write_body(
        &self,
        key: &BlobKey,
        mut body: BlobStream,
        path: &Path,
    ) -> Result<(u64, String), BlobError> {
        let mut file = File::create(path)
            .await
            .map_err(|e| BlobError::WriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;

        let mut hasher = Sha256::new();
        let mut size: u64 = 0;

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| BlobError::StreamFailed {
                key: key.to_string(),
                source: e,
            })?;

            hasher.update(&chunk);
            file.write_all(&chunk)
                .await
                .map_err(|e| BlobError::WriteFailed {
                    path: path.to_path_buf(),
                    source: e,
                })?;
            size += chunk.len() as u64;
        }

        file.flush().await.map_err(|e| BlobError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok((size, format!("sha256:{:x}", hasher.finalize())))
    }

    async fn write_atomically(
        &self,
        target: &Path,
        partial: &Path,
        data: &[u8],
    ) -> Result<(), BlobError> {
        tokio::fs::write(partial, data)
            .await
            .map_err(|e| BlobError::WriteFailed {
                path: partial.to_path_buf(),
                source: e,
            })?;
        tokio::fs::rename(partial, target)
            .await
            .map_err(|e| BlobError::WriteFailed {
                path: target.to_path_buf(),
                source: e,
            })
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(
        &self,
        key: &BlobKey,
        body: BlobStream,
        content_type: &str,
    ) -> Result<BlobObject, BlobError> {
        let object_path = self.root.join(key.as_str());
        let partial = self.partial_path(key.as_str());

        let written = match self.write_body(key, body, &partial).await {
            Ok(written) => written,
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(e);
            }
        };
        let (size, content_hash) = written;

        if let Err(e) = tokio::fs::rename(&partial, &object_path).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(BlobError::WriteFailed {
                path: object_path,
                source: e,
            });
        }

        let object = BlobObject {
            key: key.to_string(),
            size,
            uploaded_at: Utc::now(),
            content_type: content_type.to_string(),
            content_hash,
        };

        let metadata = serde_json::to_vec_pretty(&object)?;
        let metadata_partial = self.partial_path(&format!("{key}{METADATA_SUFFIX}"));
        self.write_atomically(&self.metadata_path(key), &metadata_partial, &metadata)
            .await?;

        Ok(object)
    }

    async fn list(&self) -> Result<Vec<BlobObject>, BlobError> {
        let mut entries =
            tokio::fs::read_dir(&self.root)
                .await
                .map_err(|e| BlobError::ReadDirectoryFailed {
                    path: self.root.clone(),
                    source: e,
                })?;

        let mut objects = Vec::new();
        loop {
            let entry = entries
                .next_entry()
                .await
                .map_err(|e| BlobError::ReadDirectoryFailed {
                    path: self.root.clone(),
                    source: e,
                })?;
            let Some(entry) = entry else { break };

            let path = entry.path();
            let is_metadata = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(METADATA_SUFFIX));
            if !is_metadata {
                continue;
            }

            let parsed = match tokio::fs::read(&path).await {
                Ok(bytes) => serde_json::from_slice::<BlobObject>(&bytes).map_err(|e| {
                    BlobError::MetadataParseFailed {
                        path: path.clone(),
                        source: e,
                    }
                }),
                Err(e) => Err(BlobError::ReadDirectoryFailed {
                    path: path.clone(),
                    source: e,
                }),
            };

            match parsed {
                Ok(object) => objects.push(object),
                Err(e) => warn!(error = %e, "skipping unreadable blob metadata"),
            }
        }

        objects.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(objects)
    }
}
