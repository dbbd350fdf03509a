// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::SubscriptionError;

use super::{Subscription, SubscriptionStore};

const RECORD_SUFFIX: &str = ".json";

/// Subscription store writing one JSON record per endpoint.
///
/// Records are named by the sha256 of the endpoint, so re-subscribing the
/// same endpoint overwrites its record instead of adding another.
#[derive(Debug)]
pub struct FsSubscriptionStore {
    root: PathBuf,
    write_seq: AtomicU64,
}

impl FsSubscriptionStore {
    /// Open (creating if needed) a store rooted at `root`
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, SubscriptionError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| SubscriptionError::Io {
            path: root.clone(),
            source: e,
        })?;
        Ok(Self {
            root,
            write_seq: AtomicU64::new(0),
        })
    }

    fn record_path(&self, endpoint: &str) -> PathBuf {
        let digest = Sha256::digest(endpoint.as_bytes());
        self.root.join(format!("{digest:x}{RECORD_SUFFIX}"))
    }
}

#[async_trait]
impl SubscriptionStore for FsSubscriptionStore {
    async fn put(&self, subscription: &Subscription) -> Result<(), SubscriptionError> {
        let path = self.record_path(&subscription.endpoint);
        let seq = self.write_seq.fetch_add(1, Ordering::Relaxed);
        let temp = path.with_extension(format!("{}.{seq}.tmp", std::process::id()));

        let json = serde_json::to_vec_pretty(subscription)?;
        tokio::fs::write(&temp, json)
            .await
            .map_err(|e| SubscriptionError::Io {
                path: temp.clone(),
                source: e,
            })?;

        if let Err(e) = tokio::fs::rename(&temp, &path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(SubscriptionError::Io { path, source: e });
        }
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Subscription>, SubscriptionError> {
        let io_error = |e| SubscriptionError::Io {
            path: self.root.clone(),
            source: e,
        };

        let mut entries = tokio::fs::read_dir(&self.root).await.map_err(io_error)?;
        let mut subscriptions = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
            let path = entry.path();
            let is_record = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(RECORD_SUFFIX));
            if !is_record {
                continue;
            }

            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                // Removed concurrently
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(SubscriptionError::Io { path, source: e }),
            };

            match serde_json::from_slice::<Subscription>(&bytes) {
                Ok(subscription) => subscriptions.push(subscription),
                Err(e) => {
                    let err = SubscriptionError::ParseFailed {
                        path: path.clone(),
                        source: e,
                    };
                    warn!(error = %err, "skipping unreadable subscription record");
                }
            }
        }

        Ok(subscriptions)
    }

    async fn remove(&self, endpoint: &str) -> Result<bool, SubscriptionError> {
        let path = self.record_path(endpoint);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(SubscriptionError::Io { path, source: e }),
        }
    }
}
