// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;

use tracing::info;

use crate::blob::{BlobStore, FsBlobStore};
use crate::catalog::CatalogRepository;
use crate::config::{Config, DEFAULT_MAX_BODY_BYTES};
use crate::document::GithubDocumentStore;
use crate::error::{ApiError, ConfigError};
use crate::http::ReqwestClient;
use crate::notify::{Notifier, WebPushSender};
use crate::subscription::{FsSubscriptionStore, SubscriptionStore};

/// Store handles shared by every request
pub struct Backend {
    pub catalog: CatalogRepository,
    pub blobs: Arc<dyn BlobStore>,
    pub subscriptions: Arc<dyn SubscriptionStore>,
    pub notifier: Notifier,
    pub max_body_bytes: usize,
}

impl Backend {
    pub fn new(
        catalog: CatalogRepository,
        blobs: Arc<dyn BlobStore>,
        subscriptions: Arc<dyn SubscriptionStore>,
        notifier: Notifier,
    ) -> Self {
        Self {
            catalog,
            blobs,
            subscriptions,
            notifier,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    /// Open the production stores described by `config`
    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        let documents = GithubDocumentStore::new(
            ReqwestClient::new(),
            &config.catalog,
            config.github_token.clone(),
        )?;

        let blobs = FsBlobStore::open(&config.blob_dir)?;
        if blobs.partial_files_cleaned() > 0 {
            info!(
                count = blobs.partial_files_cleaned(),
                "removed interrupted uploads"
            );
        }

        let subscriptions: Arc<dyn SubscriptionStore> =
            Arc::new(FsSubscriptionStore::open(&config.subscriptions_dir)?);

        let sender = WebPushSender::new(
            config.vapid_private_key.clone(),
            config.vapid_subject.clone(),
        )
        .with_ttl(config.push_ttl);
        let notifier = Notifier::new(
            Arc::new(sender),
            subscriptions.clone(),
            config.notification_icon.clone(),
            config.site_url.clone(),
        );

        Ok(Self::new(
            CatalogRepository::new(Arc::new(documents)),
            Arc::new(blobs),
            subscriptions,
            notifier,
        )
        .with_max_body_bytes(config.max_body_bytes))
    }
}

/// Router state: either a working backend or the reason there is none
#[derive(Clone)]
pub struct AppState {
    backend: Result<Arc<Backend>, ConfigError>,
}

impl AppState {
    pub fn ready(backend: Backend) -> Self {
        Self {
            backend: Ok(Arc::new(backend)),
        }
    }

    /// Serve only preflights; everything else fails with `error`
    pub fn misconfigured(error: ConfigError) -> Self {
        Self { backend: Err(error) }
    }

    pub fn backend(&self) -> Result<Arc<Backend>, ConfigError> {
        self.backend.clone()
    }
}
