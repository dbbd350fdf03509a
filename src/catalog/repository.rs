// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::document::{DocumentStore, Revision};
use crate::error::{CatalogError, StoreError};

use super::model::Catalog;
use super::mutation::{Applied, Mutation};

/// Outcome of one read-modify-write cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The catalog was written at a new revision
    Written { revision: Revision },
    /// The mutation was a soft no-op and nothing was written
    Unchanged,
}

impl MutationOutcome {
    pub fn changed(&self) -> bool {
        matches!(self, MutationOutcome::Written { .. })
    }

    pub fn revision(&self) -> Option<&Revision> {
        match self {
            MutationOutcome::Written { revision } => Some(revision),
            MutationOutcome::Unchanged => None,
        }
    }
}

/// Applies catalog mutations against a versioned document store.
///
/// Each call performs exactly one fetch, transform and conditional write.
/// A concurrent writer makes the write fail with a conflict, which is
/// returned to the caller as is.
#[derive(Clone)]
pub struct CatalogRepository {
    store: Arc<dyn DocumentStore>,
}

impl CatalogRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Read the current catalog and the revision it was read at
    pub async fn load(&self) -> Result<(Catalog, Revision), CatalogError> {
        let document = self.store.read().await?;
        let catalog = Catalog::from_slice(&document.content)?;
        Ok((catalog, document.revision))
    }

    /// Run one read-modify-write cycle for `mutation`
    pub async fn apply(&self, mutation: Mutation) -> Result<MutationOutcome, CatalogError> {
        let operation = mutation.name();

        debug!(operation, "fetching catalog");
        let (mut catalog, revision) = self.load().await?;

        debug!(operation, revision = %revision, "transforming catalog");
        let message = match mutation.apply(&mut catalog)? {
            Applied::Changed { message } => message,
            Applied::Unchanged => {
                info!(operation, "catalog unchanged, skipping write");
                return Ok(MutationOutcome::Unchanged);
            }
        };

        debug!(operation, revision = %revision, "writing catalog");
        let content = catalog.to_pretty_json()?;
        match self.store.write(content, &revision, &message).await {
            Ok(next) => {
                info!(operation, revision = %next, %message, "catalog written");
                Ok(MutationOutcome::Written { revision: next })
            }
            Err(err @ StoreError::Conflict { .. }) => {
                warn!(operation, revision = %revision, "catalog write lost a race");
                Err(err.into())
            }
            Err(err) => Err(err.into()),
        }
    }
}
