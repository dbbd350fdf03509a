// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::SubscriptionError;

use super::{Subscription, SubscriptionStore};

/// In-process subscription store
#[derive(Debug, Default)]
pub struct MemorySubscriptionStore {
    records: Mutex<BTreeMap<String, Subscription>>,
}

impl MemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subscriptions(subscriptions: impl IntoIterator<Item = Subscription>) -> Self {
        let records = subscriptions
            .into_iter()
            .map(|s| (s.endpoint.clone(), s))
            .collect();
        Self {
            records: Mutex::new(records),
        }
    }
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    async fn put(&self, subscription: &Subscription) -> Result<(), SubscriptionError> {
        self.records
            .lock()
            .map_err(|_| SubscriptionError::Poisoned)?
            .insert(subscription.endpoint.clone(), subscription.clone());
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Subscription>, SubscriptionError> {
        Ok(self
            .records
            .lock()
            .map_err(|_| SubscriptionError::Poisoned)?
            .values()
            .cloned()
            .collect())
    }

    async fn remove(&self, endpoint: &str) -> Result<bool, SubscriptionError> {
        Ok(self
            .records
            .lock()
            .map_err(|_| SubscriptionError::Poisoned)?
            .remove(endpoint)
            .is_some())
    }
}
