mod fs;
mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::SubscriptionError;

pub use fs::FsSubscriptionStore;
pub use memory::MemorySubscriptionStore;

/// A browser push subscription, as produced by `PushSubscription.toJSON()`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<i64>,
    pub keys: SubscriptionKeys,
}

/// Client public key material for payload encryption
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

impl Subscription {
    /// Check that the endpoint is an absolute http(s) URL and keys are present
    pub fn validate(&self) -> Result<(), SubscriptionError> {
        let url = Url::parse(&self.endpoint).map_err(|e| {
            SubscriptionError::Invalid(format!("endpoint '{}' is not a URL: {e}", self.endpoint))
        })?;
        if !matches!(url.scheme(), "https" | "http") {
            return Err(SubscriptionError::Invalid(format!(
                "endpoint '{}' must use http(s)",
                self.endpoint
            )));
        }
        if self.keys.p256dh.is_empty() || self.keys.auth.is_empty() {
            return Err(SubscriptionError::Invalid(
                "subscription keys must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Key-value store of push subscriptions, keyed by endpoint
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Insert or overwrite the record for `subscription.endpoint`
    async fn put(&self, subscription: &Subscription) -> Result<(), SubscriptionError>;

    async fn list_all(&self) -> Result<Vec<Subscription>, SubscriptionError>;

    /// Delete the record for `endpoint`; returns whether one existed
    async fn remove(&self, endpoint: &str) -> Result<bool, SubscriptionError>;
}
