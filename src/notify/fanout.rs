// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::catalog::EpisodeRecord;
use crate::error::{DeliveryError, SubscriptionError};
use crate::subscription::{Subscription, SubscriptionStore};

/// Maximum number of characters of episode description in a notification body
pub const MAX_BODY_CHARS: usize = 120;

/// Delivers one encrypted payload to one subscription
#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send(&self, subscription: &Subscription, payload: &[u8])
    -> Result<(), DeliveryError>;
}

/// The episode details a notification is built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeSummary {
    pub id: String,
    pub title: String,
    pub description: String,
}

impl EpisodeSummary {
    /// Generic summary used when the episode cannot be looked up
    pub fn fallback(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: "New episode available".to_string(),
            description: "A new episode has been published. Tap to listen.".to_string(),
        }
    }
}

impl From<&EpisodeRecord> for EpisodeSummary {
    fn from(episode: &EpisodeRecord) -> Self {
        Self {
            id: episode.id().unwrap_or_default().to_string(),
            title: episode.title().to_string(),
            description: episode.description().to_string(),
        }
    }
}

/// JSON body handed to the service worker's `push` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub data: NotificationData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationData {
    pub url: String,
}

impl NotificationPayload {
    pub fn new(summary: &EpisodeSummary, icon: &str, site_url: &Url) -> Self {
        let mut url = site_url.clone();
        url.set_fragment(Some(&summary.id));
        Self {
            title: summary.title.clone(),
            body: truncate_chars(&summary.description, MAX_BODY_CHARS),
            icon: icon.to_string(),
            data: NotificationData {
                url: url.to_string(),
            },
        }
    }
}

/// Aggregate result of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FanoutReport {
    pub success_count: usize,
    pub error_count: usize,
    /// Subscriptions removed because their endpoint is gone
    pub expired_count: usize,
}

/// Broadcasts episode notifications to every stored subscription.
///
/// Deliveries run concurrently and fail independently. An endpoint reported
/// as gone is counted as an error and removed from the store.
#[derive(Clone)]
pub struct Notifier {
    sender: Arc<dyn PushSender>,
    subscriptions: Arc<dyn SubscriptionStore>,
    icon: String,
    site_url: Url,
}

impl Notifier {
    pub fn new(
        sender: Arc<dyn PushSender>,
        subscriptions: Arc<dyn SubscriptionStore>,
        icon: impl Into<String>,
        site_url: Url,
    ) -> Self {
        Self {
            sender,
            subscriptions,
            icon: icon.into(),
            site_url,
        }
    }

    /// Send a notification for `summary` to all subscribers.
    ///
    /// Only fails if the subscription store cannot be listed.
    pub async fn notify_all(
        &self,
        summary: &EpisodeSummary,
    ) -> Result<FanoutReport, SubscriptionError> {
        let subscriptions = self.subscriptions.list_all().await?;
        let payload = NotificationPayload::new(summary, &self.icon, &self.site_url);
        let payload = serde_json::to_vec(&payload)?;

        debug!(
            episode_id = %summary.id,
            subscribers = subscriptions.len(),
            "dispatching notifications"
        );

        let deliveries = subscriptions
            .iter()
            .map(|subscription| self.sender.send(subscription, &payload));
        let outcomes = join_all(deliveries).await;

        let mut report = FanoutReport::default();
        for (subscription, outcome) in subscriptions.iter().zip(outcomes) {
            let Err(err) = outcome else {
                report.success_count += 1;
                continue;
            };

            report.error_count += 1;
            warn!(endpoint = %subscription.endpoint, error = %err, "push delivery failed");

            if err.is_gone() {
                match self.subscriptions.remove(&subscription.endpoint).await {
                    Ok(true) => report.expired_count += 1,
                    Ok(false) => {}
                    Err(e) => warn!(
                        endpoint = %subscription.endpoint,
                        error = %e,
                        "failed to remove expired subscription"
                    ),
                }
            }
        }

        info!(
            episode_id = %summary.id,
            success = report.success_count,
            errors = report.error_count,
            expired = report.expired_count,
            "notification fan-out complete"
        );
        Ok(report)
    }
}

/// Truncate to at most `max_chars` characters, marking the cut with "..."
fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::{MemorySubscriptionStore, SubscriptionKeys};
    use std::sync::Mutex;

    /// Fails for configured endpoints, records every attempt
    struct MockSender {
        failing: Vec<String>,
        gone: Vec<String>,
        sent: Mutex<Vec<(String, Vec<u8>)>>,
    }

    impl MockSender {
        fn new() -> Self {
            Self {
                failing: Vec::new(),
                gone: Vec::new(),
                sent: Mutex::new(Vec::new()),
            }
        }

        fn failing(mut self, endpoint: &str) -> Self {
            self.failing.push(endpoint.to_string());
            self
        }

        fn gone(mut self, endpoint: &str) -> Self {
            self.gone.push(endpoint.to_string());
            self
        }
    }

    #[async_trait]
    impl PushSender for MockSender {
        async fn send(
            &self,
            subscription: &Subscription,
            payload: &[u8],
        ) -> Result<(), DeliveryError> {
            self.sent
                .lock()
                .unwrap()
                .push((subscription.endpoint.clone(), payload.to_vec()));

            if self.gone.contains(&subscription.endpoint) {
                return Err(DeliveryError::Gone {
                    endpoint: subscription.endpoint.clone(),
                });
            }
            if self.failing.contains(&subscription.endpoint) {
                return Err(DeliveryError::Rejected {
                    endpoint: subscription.endpoint.clone(),
                    reason: "HTTP 500".into(),
                });
            }
            Ok(())
        }
    }

    fn make_subscription(endpoint: &str) -> Subscription {
        Subscription {
            endpoint: endpoint.to_string(),
            expiration_time: None,
            keys: SubscriptionKeys {
                p256dh: "key".into(),
                auth: "auth".into(),
            },
        }
    }

    fn store_with(endpoints: &[&str]) -> Arc<MemorySubscriptionStore> {
        Arc::new(MemorySubscriptionStore::with_subscriptions(
            endpoints.iter().map(|e| make_subscription(e)),
        ))
    }

    fn make_notifier(
        sender: MockSender,
        store: Arc<MemorySubscriptionStore>,
    ) -> (Notifier, Arc<MockSender>) {
        let sender = Arc::new(sender);
        let notifier = Notifier::new(
            sender.clone(),
            store,
            "./icons/icon-192x192.png",
            Url::parse("https://radio.example.com/").unwrap(),
        );
        (notifier, sender)
    }

    fn summary() -> EpisodeSummary {
        EpisodeSummary {
            id: "ep-7".into(),
            title: "Episode 7".into(),
            description: "We talk about things".into(),
        }
    }

    #[test]
    fn summary_reads_raw_record_leniently() {
        let record = EpisodeRecord::from_value(serde_json::json!({
            "id": "ep-9",
            "title": "Nine",
            "description": null,
        }))
        .unwrap();

        assert_eq!(
            EpisodeSummary::from(&record),
            EpisodeSummary {
                id: "ep-9".into(),
                title: "Nine".into(),
                description: String::new(),
            }
        );
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_siblings() {
        let store = store_with(&["https://push/1", "https://push/2", "https://push/3"]);
        let (notifier, sender) = make_notifier(MockSender::new().failing("https://push/2"), store);

        let report = notifier.notify_all(&summary()).await.unwrap();

        assert_eq!(report.success_count, 2);
        assert_eq!(report.error_count, 1);
        assert_eq!(report.expired_count, 0);
        assert_eq!(sender.sent.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn gone_subscriptions_are_removed() {
        let store = store_with(&["https://push/1", "https://push/2"]);
        let (notifier, _) = make_notifier(MockSender::new().gone("https://push/1"), store.clone());

        let report = notifier.notify_all(&summary()).await.unwrap();

        assert_eq!(
            report,
            FanoutReport {
                success_count: 1,
                error_count: 1,
                expired_count: 1,
            }
        );
        let remaining = store.list_all().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].endpoint, "https://push/2");
    }

    #[tokio::test]
    async fn no_subscribers_reports_zero() {
        let (notifier, sender) = make_notifier(MockSender::new(), store_with(&[]));

        let report = notifier.notify_all(&summary()).await.unwrap();

        assert_eq!(report, FanoutReport::default());
        assert!(sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn every_subscriber_gets_the_same_payload() {
        let store = store_with(&["https://push/1", "https://push/2"]);
        let (notifier, sender) = make_notifier(MockSender::new(), store);

        notifier.notify_all(&summary()).await.unwrap();

        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent[0].1, sent[1].1);
        let payload: serde_json::Value = serde_json::from_slice(&sent[0].1).unwrap();
        assert_eq!(payload["title"], "Episode 7");
        assert_eq!(payload["body"], "We talk about things");
        assert_eq!(payload["icon"], "./icons/icon-192x192.png");
        assert_eq!(payload["data"]["url"], "https://radio.example.com/#ep-7");
    }

    #[test]
    fn payload_body_is_truncated_on_char_boundary() {
        let summary = EpisodeSummary {
            id: "ep".into(),
            title: "t".into(),
            description: "ü".repeat(200),
        };
        let site = Url::parse("https://radio.example.com/").unwrap();

        let payload = NotificationPayload::new(&summary, "icon.png", &site);

        assert_eq!(payload.body.chars().count(), MAX_BODY_CHARS);
        assert!(payload.body.ends_with("..."));
    }

    #[test]
    fn short_text_is_not_truncated() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("exactly10!", 10), "exactly10!");
        assert_eq!(truncate_chars("this is too long", 10), "this is...");
    }

    #[test]
    fn fallback_summary_keeps_episode_id() {
        let summary = EpisodeSummary::fallback("ep-9");
        assert_eq!(summary.id, "ep-9");
        assert!(!summary.title.is_empty());
    }
}
