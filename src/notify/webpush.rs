// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use async_trait::async_trait;
use web_push::{
    ContentEncoding, HyperWebPushClient, SubscriptionInfo, VapidSignatureBuilder, WebPushClient,
    WebPushError, WebPushMessageBuilder,
};

use crate::config::DEFAULT_PUSH_TTL;
use crate::error::DeliveryError;
use crate::subscription::Subscription;

use super::fanout::PushSender;

/// Web Push delivery with VAPID signing and aes128gcm payload encryption
pub struct WebPushSender {
    client: HyperWebPushClient,
    private_key: String,
    subject: String,
    ttl: u32,
}

impl WebPushSender {
    /// `private_key` is the url-safe base64 VAPID key, `subject` a
    /// `mailto:` or `https:` contact
    pub fn new(private_key: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            client: HyperWebPushClient::new(),
            private_key: private_key.into(),
            subject: subject.into(),
            ttl: DEFAULT_PUSH_TTL,
        }
    }

    /// Seconds the push service may hold a message for an offline client
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }
}

#[async_trait]
impl PushSender for WebPushSender {
    async fn send(
        &self,
        subscription: &Subscription,
        payload: &[u8],
    ) -> Result<(), DeliveryError> {
        let endpoint = subscription.endpoint.clone();
        let prepare = |e: WebPushError| DeliveryError::Prepare {
            endpoint: endpoint.clone(),
            reason: e.to_string(),
        };

        let info = SubscriptionInfo::new(
            &subscription.endpoint,
            &subscription.keys.p256dh,
            &subscription.keys.auth,
        );

        let mut signature =
            VapidSignatureBuilder::from_base64(&self.private_key, web_push::URL_SAFE_NO_PAD, &info)
                .map_err(prepare)?;
        signature.add_claim("sub", self.subject.as_str());
        let signature = signature.build().map_err(prepare)?;

        let mut builder = WebPushMessageBuilder::new(&info);
        builder.set_payload(ContentEncoding::Aes128Gcm, payload);
        builder.set_ttl(self.ttl);
        builder.set_vapid_signature(signature);
        let message = builder.build().map_err(prepare)?;

        self.client.send(message).await.map_err(|e| match e {
            WebPushError::EndpointNotFound { .. } | WebPushError::EndpointNotValid { .. } => {
                DeliveryError::Gone {
                    endpoint: endpoint.clone(),
                }
            }
            other => DeliveryError::Rejected {
                endpoint: endpoint.clone(),
                reason: other.to_string(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::subscription::SubscriptionKeys;

    fn subscription() -> Subscription {
        Subscription {
            endpoint: "https://push.example.com/send/abc".into(),
            expiration_time: None,
            keys: SubscriptionKeys {
                p256dh: "BLc4xRzKlKORKWlbdgFaBrrPK3ydWAHo4M0gs0i1oEKgPpWC5cW8OCzVrOQRv-1npXRWk8udnW3oYhIO4475rds".into(),
                auth: "5I2Bu2oKdyy9CwL8QVF0NQ".into(),
            },
        }
    }

    #[test]
    fn ttl_defaults_to_one_day_and_can_be_overridden() {
        let sender = WebPushSender::new("key", "mailto:host@example.com");
        assert_eq!(sender.ttl, 24 * 60 * 60);
        assert_eq!(sender.with_ttl(60).ttl, 60);
    }

    #[tokio::test]
    async fn unusable_vapid_key_fails_before_sending() {
        let sender = WebPushSender::new("not a vapid key", "mailto:host@example.com");

        let err = sender.send(&subscription(), b"{}").await.unwrap_err();

        assert!(
            matches!(&err, DeliveryError::Prepare { endpoint, .. } if endpoint.ends_with("/abc")),
            "{err}"
        );
        assert!(!err.is_gone());
    }
}
