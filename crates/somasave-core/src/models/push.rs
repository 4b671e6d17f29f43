use serde::{Deserialize, Serialize};

/// Standard-base64 key material for a push endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

/// Body of `POST /push-subscriptions/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscription {
    pub endpoint: String,
    pub keys: SubscriptionKeys,
}

/// Body of `POST /push-subscriptions/unsubscribe/`.
#[derive(Debug, Clone, Serialize)]
pub struct UnsubscribeRequest<'a> {
    pub endpoint: &'a str,
}
