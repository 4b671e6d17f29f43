use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::models::{PushSubscription, SubscriptionKeys};

use super::keys::{decode_application_server_key, encode_key, KeyError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Not asked yet.
    Default,
    Granted,
    Denied,
}

/// A subscription as the platform reports it, keys still raw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformSubscription {
    pub endpoint: String,
    pub p256dh: Vec<u8>,
    pub auth: Vec<u8>,
}

impl PlatformSubscription {
    pub fn to_backend(&self) -> PushSubscription {
        PushSubscription {
            endpoint: self.endpoint.clone(),
            keys: SubscriptionKeys {
                p256dh: encode_key(&self.p256dh),
                auth: encode_key(&self.auth),
            },
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct PlatformError(pub String);

/// Notification permission and the platform's push service.
#[async_trait]
pub trait PushPlatform: Send + Sync + 'static {
    fn is_supported(&self) -> bool;
    fn permission(&self) -> Permission;
    async fn request_permission(&self) -> Result<Permission, PlatformError>;
    async fn subscription(&self) -> Result<Option<PlatformSubscription>, PlatformError>;
    async fn subscribe(&self, application_server_key: &[u8]) -> Result<PlatformSubscription, PlatformError>;
    /// Returns whether a subscription was removed.
    async fn unsubscribe(&self, endpoint: &str) -> Result<bool, PlatformError>;
}

/// Backend side of a subscription.
#[async_trait]
pub trait PushRegistry: Send + Sync + 'static {
    async fn register(&self, subscription: &PushSubscription) -> Result<(), ApiError>;
    async fn unregister(&self, endpoint: &str) -> Result<(), ApiError>;
}

#[async_trait]
impl PushRegistry for ApiClient {
    async fn register(&self, subscription: &PushSubscription) -> Result<(), ApiError> {
        self.register_push_subscription(subscription).await
    }

    async fn unregister(&self, endpoint: &str) -> Result<(), ApiError> {
        self.unregister_push_subscription(endpoint).await
    }
}

#[derive(Error, Debug)]
pub enum PushError {
    #[error("Notification permission denied")]
    PermissionDenied,

    #[error("VAPID public key not configured")]
    KeyNotConfigured,

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error("Push service error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Failed to register subscription: {0}")]
    Registry(#[from] ApiError),

    #[error("A subscription change is already in progress")]
    Busy,

    #[error("Unsubscribe incomplete (device: {local:?}, server: {backend:?})")]
    PartialUnsubscribe {
        local: Option<PlatformError>,
        backend: Option<String>,
    },
}

/// Result of an automatic subscription attempt. Nothing here is an error
/// for the caller; failures are logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureOutcome {
    AlreadySubscribed,
    Subscribed(PushSubscription),
    Unsupported,
    PermissionDenied,
    NotConfigured,
    Busy,
    Failed(String),
}

pub struct PushManager {
    platform: Arc<dyn PushPlatform>,
    registry: Arc<dyn PushRegistry>,
    vapid_public_key: Option<String>,
    /// Held for the duration of any subscription change.
    in_flight: Mutex<()>,
}

impl PushManager {
    pub fn new(
        platform: Arc<dyn PushPlatform>,
        registry: Arc<dyn PushRegistry>,
        vapid_public_key: Option<String>,
    ) -> Self {
        Self {
            platform,
            registry,
            vapid_public_key: vapid_public_key.filter(|k| !k.trim().is_empty()),
            in_flight: Mutex::new(()),
        }
    }

    pub fn is_supported(&self) -> bool {
        self.platform.is_supported()
    }

    pub async fn is_subscribed(&self) -> bool {
        if !self.is_supported() {
            return false;
        }
        matches!(self.platform.subscription().await, Ok(Some(_)))
    }

    fn application_server_key(&self) -> Result<Vec<u8>, PushError> {
        let key = self.vapid_public_key.as_deref().ok_or(PushError::KeyNotConfigured)?;
        Ok(decode_application_server_key(key)?)
    }

    async fn subscribe_and_register(&self, key: &[u8]) -> Result<PushSubscription, PushError> {
        let subscription = self.platform.subscribe(key).await?.to_backend();
        self.registry.register(&subscription).await?;
        info!(endpoint = %subscription.endpoint, "Subscribed to push notifications");
        Ok(subscription)
    }

    /// Subscribe without bothering the member more than once: prompt only
    /// while permission is undecided, subscribe silently if it was already
    /// granted, do nothing if it was denied.
    pub async fn ensure_subscribed(&self) -> EnsureOutcome {
        if !self.is_supported() {
            return EnsureOutcome::Unsupported;
        }
        let Ok(_guard) = self.in_flight.try_lock() else {
            return EnsureOutcome::Busy;
        };

        match self.platform.subscription().await {
            Ok(Some(_)) => return EnsureOutcome::AlreadySubscribed,
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "Failed to read push subscription");
                return EnsureOutcome::Failed(e.to_string());
            }
        }

        let key = match self.application_server_key() {
            Ok(key) => key,
            Err(PushError::KeyNotConfigured) => {
                debug!("No VAPID key configured, skipping push subscription");
                return EnsureOutcome::NotConfigured;
            }
            Err(e) => {
                warn!(error = %e, "Unusable VAPID key");
                return EnsureOutcome::Failed(e.to_string());
            }
        };

        let permission = match self.platform.permission() {
            Permission::Default => match self.platform.request_permission().await {
                Ok(p) => p,
                Err(e) => {
                    warn!(error = %e, "Permission request failed");
                    return EnsureOutcome::Failed(e.to_string());
                }
            },
            decided => decided,
        };
        if permission != Permission::Granted {
            debug!(?permission, "Notifications not permitted");
            return EnsureOutcome::PermissionDenied;
        }

        match self.subscribe_and_register(&key).await {
            Ok(subscription) => EnsureOutcome::Subscribed(subscription),
            Err(e) => {
                warn!(error = %e, "Automatic push subscription failed");
                EnsureOutcome::Failed(e.to_string())
            }
        }
    }

    /// Explicit subscribe from a settings toggle. `Ok(None)` when the
    /// platform has no push support.
    pub async fn subscribe(&self) -> Result<Option<PushSubscription>, PushError> {
        if !self.is_supported() {
            return Ok(None);
        }
        let _guard = self.in_flight.try_lock().map_err(|_| PushError::Busy)?;

        let key = self.application_server_key()?;
        let permission = match self.platform.permission() {
            Permission::Granted => Permission::Granted,
            _ => self.platform.request_permission().await?,
        };
        if permission != Permission::Granted {
            return Err(PushError::PermissionDenied);
        }

        self.subscribe_and_register(&key).await.map(Some)
    }

    /// Drop the subscription on the device and on the server. Both are
    /// attempted even if the first fails. Returns whether there was a
    /// subscription to drop.
    pub async fn unsubscribe(&self) -> Result<bool, PushError> {
        if !self.is_supported() {
            return Ok(false);
        }
        let _guard = self.in_flight.try_lock().map_err(|_| PushError::Busy)?;

        let Some(existing) = self.platform.subscription().await? else {
            return Ok(false);
        };

        let local = self.platform.unsubscribe(&existing.endpoint).await.err();
        let backend = self.registry.unregister(&existing.endpoint).await.err();

        if local.is_none() && backend.is_none() {
            info!(endpoint = %existing.endpoint, "Unsubscribed from push notifications");
            return Ok(true);
        }
        if let Some(ref e) = local {
            warn!(error = %e, "Failed to unsubscribe on device");
        }
        if let Some(ref e) = backend {
            warn!(error = %e, "Failed to remove subscription from server");
        }
        Err(PushError::PartialUnsubscribe {
            local,
            backend: backend.map(|e| e.to_string()),
        })
    }

    /// The platform rotated the subscription. Forget the old endpoint on the
    /// server and register whatever is current, subscribing again if the
    /// platform dropped it.
    pub async fn rotate(&self, old_endpoint: Option<&str>) -> Result<Option<PushSubscription>, PushError> {
        if !self.is_supported() {
            return Ok(None);
        }
        let _guard = self.in_flight.try_lock().map_err(|_| PushError::Busy)?;

        if let Some(old) = old_endpoint {
            if let Err(e) = self.registry.unregister(old).await {
                warn!(endpoint = old, error = %e, "Failed to remove rotated subscription");
            }
        }

        let current = match self.platform.subscription().await? {
            Some(current) => current.to_backend(),
            None => {
                let key = self.application_server_key()?;
                self.platform.subscribe(&key).await?.to_backend()
            }
        };
        self.registry.register(&current).await?;
        info!(endpoint = %current.endpoint, "Registered rotated push subscription");
        Ok(Some(current))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use super::*;

    const VAPID: &str =
        "BEl62iUYgUivxIkv69yViEuiBIa-Ib9-SkvMeAtA3LFgDzkrxZJjSgSnfckjBJuBkr3qBUYIHBQFLXYp5Nksh8U";

    struct FakePlatform {
        supported: bool,
        permission: StdMutex<Permission>,
        answer: Permission,
        subscription: StdMutex<Option<PlatformSubscription>>,
        subscribed_with: StdMutex<Option<Vec<u8>>>,
        fail_unsubscribe: bool,
        prompts: AtomicUsize,
        prompt_delay: Option<Duration>,
    }

    impl FakePlatform {
        fn new(permission: Permission) -> Self {
            Self {
                supported: true,
                permission: StdMutex::new(permission),
                answer: Permission::Granted,
                subscription: StdMutex::new(None),
                subscribed_with: StdMutex::new(None),
                fail_unsubscribe: false,
                prompts: AtomicUsize::new(0),
                prompt_delay: None,
            }
        }

        fn existing(self, endpoint: &str) -> Self {
            *self.subscription.lock().unwrap() = Some(device_subscription(endpoint));
            self
        }

        fn prompts(&self) -> usize {
            self.prompts.load(Ordering::SeqCst)
        }
    }

    fn device_subscription(endpoint: &str) -> PlatformSubscription {
        PlatformSubscription {
            endpoint: endpoint.to_string(),
            p256dh: vec![0xfb, 0xff, 0xbf, 0x01, 0x02],
            auth: (0..16).collect(),
        }
    }

    #[async_trait]
    impl PushPlatform for FakePlatform {
        fn is_supported(&self) -> bool {
            self.supported
        }

        fn permission(&self) -> Permission {
            *self.permission.lock().unwrap()
        }

        async fn request_permission(&self) -> Result<Permission, PlatformError> {
            self.prompts.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.prompt_delay {
                tokio::time::sleep(delay).await;
            }
            *self.permission.lock().unwrap() = self.answer;
            Ok(self.answer)
        }

        async fn subscription(&self) -> Result<Option<PlatformSubscription>, PlatformError> {
            Ok(self.subscription.lock().unwrap().clone())
        }

        async fn subscribe(&self, key: &[u8]) -> Result<PlatformSubscription, PlatformError> {
            *self.subscribed_with.lock().unwrap() = Some(key.to_vec());
            let sub = device_subscription("https://push.example/new");
            *self.subscription.lock().unwrap() = Some(sub.clone());
            Ok(sub)
        }

        async fn unsubscribe(&self, _endpoint: &str) -> Result<bool, PlatformError> {
            if self.fail_unsubscribe {
                return Err(PlatformError("push service unreachable".to_string()));
            }
            Ok(self.subscription.lock().unwrap().take().is_some())
        }
    }

    #[derive(Default)]
    struct FakeRegistry {
        registered: StdMutex<Vec<PushSubscription>>,
        unregistered: StdMutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl PushRegistry for FakeRegistry {
        async fn register(&self, subscription: &PushSubscription) -> Result<(), ApiError> {
            if self.fail {
                return Err(ApiError::ServerError("down".to_string()));
            }
            self.registered.lock().unwrap().push(subscription.clone());
            Ok(())
        }

        async fn unregister(&self, endpoint: &str) -> Result<(), ApiError> {
            self.unregistered.lock().unwrap().push(endpoint.to_string());
            Ok(())
        }
    }

    fn manager(platform: &Arc<FakePlatform>, registry: &Arc<FakeRegistry>, key: Option<&str>) -> PushManager {
        PushManager::new(platform.clone(), registry.clone(), key.map(String::from))
    }

    #[tokio::test]
    async fn test_unsupported_is_noop() {
        let platform = Arc::new(FakePlatform {
            supported: false,
            ..FakePlatform::new(Permission::Default)
        });
        let registry = Arc::new(FakeRegistry::default());
        let m = manager(&platform, &registry, Some(VAPID));

        assert_eq!(m.ensure_subscribed().await, EnsureOutcome::Unsupported);
        assert_eq!(m.subscribe().await.unwrap(), None);
        assert!(!m.unsubscribe().await.unwrap());
        assert_eq!(platform.prompts(), 0);
    }

    #[tokio::test]
    async fn test_existing_subscription_is_left_alone() {
        let platform = Arc::new(FakePlatform::new(Permission::Granted).existing("https://push.example/old"));
        let registry = Arc::new(FakeRegistry::default());
        let m = manager(&platform, &registry, Some(VAPID));

        assert_eq!(m.ensure_subscribed().await, EnsureOutcome::AlreadySubscribed);
        assert!(registry.registered.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_denied_never_prompts() {
        let platform = Arc::new(FakePlatform::new(Permission::Denied));
        let registry = Arc::new(FakeRegistry::default());
        let m = manager(&platform, &registry, Some(VAPID));

        assert_eq!(m.ensure_subscribed().await, EnsureOutcome::PermissionDenied);
        assert_eq!(platform.prompts(), 0);
    }

    #[tokio::test]
    async fn test_prompt_then_register_encoded_keys() {
        let platform = Arc::new(FakePlatform::new(Permission::Default));
        let registry = Arc::new(FakeRegistry::default());
        let m = manager(&platform, &registry, Some(VAPID));

        let outcome = m.ensure_subscribed().await;
        let expected = PushSubscription {
            endpoint: "https://push.example/new".to_string(),
            keys: SubscriptionKeys {
                p256dh: "+/+/AQI=".to_string(),
                auth: "AAECAwQFBgcICQoLDA0ODw==".to_string(),
            },
        };
        assert_eq!(outcome, EnsureOutcome::Subscribed(expected.clone()));
        assert_eq!(platform.prompts(), 1);
        assert_eq!(registry.registered.lock().unwrap().as_slice(), [expected]);

        let key = platform.subscribed_with.lock().unwrap().clone().unwrap();
        assert_eq!(key.len(), 65);
        assert_eq!(key[0], 4);
    }

    #[tokio::test]
    async fn test_prompt_declined() {
        let platform = Arc::new(FakePlatform {
            answer: Permission::Denied,
            ..FakePlatform::new(Permission::Default)
        });
        let registry = Arc::new(FakeRegistry::default());
        let m = manager(&platform, &registry, Some(VAPID));

        assert_eq!(m.ensure_subscribed().await, EnsureOutcome::PermissionDenied);
        assert!(matches!(m.subscribe().await, Err(PushError::PermissionDenied)));
    }

    #[tokio::test]
    async fn test_granted_subscribes_silently() {
        let platform = Arc::new(FakePlatform::new(Permission::Granted));
        let registry = Arc::new(FakeRegistry::default());
        let m = manager(&platform, &registry, Some(VAPID));

        assert!(matches!(m.ensure_subscribed().await, EnsureOutcome::Subscribed(_)));
        assert_eq!(platform.prompts(), 0);
        assert!(m.is_subscribed().await);
    }

    #[tokio::test]
    async fn test_missing_key() {
        let platform = Arc::new(FakePlatform::new(Permission::Default));
        let registry = Arc::new(FakeRegistry::default());
        let m = manager(&platform, &registry, Some("  "));

        assert_eq!(m.ensure_subscribed().await, EnsureOutcome::NotConfigured);
        assert_eq!(platform.prompts(), 0);
        assert!(matches!(m.subscribe().await, Err(PushError::KeyNotConfigured)));
    }

    #[tokio::test]
    async fn test_registry_failure_swallowed_only_when_automatic() {
        let platform = Arc::new(FakePlatform::new(Permission::Granted));
        let registry = Arc::new(FakeRegistry {
            fail: true,
            ..Default::default()
        });
        let m = manager(&platform, &registry, Some(VAPID));

        assert!(matches!(m.ensure_subscribed().await, EnsureOutcome::Failed(_)));
        assert!(matches!(m.subscribe().await, Err(PushError::Registry(_))));
    }

    #[tokio::test]
    async fn test_unsubscribe_attempts_both_sides() {
        let platform = Arc::new(FakePlatform {
            fail_unsubscribe: true,
            ..FakePlatform::new(Permission::Granted)
        }
        .existing("https://push.example/old"));
        let registry = Arc::new(FakeRegistry::default());
        let m = manager(&platform, &registry, Some(VAPID));

        let err = m.unsubscribe().await.unwrap_err();
        assert!(matches!(err, PushError::PartialUnsubscribe { local: Some(_), backend: None }));
        assert_eq!(registry.unregistered.lock().unwrap().as_slice(), ["https://push.example/old"]);
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let platform = Arc::new(FakePlatform::new(Permission::Granted).existing("https://push.example/old"));
        let registry = Arc::new(FakeRegistry::default());
        let m = manager(&platform, &registry, Some(VAPID));

        assert!(m.unsubscribe().await.unwrap());
        assert!(!m.is_subscribed().await);
        assert!(!m.unsubscribe().await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_attempt_in_flight() {
        let platform = Arc::new(FakePlatform {
            prompt_delay: Some(Duration::from_secs(1)),
            ..FakePlatform::new(Permission::Default)
        });
        let registry = Arc::new(FakeRegistry::default());
        let m = manager(&platform, &registry, Some(VAPID));

        let (first, second) = tokio::join!(m.ensure_subscribed(), m.ensure_subscribed());
        assert!(matches!(first, EnsureOutcome::Subscribed(_)));
        assert_eq!(second, EnsureOutcome::Busy);
        assert_eq!(platform.prompts(), 1);
        assert_eq!(registry.registered.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rotate_replaces_endpoint() {
        let platform = Arc::new(FakePlatform::new(Permission::Granted));
        let registry = Arc::new(FakeRegistry::default());
        let m = manager(&platform, &registry, Some(VAPID));

        let current = m.rotate(Some("https://push.example/old")).await.unwrap().unwrap();
        assert_eq!(current.endpoint, "https://push.example/new");
        assert_eq!(registry.unregistered.lock().unwrap().as_slice(), ["https://push.example/old"]);
        assert_eq!(registry.registered.lock().unwrap().as_slice(), [current]);
    }
}
