//! Web push subscription management.

pub mod keys;
pub mod manager;

pub use keys::{decode_application_server_key, encode_key, to_standard_base64, KeyError};
pub use manager::{
    EnsureOutcome, Permission, PlatformError, PlatformSubscription, PushError, PushManager, PushPlatform,
    PushRegistry,
};
