use serde::{Deserialize, Serialize};

const DEFAULT_TITLE: &str = "SomaSave";
const DEFAULT_BODY: &str = "You have a new notification";
const DEFAULT_ICON: &str = "/icon-192x192.png";
const DEFAULT_URL: &str = "/";

/// Payload carried by a `push` event. Every field is optional on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_body")]
    pub body: String,
    #[serde(default = "default_icon")]
    pub icon: String,
    #[serde(default = "default_icon")]
    pub badge: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

fn default_body() -> String {
    DEFAULT_BODY.to_string()
}

fn default_icon() -> String {
    DEFAULT_ICON.to_string()
}

fn default_url() -> String {
    DEFAULT_URL.to_string()
}

impl Default for NotificationPayload {
    fn default() -> Self {
        Self {
            title: default_title(),
            body: default_body(),
            icon: default_icon(),
            badge: default_icon(),
            image: None,
            url: default_url(),
            data: None,
        }
    }
}

impl NotificationPayload {
    /// Decode a push message body. A missing or malformed body yields the
    /// default notification rather than dropping the push.
    pub fn from_push_data(data: Option<&[u8]>) -> Self {
        match data {
            Some(bytes) if !bytes.is_empty() => match serde_json::from_slice(bytes) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::debug!(error = %e, "Push payload is not JSON, using text body");
                    Self {
                        body: String::from_utf8_lossy(bytes).into_owned(),
                        ..Self::default()
                    }
                }
            },
            _ => Self::default(),
        }
    }

    /// URL to open when the notification is clicked. A `url` inside `data`
    /// wins over the top-level one.
    pub fn target_url(&self) -> &str {
        self.data
            .as_ref()
            .and_then(|d| d.get("url"))
            .and_then(|u| u.as_str())
            .unwrap_or(&self.url)
    }
}
