//! Offline worker: install/activate lifecycle around the cache router,
//! push display and notification click routing.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::{CacheError, CacheRouter, CacheStorage, Fetcher, InstallError, Request, RouteError, Routed};
use crate::models::NotificationPayload;

/// Open windows whose path starts with this belong to the app and are
/// reused for notification clicks.
pub const APP_PATH_PREFIX: &str = "/member-portal";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Installing,
    /// Installed and waiting to take over.
    Installed,
    Activating,
    Activated,
    /// Install failed; this worker will never activate.
    Redundant,
}

/// Messages posted to the worker by the page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    SkipWaiting,
}

impl WorkerMessage {
    /// Unknown or malformed messages are ignored.
    pub fn parse(value: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Cannot {action} while {state:?}")]
    InvalidState { action: &'static str, state: WorkerState },

    #[error(transparent)]
    Install(#[from] InstallError),

    #[error("Failed to clear old caches: {0}")]
    Activate(#[from] CacheError),

    #[error("Invalid notification URL {url}: {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Client error: {0}")]
    Client(String),

    #[error("Failed to show notification: {0}")]
    Notify(String),
}

/// An open app window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientWindow {
    pub id: String,
    pub url: Url,
}

/// The windows controlled by the worker.
#[async_trait]
pub trait Clients: Send + Sync + 'static {
    /// Take control of every open window.
    async fn claim(&self) -> Result<(), WorkerError>;
    async fn windows(&self) -> Result<Vec<ClientWindow>, WorkerError>;
    async fn navigate(&self, id: &str, url: &Url) -> Result<(), WorkerError>;
    async fn focus(&self, id: &str) -> Result<(), WorkerError>;
    async fn open_window(&self, url: &Url) -> Result<(), WorkerError>;
}

#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn show(&self, notification: &NotificationPayload) -> Result<(), WorkerError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickAction {
    /// An existing app window was navigated and focused.
    Focused(String),
    Opened(Url),
}

pub struct ServiceWorker<S, F> {
    app_url: Url,
    router: CacheRouter<S, F>,
    clients: Arc<dyn Clients>,
    notifier: Arc<dyn Notifier>,
    state: WorkerState,
}

impl<S: CacheStorage, F: Fetcher> ServiceWorker<S, F> {
    pub fn new(
        app_url: Url,
        router: CacheRouter<S, F>,
        clients: Arc<dyn Clients>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            app_url,
            router,
            clients,
            notifier,
            state: WorkerState::Installing,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn router(&self) -> &CacheRouter<S, F> {
        &self.router
    }

    /// Precache the shell. A failed install makes the worker redundant.
    pub async fn install(&mut self) -> Result<usize, WorkerError> {
        if self.state != WorkerState::Installing {
            return Err(WorkerError::InvalidState {
                action: "install",
                state: self.state,
            });
        }
        match self.router.install().await {
            Ok(count) => {
                self.state = WorkerState::Installed;
                Ok(count)
            }
            Err(e) => {
                warn!(error = %e, "Install failed");
                self.state = WorkerState::Redundant;
                Err(e.into())
            }
        }
    }

    /// Promote a waiting worker. Returns the stores removed by activation,
    /// or `None` if the worker was not waiting.
    pub async fn skip_waiting(&mut self) -> Result<Option<Vec<String>>, WorkerError> {
        if self.state != WorkerState::Installed {
            debug!(state = ?self.state, "Skip waiting ignored");
            return Ok(None);
        }
        self.activate().await.map(Some)
    }

    /// Drop superseded stores, then claim open windows.
    pub async fn activate(&mut self) -> Result<Vec<String>, WorkerError> {
        if self.state != WorkerState::Installed {
            return Err(WorkerError::InvalidState {
                action: "activate",
                state: self.state,
            });
        }
        self.state = WorkerState::Activating;
        let removed = match self.router.activate().await {
            Ok(removed) => removed,
            Err(e) => {
                self.state = WorkerState::Installed;
                return Err(e.into());
            }
        };
        self.clients.claim().await?;
        self.state = WorkerState::Activated;
        info!(version = self.router.names().version(), removed = removed.len(), "Worker activated");
        Ok(removed)
    }

    /// Install then take over immediately.
    pub async fn start(&mut self) -> Result<Vec<String>, WorkerError> {
        self.install().await?;
        Ok(self.skip_waiting().await?.unwrap_or_default())
    }

    pub async fn on_message(&mut self, message: &serde_json::Value) -> Result<(), WorkerError> {
        match WorkerMessage::parse(message) {
            Some(WorkerMessage::SkipWaiting) => {
                self.skip_waiting().await?;
            }
            None => debug!(%message, "Ignoring unknown worker message"),
        }
        Ok(())
    }

    /// Until activated, nothing is intercepted.
    pub async fn on_fetch(&self, request: &Request) -> Result<Routed, RouteError> {
        if self.state != WorkerState::Activated {
            return Ok(Routed::Bypass);
        }
        self.router.handle(request).await
    }

    pub async fn on_push(&self, data: Option<&[u8]>) -> Result<NotificationPayload, WorkerError> {
        let notification = NotificationPayload::from_push_data(data);
        debug!(title = %notification.title, "Push received");
        self.notifier.show(&notification).await?;
        Ok(notification)
    }

    pub async fn on_notification_click(
        &self,
        notification: &NotificationPayload,
    ) -> Result<ClickAction, WorkerError> {
        let target = notification.target_url();
        let url = self.app_url.join(target).map_err(|source| WorkerError::Url {
            url: target.to_string(),
            source,
        })?;

        let windows = self.clients.windows().await?;
        let existing = windows.into_iter().find(|w| {
            w.url.origin() == self.app_url.origin() && w.url.path().starts_with(APP_PATH_PREFIX)
        });

        match existing {
            Some(window) => {
                self.clients.navigate(&window.id, &url).await?;
                self.clients.focus(&window.id).await?;
                Ok(ClickAction::Focused(window.id))
            }
            None => {
                self.clients.open_window(&url).await?;
                Ok(ClickAction::Opened(url))
            }
        }
    }
}
