//! Strategy execution.
//!
//! `CacheRouter::handle` is the single entry point for outgoing requests:
//! it classifies the request and runs the matching strategy against the
//! injected storage and fetcher. A network failure never escapes as
//! anything other than a cached snapshot or `RouteError::Unavailable`.

use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use super::classify::is_dashboard_stats;
use super::{
    CacheError, CacheNames, CacheStorage, Classifier, FetchError, Fetcher, Partition, Request,
    Snapshot, Strategy,
};

/// Key under which the latest good HTML document is kept. Navigations
/// store here instead of under their own URL, so any page can be served
/// offline from the one shell.
pub const SHELL_PATH: &str = "/index.html";

/// Stored at install time.
pub const PRECACHE_PATHS: &[&str] = &[
    "/",
    "/member-portal",
    "/login",
    "/register",
    "/icon-180x180.png",
    "/manifest.json",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache,
}

#[derive(Debug)]
pub struct RoutedResponse {
    pub snapshot: Snapshot,
    pub source: ResponseSource,
    pub strategy: Strategy,
    revalidation: Option<JoinHandle<()>>,
}

impl RoutedResponse {
    fn new(snapshot: Snapshot, source: ResponseSource, strategy: Strategy) -> Self {
        Self {
            snapshot,
            source,
            strategy,
            revalidation: None,
        }
    }

    /// Background refresh started by stale-while-revalidate, if any.
    /// Dropping the handle does not stop the refresh.
    pub fn take_revalidation(&mut self) -> Option<JoinHandle<()>> {
        self.revalidation.take()
    }
}

#[derive(Debug)]
pub enum Routed {
    /// Not intercepted; the caller sends the request itself.
    Bypass,
    Handled(RoutedResponse),
}

impl Routed {
    pub fn into_response(self) -> Option<RoutedResponse> {
        match self {
            Routed::Bypass => None,
            Routed::Handled(r) => Some(r),
        }
    }
}

#[derive(Error, Debug)]
pub enum RouteError {
    #[error("{url} is unreachable and has no cached copy: {source}")]
    Unavailable {
        url: String,
        #[source]
        source: FetchError,
    },
}

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("Failed to precache {url}: {reason}")]
    Precache { url: String, reason: String },

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Write a snapshot if it is cacheable. Store failures are logged, never
/// returned: a failed write only means a later miss.
async fn remember<S: CacheStorage + ?Sized>(storage: &S, store: &str, key: &str, snapshot: &Snapshot) {
    if !snapshot.is_cacheable() {
        debug!(key = key, status = snapshot.status, "Not caching non-200 response");
        return;
    }
    if let Err(e) = storage.put(store, key, snapshot.clone()).await {
        warn!(store = store, key = key, error = %e, "Failed to write cache entry");
    }
}

pub struct CacheRouter<S, F> {
    storage: Arc<S>,
    fetcher: Arc<F>,
    classifier: Classifier,
    names: CacheNames,
    origin: String,
}

impl<S: CacheStorage, F: Fetcher> CacheRouter<S, F> {
    pub fn new(app_url: &Url, version: u32, storage: Arc<S>, fetcher: Arc<F>) -> Self {
        Self {
            storage,
            fetcher,
            classifier: Classifier::new(app_url),
            names: CacheNames::new(version),
            origin: app_url.origin().ascii_serialization(),
        }
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn names(&self) -> &CacheNames {
        &self.names
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Absolute URL for a path on the app's origin.
    pub fn app_url(&self, path: &str) -> String {
        format!("{}{}", self.origin, path)
    }

    fn store(&self, partition: Partition) -> String {
        self.names.name(partition)
    }

    pub fn classify(&self, request: &Request) -> Strategy {
        self.classifier.classify(request)
    }

    pub async fn handle(&self, request: &Request) -> Result<Routed, RouteError> {
        let strategy = self.classify(request);
        debug!(url = %request.url, ?strategy, "Routing request");
        self.execute(strategy, request).await
    }

    pub async fn execute(&self, strategy: Strategy, request: &Request) -> Result<Routed, RouteError> {
        let response = match strategy {
            Strategy::Bypass => return Ok(Routed::Bypass),
            Strategy::ShellNetworkFirst => {
                self.network_first(request, Partition::Precache, self.app_url(SHELL_PATH), strategy)
                    .await?
            }
            Strategy::ApiNetworkFirst => {
                if is_dashboard_stats(&request.url) {
                    debug!(url = %request.url, "Dashboard stats: always fetched while online");
                }
                self.network_first(request, Partition::Api, request.cache_key(), strategy)
                    .await?
            }
            Strategy::CacheFirst(_) => self.cache_first(request, strategy).await?,
            Strategy::StaleWhileRevalidate => self.stale_while_revalidate(request, strategy).await?,
        };
        Ok(Routed::Handled(response))
    }

    /// Read a snapshot, treating store errors as a miss.
    async fn lookup(&self, store: &str, key: &str) -> Option<Snapshot> {
        match self.storage.get(store, key).await {
            Ok(found) => found,
            Err(e) => {
                warn!(store = store, key = key, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    async fn network_first(
        &self,
        request: &Request,
        partition: Partition,
        key: String,
        strategy: Strategy,
    ) -> Result<RoutedResponse, RouteError> {
        let store = self.store(partition);
        match self.fetcher.fetch(request).await {
            Ok(fresh) => {
                remember(&*self.storage, &store, &key, &fresh).await;
                Ok(RoutedResponse::new(fresh, ResponseSource::Network, strategy))
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "Network failed, trying cache");
                let mut cached = self.lookup(&store, &key).await;
                if cached.is_none() && partition == Partition::Precache {
                    // A page stored at install time under its own URL.
                    cached = self.lookup(&store, &request.cache_key()).await;
                }
                match cached {
                    Some(snapshot) => Ok(RoutedResponse::new(snapshot, ResponseSource::Cache, strategy)),
                    None => Err(RouteError::Unavailable {
                        url: request.url.to_string(),
                        source: e,
                    }),
                }
            }
        }
    }

    async fn cache_first(&self, request: &Request, strategy: Strategy) -> Result<RoutedResponse, RouteError> {
        let store = self.store(Partition::Static);
        let key = request.cache_key();

        if let Some(hit) = self.lookup(&store, &key).await {
            return Ok(RoutedResponse::new(hit, ResponseSource::Cache, strategy));
        }

        match self.fetcher.fetch(request).await {
            Ok(fresh) => {
                remember(&*self.storage, &store, &key, &fresh).await;
                Ok(RoutedResponse::new(fresh, ResponseSource::Network, strategy))
            }
            Err(source) => Err(RouteError::Unavailable {
                url: request.url.to_string(),
                source,
            }),
        }
    }

    async fn stale_while_revalidate(
        &self,
        request: &Request,
        strategy: Strategy,
    ) -> Result<RoutedResponse, RouteError> {
        let store = self.store(Partition::Dynamic);
        let key = request.cache_key();

        if let Some(stale) = self.lookup(&store, &key).await {
            let storage = Arc::clone(&self.storage);
            let fetcher = Arc::clone(&self.fetcher);
            let request = request.clone();
            let handle = tokio::spawn(async move {
                match fetcher.fetch(&request).await {
                    Ok(fresh) => remember(&*storage, &store, &key, &fresh).await,
                    Err(e) => debug!(url = %request.url, error = %e, "Background revalidation failed"),
                }
            });

            let mut response = RoutedResponse::new(stale, ResponseSource::Cache, strategy);
            response.revalidation = Some(handle);
            return Ok(response);
        }

        match self.fetcher.fetch(request).await {
            Ok(fresh) => {
                remember(&*self.storage, &store, &key, &fresh).await;
                Ok(RoutedResponse::new(fresh, ResponseSource::Network, strategy))
            }
            Err(source) => Err(RouteError::Unavailable {
                url: request.url.to_string(),
                source,
            }),
        }
    }

    /// Fetch and store the precache list. All or nothing: if any URL fails,
    /// nothing is written.
    pub async fn install(&self) -> Result<usize, InstallError> {
        let store = self.store(Partition::Precache);
        let mut fetched = Vec::with_capacity(PRECACHE_PATHS.len());

        for path in PRECACHE_PATHS {
            let url_str = self.app_url(path);
            let url = Url::parse(&url_str).map_err(|e| InstallError::Precache {
                url: url_str.clone(),
                reason: e.to_string(),
            })?;
            let request = Request::get(url);
            let snapshot = self
                .fetcher
                .fetch(&request)
                .await
                .map_err(|e| InstallError::Precache {
                    url: url_str.clone(),
                    reason: e.to_string(),
                })?;
            if !snapshot.is_cacheable() {
                return Err(InstallError::Precache {
                    url: url_str,
                    reason: format!("status {}", snapshot.status),
                });
            }
            fetched.push((request.cache_key(), *path, snapshot));
        }

        self.storage.open(&store).await?;
        for (key, path, snapshot) in &fetched {
            self.storage.put(&store, key, snapshot.clone()).await?;
            if *path == "/" {
                self.storage.put(&store, &self.app_url(SHELL_PATH), snapshot.clone()).await?;
            }
        }

        info!(store = %store, count = fetched.len(), "Precached app shell");
        Ok(fetched.len())
    }

    /// Delete every store that is not one of the current generation's four.
    /// Returns the names removed.
    pub async fn activate(&self) -> Result<Vec<String>, CacheError> {
        let mut removed = Vec::new();
        for name in self.storage.store_names().await? {
            if !self.names.is_current(&name) {
                info!(store = %name, "Clearing old cache");
                if self.storage.delete_store(&name).await? {
                    removed.push(name);
                }
            }
        }
        Ok(removed)
    }

    /// Look up a request in whichever current store its strategy uses,
    /// without touching the network.
    pub async fn cached(&self, request: &Request) -> Option<Snapshot> {
        let strategy = self.classify(request);
        let partition = strategy.partition()?;
        let key = if strategy == Strategy::ShellNetworkFirst {
            self.app_url(SHELL_PATH)
        } else {
            request.cache_key()
        };
        self.lookup(&self.store(partition), &key).await
    }
}
