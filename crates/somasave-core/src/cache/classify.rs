//! Request classification.
//!
//! Rules are checked in order and the first match wins; several of them
//! overlap (an API URL can end in `.js`, a font can be cross-origin).
//!
//! 1. non-GET → bypass
//! 2. cross-origin, not a static asset extension → bypass
//! 3. navigation or `Accept: text/html` → shell network-first
//! 4. under the API prefix → API network-first
//! 5. content-hashed `js`/`css` bundle → cache-first
//! 6. font or image → cache-first
//! 7. anything else → stale-while-revalidate

use std::sync::OnceLock;

use regex::Regex;
use url::{Origin, Url};

use super::{Partition, Request};

/// Path prefix of the REST API.
pub const API_PREFIX: &str = "/api/";

/// Informational only, nothing routes on it.
/// Dashboard figures are re-requested often by the portal. They go through
/// plain network-first like any API call, so every online read is fresh;
/// the portal expects them to be no older than ~15 seconds.
pub const DASHBOARD_STATS_PATH: &str = "/api/dashboard/stats/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    /// Build output whose file name embeds a content hash.
    HashedBundle,
    FontOrImage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Not intercepted: the request goes to the network untouched.
    Bypass,
    /// Always fetch; on success store as the app shell, offline serve the shell.
    ShellNetworkFirst,
    /// Always fetch; offline serve the last good copy of the same URL.
    ApiNetworkFirst,
    /// Serve a stored copy without touching the network; fetch only on a miss.
    CacheFirst(AssetKind),
    /// Serve a stored copy now and refresh it in the background.
    StaleWhileRevalidate,
}

impl Strategy {
    /// Store the strategy writes into.
    pub fn partition(self) -> Option<Partition> {
        match self {
            Strategy::Bypass => None,
            Strategy::ShellNetworkFirst => Some(Partition::Precache),
            Strategy::ApiNetworkFirst => Some(Partition::Api),
            Strategy::CacheFirst(_) => Some(Partition::Static),
            Strategy::StaleWhileRevalidate => Some(Partition::Dynamic),
        }
    }
}

fn static_asset_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\.(js|css|png|jpg|jpeg|svg|woff|woff2|ttf|ico)$").expect("valid regex")
    })
}

fn hashed_bundle_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // `index-4f3a9b2c.js`, `vendor.0d1e2f3a4b.css`
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:^|[.\-_])[0-9a-f]{8,}\.(?:js|css)$").expect("valid regex")
    })
}

fn font_or_image_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\.(woff|woff2|ttf|otf|eot|png|jpg|jpeg|gif|svg|webp|avif|ico)$")
            .expect("valid regex")
    })
}

fn file_name(url: &Url) -> &str {
    url.path().rsplit('/').next().unwrap_or("")
}

pub fn is_static_asset(url: &Url) -> bool {
    static_asset_re().is_match(url.path())
}

pub fn is_hashed_bundle(url: &Url) -> bool {
    hashed_bundle_re().is_match(file_name(url))
}

pub fn is_font_or_image(url: &Url) -> bool {
    font_or_image_re().is_match(url.path())
}

/// Informational only: used for logging. Classification treats the stats
/// endpoint like any other API path and no TTL is applied.
pub fn is_dashboard_stats(url: &Url) -> bool {
    url.path() == DASHBOARD_STATS_PATH || url.path() == DASHBOARD_STATS_PATH.trim_end_matches('/')
}

/// Picks a strategy for requests made by the app served from `origin`.
#[derive(Debug, Clone)]
pub struct Classifier {
    origin: Origin,
}

impl Classifier {
    pub fn new(app_url: &Url) -> Self {
        Self {
            origin: app_url.origin(),
        }
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.origin
    }

    pub fn classify(&self, request: &Request) -> Strategy {
        let url = &request.url;

        if !request.is_get() {
            return Strategy::Bypass;
        }
        if !self.is_same_origin(url) && !is_static_asset(url) {
            return Strategy::Bypass;
        }
        if request.navigate || request.accepts_html() {
            return Strategy::ShellNetworkFirst;
        }
        if url.path().starts_with(API_PREFIX) {
            return Strategy::ApiNetworkFirst;
        }
        if is_hashed_bundle(url) {
            return Strategy::CacheFirst(AssetKind::HashedBundle);
        }
        if is_font_or_image(url) {
            return Strategy::CacheFirst(AssetKind::FontOrImage);
        }
        Strategy::StaleWhileRevalidate
    }
}
