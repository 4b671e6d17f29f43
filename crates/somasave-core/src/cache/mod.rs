//! Offline cache and request strategy router.
//!
//! Requests issued by the client pass through `CacheRouter`, which picks one
//! strategy per request (see `classify`) and serves it from one of four
//! versioned stores:
//!
//! - precache: the app shell and the URLs stored at install time
//! - static: content-hashed bundles, fonts and images
//! - dynamic: everything revalidated in the background
//! - api: last good copy of each API response, used when offline
//!
//! Stores are never expired entry by entry. Bumping the cache version and
//! activating drops every store of the previous generation.

pub mod classify;
pub mod disk;
pub mod fetch;
pub mod memory;
pub mod partition;
pub mod request;
pub mod router;
pub mod snapshot;
pub mod store;

pub use classify::{AssetKind, Classifier, Strategy};
pub use disk::DiskStorage;
pub use fetch::{FetchError, Fetcher, HttpFetcher};
pub use memory::MemoryStorage;
pub use partition::{CacheNames, Partition};
pub use request::Request;
pub use router::{CacheRouter, InstallError, ResponseSource, RouteError, Routed, RoutedResponse};
pub use snapshot::Snapshot;
pub use store::{CacheError, CacheStorage};
