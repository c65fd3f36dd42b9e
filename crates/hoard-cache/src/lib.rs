//! Cache subsystem for hoard.
//!
//! Three independent caches, each owning its storage unit exclusively:
//!
//! - [`TtlCacheStore`] - namespaced key to JSON value store with absolute
//!   expiration, one `SQLite` file per namespace
//! - [`PostCache`] - typed pools/posts cache with pool membership
//! - [`ThumbnailCache`] - disk cache of remote thumbnails with a byte budget,
//!   LRU eviction and single-flight fetches
//!
//! A miss is never an error. Write failures are logged and swallowed by the
//! plain method variants; `try_*` variants surface them.

#![deny(unsafe_code)]

mod posts;
mod sqlite;
mod thumbnail;
mod ttl;

pub use posts::PostCache;
pub use thumbnail::{ThumbnailCache, ThumbnailCacheConfig, ThumbnailLease};
pub use ttl::TtlCacheStore;
